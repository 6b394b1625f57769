use crate::sampling::SamplingFrequency;

/// A depolarization accepted by [`RPeakDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RPeakEvent {
    /// Tick at which the peak was accepted.
    pub index: u32,
    /// Samples since the previous accepted peak. `None` for the first peak.
    pub interval: Option<u32>,
}

/// Adaptive dual envelope detector on the differentiated ECG.
///
/// Both envelopes decay toward zero with a two second time constant and are pushed outward by
/// any excursion beyond them. Such an excursion is a candidate beat; it is accepted only once
/// the refractory period since the previous accepted beat has passed.
pub struct RPeakDetector {
    alpha: f32,
    dmax: f32,
    dmin: f32,
    refractory: u32,
    total_samples: u32,
    since_peak: u32,
    seen_peak: bool,
}

impl RPeakDetector {
    pub fn new(fs: SamplingFrequency, refractory_ms: f32) -> Self {
        Self {
            alpha: fs.envelope_decay(),
            dmax: 0.0,
            dmin: 0.0,
            refractory: fs.ms_to_samples(refractory_ms),
            total_samples: 0,
            since_peak: 0,
            seen_peak: false,
        }
    }

    pub fn clear(&mut self) {
        self.dmax = 0.0;
        self.dmin = 0.0;
        self.total_samples = 0;
        self.since_peak = 0;
        self.seen_peak = false;
    }

    /// Samples elapsed since the last accepted peak.
    pub fn samples_since_peak(&self) -> u32 {
        self.since_peak
    }

    pub fn envelopes(&self) -> (f32, f32) {
        (self.dmin, self.dmax)
    }

    /// Processes one differentiated sample. Returns the event if a beat is accepted.
    pub fn update(&mut self, diff: i32) -> Option<RPeakEvent> {
        let index = self.total_samples;
        self.total_samples = self.total_samples.wrapping_add(1);
        self.since_peak = self.since_peak.saturating_add(1);

        let diff = diff as f32;
        self.dmax *= self.alpha;
        self.dmin *= self.alpha;

        let mut candidate = false;
        if diff > self.dmax {
            self.dmax = diff;
            candidate = true;
        }
        if diff < self.dmin {
            self.dmin = diff;
            candidate = true;
        }

        if !candidate || (self.seen_peak && self.since_peak <= self.refractory) {
            return None;
        }

        let interval = self.seen_peak.then_some(self.since_peak);
        self.seen_peak = true;
        self.since_peak = 0;

        log::trace!("R-peak at {} (interval {:?})", index, interval);
        Some(RPeakEvent { index, interval })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplingFrequencyExt;
    use proptest::prelude::*;

    fn spikes(period: usize, count: usize) -> Vec<i32> {
        let mut out = vec![0; period * count];
        for beat in 0..count {
            let at = beat * period + 10;
            out[at] = 150;
            out[at + 1] = 60;
            out[at + 3] = -120;
        }
        out
    }

    #[test]
    fn detects_each_beat_once() {
        let mut detector = RPeakDetector::new(200.sps(), 200.0);
        let events: Vec<RPeakEvent> = spikes(160, 6)
            .into_iter()
            .filter_map(|d| detector.update(d))
            .collect();

        assert_eq!(events.len(), 6);
        assert_eq!(events[0].interval, None);
        for e in &events[1..] {
            assert_eq!(e.interval, Some(160));
        }
    }

    #[test]
    fn candidates_inside_refractory_are_dropped() {
        let mut detector = RPeakDetector::new(200.sps(), 200.0);
        assert!(detector.update(100).is_some());
        for _ in 0..39 {
            assert!(detector.update(0).is_none());
        }
        // 40 samples = 200 ms, still not past the gate
        assert!(detector.update(1000).is_none());
        assert_eq!(detector.samples_since_peak(), 40);
        assert!(detector.update(2000).is_some());
    }

    #[test]
    fn envelopes_decay_between_beats() {
        let mut detector = RPeakDetector::new(200.sps(), 200.0);
        detector.update(100);
        detector.update(-100);
        for _ in 0..400 {
            detector.update(0);
        }
        let (dmin, dmax) = detector.envelopes();
        // one time constant
        assert!((dmax - 100.0 / core::f32::consts::E).abs() < 0.5, "{}", dmax);
        assert!((dmin + 100.0 / core::f32::consts::E).abs() < 0.5, "{}", dmin);
    }

    proptest! {
        #[test]
        fn never_emits_inside_refractory(input in prop::collection::vec(-500i32..500, 0..3000)) {
            let fs = 200.sps();
            let mut detector = RPeakDetector::new(fs, 200.0);
            let mut last: Option<u32> = None;
            for d in input {
                if let Some(event) = detector.update(d) {
                    if let Some(prev) = last {
                        let delta_ms = fs.samples_to_ms((event.index - prev) as f32);
                        prop_assert!(delta_ms > 200.0);
                        prop_assert_eq!(event.interval, Some(event.index - prev));
                    }
                    last = Some(event.index);
                }
            }
        }
    }
}
