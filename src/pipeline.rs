//! Per-sample processing chain from raw ADC codes to published beat metrics.

use crate::{
    algorithms::{
        BaselineTracker, DigitalFilterBank, Differentiator, PatEstimator, PpgGate, RPeakDetector,
        RPeakEvent, TWaveFitter,
    },
    config::MonitorConfig,
    error::Result,
    metrics::{BeatMetricSmoother, SmoothedMetrics},
    sampling::SamplingFrequency,
};

/// What one tick produced.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickOutput {
    /// Conditioned ECG sample, clamped to the ADC range, for the waveform display.
    pub ecg: u16,
    /// PPG sample for the waveform display, only while the probe signal is trusted.
    pub ppg: Option<i16>,
    pub r_peak: Option<RPeakEvent>,
    /// At least one published metric was recomputed during this tick.
    pub metrics_updated: bool,
}

struct QtPath {
    baseline: BaselineTracker,
    fitter: TWaveFitter,
}

struct PpgPath {
    gate: PpgGate,
    pat: Option<PatEstimator>,
}

/// The complete signal chain.
///
/// Stages are constructed according to [`MonitorConfig::capabilities`]; a disabled subsystem
/// costs nothing per sample.
///
/// ```rust
/// use qt_monitor::{config::MonitorConfig, pipeline::Pipeline};
///
/// let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
/// let output = pipeline.process(512, Some(300), false);
/// assert_eq!(output.ecg, 512);
/// assert!(output.r_peak.is_none());
/// ```
pub struct Pipeline {
    config: MonitorConfig,
    fs: SamplingFrequency,

    filter: DigitalFilterBank,
    differentiator: Differentiator,
    detector: RPeakDetector,
    qt: Option<QtPath>,
    ppg: Option<PpgPath>,
    smoother: BeatMetricSmoother,

    /// Samples since the derivative was last non-positive.
    onset_age: u32,
    beats_to_ignore: u8,
    /// Whether the beat in progress contributes to the metrics.
    publish_beat: bool,
    leads_off: bool,
}

impl Pipeline {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;

        let fs = config.sample_rate;
        let differentiator = Differentiator::new(fs);
        let capabilities = config.capabilities;

        let qt = capabilities.has_qt.then(|| QtPath {
            baseline: BaselineTracker::new(),
            fitter: TWaveFitter::new(fs, config.t_wave_window_ms, differentiator.lag()),
        });
        let ppg = capabilities.has_ppg.then(|| PpgPath {
            gate: PpgGate::new(config.ppg),
            pat: capabilities
                .has_pat
                .then(|| PatEstimator::new(config.pat_window)),
        });

        log::debug!(
            "pipeline at {} Hz, {:?}, differentiator lag {}",
            fs.raw(),
            config.filter,
            differentiator.lag()
        );

        Ok(Self {
            config,
            fs,
            filter: DigitalFilterBank::new(config.filter, fs, config.initial_offset),
            differentiator,
            detector: RPeakDetector::new(fs, config.refractory_ms),
            qt,
            ppg,
            smoother: BeatMetricSmoother::new(),
            onset_age: 0,
            beats_to_ignore: config.ignore_beats,
            publish_beat: false,
            leads_off: false,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn metrics(&self) -> SmoothedMetrics {
        self.smoother.metrics()
    }

    /// Drops the next `ignore_beats` beats from every metric. Filter and detector state is kept.
    pub fn rearm(&mut self) {
        self.beats_to_ignore = self.config.ignore_beats;
        self.publish_beat = false;
    }

    /// Returns every stage to its power-on state. Published metrics go back to their defaults.
    pub fn clear(&mut self) {
        self.filter.clear(self.config.initial_offset);
        self.differentiator.clear();
        self.detector.clear();
        if let Some(qt) = self.qt.as_mut() {
            qt.baseline.clear();
            qt.fitter.clear();
        }
        if let Some(ppg) = self.ppg.as_mut() {
            ppg.gate.clear();
            if let Some(pat) = ppg.pat.as_mut() {
                pat.clear();
            }
        }
        self.smoother = BeatMetricSmoother::new();
        self.onset_age = 0;
        self.leads_off = false;
        self.rearm();
    }

    /// Processes one sample period.
    ///
    /// `ppg` is `None` when the device has no PPG channel or the probe returned no data.
    /// While `leads_off` is set no beat is published, and the first beats after the leads
    /// reconnect are dropped as after startup.
    pub fn process(&mut self, ecg: u16, ppg: Option<i16>, leads_off: bool) -> TickOutput {
        if leads_off != self.leads_off {
            if leads_off {
                log::info!("ECG leads off");
            } else {
                log::info!("ECG leads reconnected");
            }
            self.leads_off = leads_off;
        }
        if leads_off {
            self.rearm();
        }

        let conditioned = self.filter.update(ecg);
        let diff = self.differentiator.update(conditioned.raw);

        self.onset_age = if diff <= 0 {
            0
        } else {
            self.onset_age.saturating_add(1)
        };

        let baseline = self
            .qt
            .as_mut()
            .map(|qt| qt.baseline.update(diff, conditioned.raw));

        let ppg = self.ppg.as_mut().and_then(|path| {
            let usable = path.gate.update(ppg);
            if let Some(pat) = path.pat.as_mut() {
                match usable {
                    Some(sample) => pat.update(sample),
                    None => pat.skip(),
                }
            }
            usable.filter(|_| path.gate.is_open())
        });

        let r_peak = self.detector.update(diff);
        let metrics_updated = match (r_peak, baseline) {
            (Some(event), _) => self.on_beat(event),
            (None, Some(baseline)) => self.on_repolarization(conditioned.raw as f32, baseline),
            (None, None) => false,
        };

        TickOutput {
            ecg: conditioned.clamped,
            ppg,
            r_peak,
            metrics_updated,
        }
    }

    fn on_beat(&mut self, event: RPeakEvent) -> bool {
        let publish = self.beats_to_ignore == 0;
        self.beats_to_ignore = self.beats_to_ignore.saturating_sub(1);
        self.publish_beat = publish;

        if let Some(qt) = self.qt.as_mut() {
            qt.fitter.start_beat(self.onset_age);
        }

        let mut updated = false;

        // The interval that just closed belongs to the previous beat.
        if let Some(path) = self.ppg.as_mut() {
            let raw = path.pat.as_mut().and_then(PatEstimator::start_interval);
            if let (true, true, Some(samples)) = (publish, path.gate.is_open(), raw) {
                self.smoother.push_pat(self.fs.samples_to_ms(samples));
                updated = true;
            }
            path.gate.reset_energy();
        }

        if !publish {
            log::debug!("beat at {} not published", event.index);
            return updated;
        }

        if let Some(interval) = event.interval {
            let bpm = 60_000.0 / self.fs.samples_to_ms(interval as f32);
            self.smoother.push_bpm(bpm);
            updated = true;
        }

        updated
    }

    fn on_repolarization(&mut self, sample: f32, baseline: f32) -> bool {
        let since_r = self.detector.samples_since_peak();
        let candidate = match self.qt.as_mut() {
            Some(qt) => qt.fitter.update(sample, since_r, baseline),
            None => None,
        };

        match candidate {
            Some(candidate) if self.publish_beat => {
                let raw_ms = self.fs.samples_to_ms(candidate.raw_interval_samples);
                let qtc = self.smoother.push_qt(raw_ms);
                log::trace!("QT {:.1} ms, QTc {} ms", raw_ms, qtc);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Capabilities, error::ConfigError};

    /// Narrow QRS-like spike every `period` samples on a flat baseline.
    fn spike_train(period: usize, count: usize) -> Vec<u16> {
        let mut out = vec![512u16; period * count];
        for beat in 0..count {
            let at = beat * period + 20;
            for (i, v) in [540u16, 620, 700, 620, 540, 500].into_iter().enumerate() {
                out[at + i] = v;
            }
        }
        out
    }

    fn run(pipeline: &mut Pipeline, ecg: &[u16]) -> Vec<TickOutput> {
        ecg.iter()
            .map(|&e| pipeline.process(e, Some(300), false))
            .collect()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = MonitorConfig::default().with_capabilities(Capabilities {
            has_ppg: false,
            has_pat: true,
            has_qt: false,
        });
        assert!(Pipeline::new(config).is_err());

        let config = MonitorConfig {
            refractory_ms: -1.0,
            ..MonitorConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(ConfigError::RefractoryTooShort(_))
        ));
    }

    #[test]
    fn without_ignored_beats_the_first_interval_is_published() {
        let config = MonitorConfig::default().with_ignore_beats(0);
        let mut pipeline = Pipeline::new(config).unwrap();
        let outputs = run(&mut pipeline, &spike_train(160, 8));

        let beats: Vec<&TickOutput> = outputs.iter().filter(|o| o.r_peak.is_some()).collect();
        // the first beat has no interval yet
        assert!(!beats[0].metrics_updated);
        assert!(beats[1..].iter().all(|o| o.metrics_updated));
        assert_eq!(pipeline.metrics().bpm, 75);
    }

    #[test]
    fn flat_input_produces_no_beats() {
        let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
        let outputs = run(&mut pipeline, &[512; 1000]);
        assert!(outputs.iter().all(|o| o.r_peak.is_none() && !o.metrics_updated));
        assert!(outputs.iter().all(|o| o.ecg == 512));
        assert_eq!(pipeline.metrics(), SmoothedMetrics::default());
    }

    #[test]
    fn first_beats_are_ignored() {
        let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
        let outputs = run(&mut pipeline, &spike_train(160, 8));

        let beats: Vec<usize> = outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.r_peak.is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(beats.len(), 8);

        // the first two beats never change the heart rate
        assert!(!outputs[beats[0]].metrics_updated);
        assert!(!outputs[beats[1]].metrics_updated);
        assert!(outputs[beats[2]].metrics_updated);
        assert_eq!(pipeline.metrics().bpm, 75);
    }

    #[test]
    fn leads_off_suppresses_beats_and_rearms() {
        let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
        let ecg = spike_train(160, 12);

        let mut published = 0;
        for (i, &e) in ecg.iter().enumerate() {
            let leads_off = i < 160 * 6;
            let output = pipeline.process(e, None, leads_off);
            if output.r_peak.is_some() && output.metrics_updated {
                assert!(!leads_off);
                published += 1;
            }
        }
        // six beats after reconnecting, two of them dropped
        assert_eq!(published, 4);
        assert_eq!(pipeline.metrics().bpm, 75);
    }

    #[test]
    fn clear_restores_power_on_behaviour() {
        let ecg = spike_train(160, 6);
        let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
        let first = run(&mut pipeline, &ecg);
        pipeline.clear();
        assert_eq!(pipeline.metrics(), SmoothedMetrics::default());
        let second = run(&mut pipeline, &ecg);
        assert_eq!(first, second);
    }

    #[test]
    fn ecg_only_never_reports_ppg() {
        let config = MonitorConfig::default().with_capabilities(Capabilities::ecg_only());
        let mut pipeline = Pipeline::new(config).unwrap();
        let outputs = run(&mut pipeline, &spike_train(160, 6));
        assert!(outputs.iter().all(|o| o.ppg.is_none()));
        assert_eq!(pipeline.metrics().pat_ms, 0.0);
    }
}
