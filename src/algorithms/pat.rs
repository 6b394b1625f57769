//! Pulse arrival time from the PPG upstroke, and the probe validity gate.

/// PPG validity thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PpgGateConfig {
    /// Plausible samples needed, in total, before PPG metrics are published.
    pub min_valid_samples: u16,
    /// Samples at or above this level are treated as a saturated probe.
    pub plausible_limit: i16,
    /// Largest `Σ|Δppg|` over one beat before the probe is considered disconnected.
    pub max_energy: u32,
}

impl Default for PpgGateConfig {
    fn default() -> Self {
        Self {
            min_valid_samples: 100,
            plausible_limit: 1000,
            max_energy: 10_000,
        }
    }
}

/// Decides whether the PPG channel is trustworthy enough to publish.
pub struct PpgGate {
    config: PpgGateConfig,
    valid_samples: u16,
    energy: u32,
    previous: Option<i16>,
    was_open: bool,
}

impl PpgGate {
    pub fn new(config: PpgGateConfig) -> Self {
        Self {
            config,
            valid_samples: 0,
            energy: 0,
            previous: None,
            was_open: false,
        }
    }

    pub fn clear(&mut self) {
        self.valid_samples = 0;
        self.energy = 0;
        self.previous = None;
        self.was_open = false;
    }

    /// Feeds one sample. `None`, a negative or a saturated value means the probe reported no
    /// usable data. Returns the sample if it may be used for estimation.
    pub fn update(&mut self, sample: Option<i16>) -> Option<i16> {
        let sample = sample.filter(|s| *s >= 0 && *s < self.config.plausible_limit);

        if let Some(s) = sample {
            // Counts plausible samples since `clear`, not a run of them
            self.valid_samples = self
                .valid_samples
                .saturating_add(1)
                .min(self.config.min_valid_samples);
            if let Some(prev) = self.previous {
                self.energy = self
                    .energy
                    .saturating_add((i32::from(s) - i32::from(prev)).unsigned_abs());
            }
        }
        self.previous = sample;

        let open = self.is_open();
        if open != self.was_open {
            if open {
                log::info!("PPG signal acquired");
            } else {
                log::warn!("PPG energy {} over limit, suppressing PAT", self.energy);
            }
            self.was_open = open;
        }

        sample
    }

    pub fn is_open(&self) -> bool {
        self.valid_samples >= self.config.min_valid_samples
            && self.energy <= self.config.max_energy
    }

    pub fn energy(&self) -> u32 {
        self.energy
    }

    /// Starts a new energy accumulation period, called once per beat.
    pub fn reset_energy(&mut self) {
        self.energy = 0;
    }
}

/// Tracks the point of steepest PPG rise within each R-R interval.
///
/// The slope is an exponential average over `window` samples, which delays its maximum by
/// roughly half a window; the reported offset is corrected for that.
pub struct PatEstimator {
    window: f32,
    slope: f32,
    previous: Option<f32>,
    offset: u32,
    max_slope: f32,
    max_offset: Option<u32>,
}

impl PatEstimator {
    pub fn new(window: u32) -> Self {
        Self {
            window: window as f32,
            slope: 0.0,
            previous: None,
            offset: 0,
            max_slope: 0.0,
            max_offset: None,
        }
    }

    pub fn clear(&mut self) {
        self.slope = 0.0;
        self.previous = None;
        self.offset = 0;
        self.max_slope = 0.0;
        self.max_offset = None;
    }

    /// Processes one PPG sample.
    pub fn update(&mut self, ppg: i16) {
        let ppg = f32::from(ppg);
        self.offset = self.offset.saturating_add(1);

        if let Some(prev) = self.previous {
            self.slope = self.slope * (1.0 - 1.0 / self.window) + (ppg - prev) / self.window;
            if self.slope > self.max_slope {
                self.max_slope = self.slope;
                self.max_offset = Some(self.offset);
            }
        }
        self.previous = Some(ppg);
    }

    /// A sample that carries no PPG data. The interval clock still advances.
    pub fn skip(&mut self) {
        self.offset = self.offset.saturating_add(1);
        self.previous = None;
    }

    /// Closes the current R-R interval. Returns the steepest rise offset of the interval that
    /// just ended, in samples after its R-peak, if there was a rising edge and it lies after
    /// the peak once corrected.
    pub fn start_interval(&mut self) -> Option<f32> {
        let raw = self
            .max_offset
            .map(|offset| offset as f32 - self.window / 2.0)
            .filter(|samples| *samples > 0.0);

        self.offset = 0;
        self.max_slope = 0.0;
        self.max_offset = None;

        raw
    }
}
