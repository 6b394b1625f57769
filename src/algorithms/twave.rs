//! End of repolarization from a weighted line fit to the falling edge of the T wave.

use crate::sampling::SamplingFrequency;

/// One accepted fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QtCandidate {
    /// QRS onset to the fitted line's baseline crossing, in samples.
    pub raw_interval_samples: f32,
    pub fitted_slope: f64,
    pub fitted_intercept: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Sums {
    tt: f64,
    ta: f64,
    a: f64,
    t: f64,
}

/// Rate correction factor applied to the raw QT interval.
///
/// A quadratic in heart rate that equals 1 at 60 BPM. Non-positive rates leave the interval
/// unchanged.
///
/// ```rust
/// use qt_monitor::algorithms::qtc_factor;
///
/// assert!((qtc_factor(60.0) - 1.0).abs() < 1e-3);
/// assert!((qtc_factor(75.0) - 1.07575).abs() < 1e-4);
/// ```
pub fn qtc_factor(bpm: f32) -> f32 {
    if bpm > 0.0 {
        (0.00728 - 0.0000164 * bpm) * bpm + 0.622
    } else {
        1.0
    }
}

/// Tracks the T-wave peak inside the search window of each beat and fits a line to the `n`
/// samples that follow it, with triangular weights `t * (n - 1 - t)`.
pub struct TWaveFitter {
    n: u32,
    /// `Σw`, fixed by `n`
    sw: f64,
    window: (u32, u32),
    differentiator_lag: u32,

    peak: f32,
    since_peak: Option<u32>,
    sums: Sums,
    onset_age: u32,
    done: bool,
}

impl TWaveFitter {
    /// `window_ms` bounds (exclusive) the time after the R-peak at which the T peak may sit.
    pub fn new(fs: SamplingFrequency, window_ms: (f32, f32), differentiator_lag: usize) -> Self {
        let n = fs.fit_window();
        let nf = f64::from(n);
        Self {
            n,
            sw: nf * (nf - 1.0) * (nf - 2.0) / 6.0,
            window: (fs.ms_to_samples(window_ms.0), fs.ms_to_samples(window_ms.1)),
            differentiator_lag: differentiator_lag as u32,

            peak: f32::NEG_INFINITY,
            since_peak: None,
            sums: Sums::default(),
            onset_age: 0,
            // nothing to fit before the first R-peak
            done: true,
        }
    }

    /// Starts a new beat. `onset_age` is how many samples before the R-peak the derivative was
    /// last non-positive, i.e. where the QRS complex started rising.
    pub fn start_beat(&mut self, onset_age: u32) {
        self.peak = f32::NEG_INFINITY;
        self.since_peak = None;
        self.sums = Sums::default();
        self.onset_age = onset_age;
        self.done = false;
    }

    pub fn clear(&mut self) {
        self.start_beat(0);
        self.done = true;
    }

    /// Processes one conditioned sample. `since_r` is the number of samples since the R-peak,
    /// `baseline` the current isoelectric level.
    pub fn update(&mut self, sample: f32, since_r: u32, baseline: f32) -> Option<QtCandidate> {
        if self.done {
            return None;
        }

        let (start, end) = self.window;
        if since_r > start && since_r < end && sample > self.peak {
            self.peak = sample;
            self.since_peak = Some(0);
            self.sums = Sums::default();
            return None;
        }

        let t = self.since_peak? + 1;
        self.since_peak = Some(t);

        let (tf, y) = (f64::from(t), f64::from(sample));
        let w = f64::from(t * (self.n - 1 - t));
        self.sums.tt += w * tf * tf;
        self.sums.ta += w * tf * y;
        self.sums.a += w * y;
        self.sums.t += w * tf;

        if t < self.n - 1 {
            return None;
        }

        // A later, higher peak inside the window may still restart the fit
        self.since_peak = None;
        let candidate = self.solve(f64::from(baseline), since_r - t)?;
        self.done = true;
        Some(candidate)
    }

    fn solve(&self, baseline: f64, peak_since_r: u32) -> Option<QtCandidate> {
        let Sums { tt, ta, a, t } = self.sums;
        let sw = self.sw;

        let denominator = tt * sw - t * t;
        if tt <= 0.0 || denominator == 0.0 {
            log::debug!("T-wave fit: degenerate window");
            return None;
        }

        let slope = (ta * sw - t * a) / denominator;
        if slope >= 0.0 {
            log::debug!("T-wave fit: slope {:.3} is not falling", slope);
            return None;
        }

        let intercept = (a - slope * t) / sw;
        let crossing = (baseline - intercept) / slope;
        if crossing <= 0.0 {
            log::debug!("T-wave fit: baseline crossing {:.2} precedes the peak", crossing);
            return None;
        }

        let interval =
            crossing + f64::from(peak_since_r + self.onset_age + self.differentiator_lag);

        Some(QtCandidate {
            raw_interval_samples: interval as f32,
            fitted_slope: slope,
            fitted_intercept: intercept,
        })
    }
}
