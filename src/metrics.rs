//! Display-stable beat metrics.

#[cfg(not(any(test, feature = "std")))]
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::{
    algorithms::qtc_factor,
    smoothing::{ExponentialSmoother, MedianWindow},
};

/// The values published to the display. Copy it out for a consistent snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SmoothedMetrics {
    pub bpm: u16,
    /// Rate corrected QT interval
    pub qt_ms: u16,
    pub pat_ms: f32,
}

impl SmoothedMetrics {
    pub const DEFAULT_BPM: u16 = 60;
    pub const DEFAULT_QT_MS: u16 = 360;
}

impl Default for SmoothedMetrics {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
            qt_ms: Self::DEFAULT_QT_MS,
            pat_ms: 0.0,
        }
    }
}

/// Median plus exponential smoothing, one chain per metric.
///
/// | metric | median of | weight of a new value      |
/// |--------|-----------|----------------------------|
/// | BPM    | 3         | 1/6                        |
/// | QT     | 5         | 1/6, after rate correction |
/// | PAT    | 5         | 1/4                        |
pub struct BeatMetricSmoother {
    bpm_median: MedianWindow<3>,
    bpm: ExponentialSmoother,
    qt_median: MedianWindow<5>,
    qt: ExponentialSmoother,
    pat_median: MedianWindow<5>,
    pat: ExponentialSmoother,
    metrics: SmoothedMetrics,
}

impl Default for BeatMetricSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatMetricSmoother {
    pub fn new() -> Self {
        let defaults = SmoothedMetrics::default();
        Self {
            bpm_median: MedianWindow::new(),
            bpm: ExponentialSmoother::new(
                f32::from(defaults.bpm),
                ExponentialSmoother::ONE_SIXTH,
            ),
            qt_median: MedianWindow::new(),
            qt: ExponentialSmoother::new(
                f32::from(defaults.qt_ms),
                ExponentialSmoother::ONE_SIXTH,
            ),
            pat_median: MedianWindow::new(),
            pat: ExponentialSmoother::new(defaults.pat_ms, ExponentialSmoother::ONE_QUARTER),
            metrics: defaults,
        }
    }

    pub fn metrics(&self) -> SmoothedMetrics {
        self.metrics
    }

    /// Smoothed heart rate as a float, used for the QT correction.
    pub fn bpm(&self) -> f32 {
        self.bpm.value()
    }

    pub fn push_bpm(&mut self, raw_bpm: f32) -> u16 {
        let median = self.bpm_median.push(raw_bpm);
        let bpm = self.bpm.update(median);
        self.metrics.bpm = bpm.round() as u16;
        self.metrics.bpm
    }

    /// `raw_ms` is the uncorrected QT interval.
    pub fn push_qt(&mut self, raw_ms: f32) -> u16 {
        let median = self.qt_median.push(raw_ms);
        let corrected = median * qtc_factor(self.bpm.value());
        let qt = self.qt.update(corrected);
        self.metrics.qt_ms = qt.round() as u16;
        self.metrics.qt_ms
    }

    pub fn push_pat(&mut self, raw_ms: f32) -> f32 {
        let median = self.pat_median.push(raw_ms);
        self.metrics.pat_ms = self.pat.update(median);
        self.metrics.pat_ms
    }
}
