//! Helpers for working with sampling frequencies and sample counts.
//!
//! Every time constant in the pipeline is expressed in milliseconds or seconds and converted to
//! a sample count once, when the owning component is created.

#[cfg(not(any(test, feature = "std")))]
#[allow(unused_imports)]
use micromath::F32Ext;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplingFrequency(f32);

/// Extension functions for numeric types used to create [`SamplingFrequency`] values.
///
/// # Usage
/// ```rust
/// use qt_monitor::sampling::*;
///
/// // Both values represent the nominal 200 samples per second
/// let fs = 200.sps();
/// let fs2 = 0.2.ksps();
///
/// assert_eq!(fs, fs2);
/// ```
pub trait SamplingFrequencyExt {
    fn sps(self) -> SamplingFrequency;
    fn ksps(self) -> SamplingFrequency;
}

impl SamplingFrequencyExt for f32 {
    fn sps(self) -> SamplingFrequency {
        SamplingFrequency(self)
    }

    fn ksps(self) -> SamplingFrequency {
        (self * 1000.0).sps()
    }
}

impl SamplingFrequencyExt for u32 {
    fn sps(self) -> SamplingFrequency {
        SamplingFrequency(self as f32)
    }

    fn ksps(self) -> SamplingFrequency {
        (self * 1000).sps()
    }
}

impl Default for SamplingFrequency {
    /// 200 Hz, one sample every 5 ms.
    fn default() -> Self {
        SamplingFrequency(200.0)
    }
}

impl SamplingFrequency {
    /// Returns the sampling frequency in units of samples per second.
    pub fn raw(self) -> f32 {
        self.0
    }

    /// Convert `ms` milliseconds to a whole number of samples, rounding down.
    /// ```rust
    /// # use qt_monitor::sampling::*;
    /// #
    /// assert_eq!(200.sps().ms_to_samples(200.0), 40);
    /// ```
    pub fn ms_to_samples(self, ms: f32) -> u32 {
        ((ms * self.0) as u32) / 1000
    }

    /// Convert `s` seconds to a whole number of samples.
    pub fn s_to_samples(self, s: f32) -> u32 {
        self.ms_to_samples(s * 1000.0)
    }

    /// Convert a (possibly fractional) number of samples to milliseconds.
    /// ```rust
    /// # use qt_monitor::sampling::*;
    /// #
    /// assert_eq!(200.sps().samples_to_ms(160.0), 800.0);
    /// ```
    pub fn samples_to_ms(self, samples: f32) -> f32 {
        samples * 1000.0 / self.0
    }

    /// Length of one tick in microseconds.
    pub fn period_us(self) -> u64 {
        (1_000_000.0 / self.0) as u64
    }

    /// Lag of the R-peak differentiator: `round(fs / 65)`.
    /// ```rust
    /// # use qt_monitor::sampling::*;
    /// #
    /// assert_eq!(200.sps().differentiator_lag(), 3);
    /// assert_eq!(500.sps().differentiator_lag(), 8);
    /// ```
    pub fn differentiator_lag(self) -> usize {
        (self.0 / 65.0).round() as usize
    }

    /// Number of samples in the T-wave regression window (about 100 ms).
    pub fn fit_window(self) -> u32 {
        (self.0 / 10.0) as u32
    }

    /// Per-sample decay of the R-peak envelopes, a two second time constant.
    pub fn envelope_decay(self) -> f32 {
        libm::expf(-1.0 / (2.0 * self.0))
    }
}
