//! Configuration errors.
//!
//! Numeric trouble inside the pipeline (degenerate regressions, refractory hits, a noisy PPG
//! probe) is not an error: the estimate for that beat is dropped and the previous metric stays.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("sampling frequency must be finite and positive, got {0} Hz")]
    InvalidSampleRate(f32),

    #[error("sampling frequency {0} Hz is below the 65 Hz needed for a one sample differentiator lag")]
    SampleRateTooLow(f32),

    #[error("differentiator lag of {lag} samples exceeds the delay line capacity of {capacity}")]
    DifferentiatorLagTooLong { lag: usize, capacity: usize },

    #[error("refractory period must be at least 200 ms, got {0} ms")]
    RefractoryTooShort(f32),

    #[error("T-wave search window {start_ms}..{end_ms} ms is empty or negative")]
    InvalidTWaveWindow { start_ms: f32, end_ms: f32 },

    #[error("initial DC offset {0} is outside the 10 bit ADC range")]
    InitialOffsetOutOfRange(u16),

    #[error("pulse arrival time needs the PPG channel to be enabled")]
    PatWithoutPpg,

    #[error("PAT derivative window must span at least 2 samples, got {0}")]
    PatWindowTooShort(u32),
}

pub type Result<T> = core::result::Result<T, ConfigError>;
