//! The per-sample signal processing stages.

mod baseline;
mod differentiator;
mod filter;
mod pat;
mod rpeak;
mod twave;

pub use baseline::BaselineTracker;
pub use differentiator::{Differentiator, MAX_LAG};
pub use filter::{Biquad, Conditioned, DigitalFilterBank, FilterVariant, ADC_MAX};
pub use pat::{PatEstimator, PpgGate, PpgGateConfig};
pub use rpeak::{RPeakDetector, RPeakEvent};
pub use twave::{qtc_factor, QtCandidate, TWaveFitter};
