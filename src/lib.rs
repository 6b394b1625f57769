//! Realtime beat metrics from a single lead ECG and an optional PPG channel.
//!
//! Every sample period the [`pipeline::Pipeline`] conditions the ECG, detects R-peaks on its
//! derivative and, per beat, derives:
//!
//! - the heart rate from the R-R interval,
//! - the rate corrected QT interval, by fitting a line to the falling edge of the T wave,
//! - the pulse arrival time, from the steepest PPG upstroke following the R-peak.
//!
//! Each metric passes a median filter and an exponential smoother before it is published in
//! [`metrics::SmoothedMetrics`].
//!
//! The crate is `no_std` unless the `std` feature is enabled. [`runtime::Monitor`] drives the
//! pipeline at a fixed cadence from a [`runtime::SampleSource`] to a [`runtime::MetricSink`].
//!
//! ```rust
//! use qt_monitor::{config::MonitorConfig, pipeline::Pipeline, synth::Scenario};
//!
//! let scenario = Scenario::default();
//! let mut pipeline = Pipeline::new(MonitorConfig::default()).unwrap();
//! for i in 0..2000 {
//!     let (ecg, ppg) = scenario.sample_at(i);
//!     pipeline.process(ecg, Some(ppg), false);
//! }
//! assert_eq!(pipeline.metrics().bpm, 75);
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod algorithms;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod sampling;
mod sliding;
pub mod smoothing;
pub mod synth;

pub use config::{Capabilities, MonitorConfig};
pub use error::ConfigError;
pub use metrics::SmoothedMetrics;
pub use pipeline::{Pipeline, TickOutput};
pub use runtime::Monitor;
