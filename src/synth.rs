//! Deterministic synthetic ECG and PPG.
//!
//! Every beat is built from piecewise linear waves placed relative to the QRS onset:
//!
//! - Q: 30 LSB dip, 0..20 ms
//! - R: 450 LSB spike, 10..60 ms, apex at 35 ms
//! - S: 60 LSB dip, 55..80 ms
//! - T: 110 LSB triangle, its falling edge ending `qt_ms` after the onset
//!
//! The PPG pulse foot arrives `pat_ms` after the R apex.

use core::f64::consts::PI;

use crate::{runtime::SampleSource, sampling::SamplingFrequency};

const R_APEX_MS: f64 = 35.0;
const T_RISE_MS: f64 = 100.0;
const T_FALL_MS: f64 = 110.0;
const T_HEIGHT: f64 = 110.0;

/// Shape and timing of a synthetic recording.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scenario {
    pub sample_rate: SamplingFrequency,
    pub rr_ms: f32,
    /// QRS onset to the end of the T wave.
    pub qt_ms: f32,
    /// R apex to the foot of the PPG pulse.
    pub pat_ms: f32,
    /// Onset of the first QRS complex.
    pub first_onset_ms: f32,
    /// Mains interference amplitude in LSB.
    pub hum_amplitude: f32,
    pub hum_hz: f32,
    pub ecg_baseline: u16,
    pub ppg_baseline: i16,
    /// A disconnected probe reads `-1`.
    pub ppg_connected: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            sample_rate: SamplingFrequency::default(),
            rr_ms: 800.0,
            qt_ms: 330.0,
            pat_ms: 200.0,
            first_onset_ms: 100.0,
            hum_amplitude: 0.0,
            hum_hz: 50.0,
            ecg_baseline: 512,
            ppg_baseline: 300,
            ppg_connected: true,
        }
    }
}

fn triangle(t: f64, start: f64, apex: f64, end: f64, height: f64) -> f64 {
    if t >= start && t <= apex {
        height * (t - start) / (apex - start)
    } else if t > apex && t <= end {
        height * (end - t) / (end - apex)
    } else {
        0.0
    }
}

fn round_clamped(value: f64, min: f64, max: f64) -> f64 {
    libm::floor(value + 0.5).clamp(min, max)
}

impl Scenario {
    pub fn with_bpm(mut self, bpm: f32) -> Self {
        self.rr_ms = 60_000.0 / bpm;
        self
    }

    pub fn with_hum(mut self, amplitude: f32) -> Self {
        self.hum_amplitude = amplitude;
        self
    }

    fn ecg_wave(&self, t: f64) -> f64 {
        let qt = f64::from(self.qt_ms);
        let t_apex = qt - T_FALL_MS;

        -triangle(t, 0.0, 10.0, 20.0, 30.0)
            + triangle(t, 10.0, R_APEX_MS, 60.0, 450.0)
            - triangle(t, 55.0, 65.0, 80.0, 60.0)
            + triangle(t, t_apex - T_RISE_MS, t_apex, qt, T_HEIGHT)
    }

    fn ppg_wave(&self, t: f64) -> f64 {
        let arrival = t - R_APEX_MS - f64::from(self.pat_ms);
        if arrival < 0.0 {
            return 0.0;
        }
        250.0 * (1.0 - libm::exp(-arrival / 25.0)) * libm::exp(-arrival / 300.0)
    }

    /// The sample pair at `index`.
    pub fn sample_at(&self, index: u64) -> (u16, i16) {
        let t_ms = index as f64 * 1000.0 / f64::from(self.sample_rate.raw());
        let first = f64::from(self.first_onset_ms);
        let rr = f64::from(self.rr_ms);

        let mut ecg = f64::from(self.ecg_baseline);
        let mut ppg = f64::from(self.ppg_baseline);

        if t_ms >= first {
            // A beat's tail can reach into the next period.
            let current = libm::floor((t_ms - first) / rr) as i64;
            for beat in (current - 1).max(0)..=current {
                let t = t_ms - (first + beat as f64 * rr);
                ecg += self.ecg_wave(t);
                ppg += self.ppg_wave(t);
            }
        }

        ecg += f64::from(self.hum_amplitude)
            * libm::sin(2.0 * PI * f64::from(self.hum_hz) * t_ms / 1000.0);

        let ppg = if self.ppg_connected {
            round_clamped(ppg, 0.0, f64::from(i16::MAX)) as i16
        } else {
            -1
        };

        (round_clamped(ecg, 0.0, 1023.0) as u16, ppg)
    }

    pub fn source(self) -> SyntheticSource {
        SyntheticSource {
            scenario: self,
            index: 0,
            ppg: None,
        }
    }
}

/// Plays a [`Scenario`] as a [`SampleSource`].
pub struct SyntheticSource {
    scenario: Scenario,
    index: u64,
    ppg: Option<i16>,
}

impl SyntheticSource {
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }
}

impl SampleSource for SyntheticSource {
    fn next_ecg_sample(&mut self) -> u16 {
        let (ecg, ppg) = self.scenario.sample_at(self.index);
        self.index += 1;
        self.ppg = Some(ppg);
        ecg
    }

    fn next_ppg_sample(&mut self) -> i16 {
        match self.ppg.take() {
            Some(ppg) => ppg,
            // read without the matching ECG sample: belongs to the next tick
            None => self.scenario.sample_at(self.index).1,
        }
    }
}
