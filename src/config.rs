//! Static configuration, fixed when the pipeline is built.

use crate::{
    algorithms::{FilterVariant, PpgGateConfig, ADC_MAX, MAX_LAG},
    error::{ConfigError, Result},
    sampling::SamplingFrequency,
};

/// Optional subsystems. Stages that are switched off are never constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    pub has_ppg: bool,
    pub has_pat: bool,
    pub has_qt: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            has_ppg: true,
            has_pat: true,
            has_qt: true,
        }
    }
}

impl Capabilities {
    /// ECG only: heart rate and QT.
    pub fn ecg_only() -> Self {
        Self {
            has_ppg: false,
            has_pat: false,
            has_qt: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonitorConfig {
    pub sample_rate: SamplingFrequency,
    pub filter: FilterVariant,
    pub capabilities: Capabilities,
    /// Beats dropped from every metric after startup, a display reset or lead recovery.
    pub ignore_beats: u8,
    /// Minimum time between two accepted R-peaks.
    pub refractory_ms: f32,
    /// Exclusive bounds, after the R-peak, of where the T-wave peak may be found.
    pub t_wave_window_ms: (f32, f32),
    /// Length of the exponential PPG derivative, in samples.
    pub pat_window: u32,
    pub ppg: PpgGateConfig,
    /// Starting value of the DC offset tracker, mid scale of the ADC.
    pub initial_offset: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate: SamplingFrequency::default(),
            filter: FilterVariant::default(),
            capabilities: Capabilities::default(),
            ignore_beats: 2,
            refractory_ms: 200.0,
            t_wave_window_ms: (200.0, 500.0),
            pat_window: 20,
            ppg: PpgGateConfig::default(),
            initial_offset: 512,
        }
    }
}

impl MonitorConfig {
    /// Two R-peaks are never accepted closer together than this.
    pub const MIN_REFRACTORY_MS: f32 = 200.0;

    pub fn with_sample_rate(mut self, sample_rate: SamplingFrequency) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_filter(mut self, filter: FilterVariant) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_ignore_beats(mut self, ignore_beats: u8) -> Self {
        self.ignore_beats = ignore_beats;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fs = self.sample_rate.raw();
        if !fs.is_finite() || fs <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(fs));
        }

        if fs < 65.0 {
            return Err(ConfigError::SampleRateTooLow(fs));
        }

        let lag = self.sample_rate.differentiator_lag();
        if lag > MAX_LAG {
            return Err(ConfigError::DifferentiatorLagTooLong {
                lag,
                capacity: MAX_LAG,
            });
        }

        let refractory_ms = self.refractory_ms;
        if !refractory_ms.is_finite() || refractory_ms < Self::MIN_REFRACTORY_MS {
            return Err(ConfigError::RefractoryTooShort(refractory_ms));
        }

        let (start_ms, end_ms) = self.t_wave_window_ms;
        if self.capabilities.has_qt
            && (!start_ms.is_finite()
                || !end_ms.is_finite()
                || start_ms < 0.0
                || self.sample_rate.ms_to_samples(end_ms)
                    <= self.sample_rate.ms_to_samples(start_ms) + 1)
        {
            return Err(ConfigError::InvalidTWaveWindow { start_ms, end_ms });
        }

        if i32::from(self.initial_offset) > ADC_MAX {
            return Err(ConfigError::InitialOffsetOutOfRange(self.initial_offset));
        }

        if self.capabilities.has_pat {
            if !self.capabilities.has_ppg {
                return Err(ConfigError::PatWithoutPpg);
            }
            if self.pat_window < 2 {
                return Err(ConfigError::PatWindowTooShort(self.pat_window));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplingFrequencyExt;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(MonitorConfig::default().validate(), Ok(()));
        let ecg_only = MonitorConfig::default().with_capabilities(Capabilities::ecg_only());
        assert_eq!(ecg_only.validate(), Ok(()));
    }

    #[test]
    fn rejects_unusable_sample_rates() {
        let config = MonitorConfig::default().with_sample_rate(0.sps());
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleRate(0.0)));

        let config = MonitorConfig::default().with_sample_rate(40.sps());
        assert_eq!(config.validate(), Err(ConfigError::SampleRateTooLow(40.0)));

        let config = MonitorConfig::default().with_sample_rate(4000.sps());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DifferentiatorLagTooLong { lag: 62, .. })
        ));
    }

    #[test]
    fn pat_needs_ppg() {
        let config = MonitorConfig::default().with_capabilities(Capabilities {
            has_ppg: false,
            has_pat: true,
            has_qt: true,
        });
        assert_eq!(config.validate(), Err(ConfigError::PatWithoutPpg));
    }

    #[test]
    fn t_wave_window_must_be_ordered() {
        let config = MonitorConfig {
            t_wave_window_ms: (500.0, 200.0),
            ..MonitorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTWaveWindow { .. })
        ));

        let config = MonitorConfig {
            t_wave_window_ms: (-100.0, 500.0),
            ..MonitorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTWaveWindow { .. })
        ));

        // not searched at all without the QT subsystem
        let config = MonitorConfig {
            t_wave_window_ms: (500.0, 200.0),
            capabilities: Capabilities {
                has_ppg: true,
                has_pat: true,
                has_qt: false,
            },
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn refractory_period_cannot_undercut_200_ms() {
        for refractory_ms in [-1.0, 0.0, 150.0, f32::NAN, f32::INFINITY] {
            let config = MonitorConfig {
                refractory_ms,
                ..MonitorConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::RefractoryTooShort(_))),
                "{}",
                refractory_ms
            );
        }

        let config = MonitorConfig {
            refractory_ms: 250.0,
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn initial_offset_must_fit_the_adc() {
        let config = MonitorConfig {
            initial_offset: 1024,
            ..MonitorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitialOffsetOutOfRange(1024))
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        let message = ConfigError::SampleRateTooLow(40.0).to_string();
        assert!(message.contains("40 Hz"), "{}", message);
    }
}
