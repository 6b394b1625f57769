//! Mains hum and baseline conditioning.
//!
//! A slew limited DC tracker removes the electrode offset, then a single fixed point biquad
//! section suppresses mains interference. Coefficients are scaled by 2^16.

use core::f32::consts::PI;

use crate::sampling::SamplingFrequency;

/// Largest value the 10 bit ECG front end produces.
pub const ADC_MAX: i32 = 1023;

/// Second order section, `y = (b0 x + b1 x1 + b2 x2 - a1 y1 - a2 y2) >> 16`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Biquad {
    pub b: [i32; 3],
    pub a: [i32; 2],
}

impl Biquad {
    /// 50 Hz notch at 200 Hz, Q = 1.
    pub const NOTCH_50_WIDE: Biquad = Biquad {
        b: [43691, 0, 43691],
        a: [0, 21845],
    };

    /// 50 Hz notch at 200 Hz, Q = 2.
    pub const NOTCH_50_NARROW: Biquad = Biquad {
        b: [52429, 0, 52429],
        a: [0, 39322],
    };

    /// 60 Hz notch at 200 Hz, Q = 1.
    pub const NOTCH_60: Biquad = Biquad {
        b: [44415, 27450, 44415],
        a: [27450, 23295],
    };

    /// 40 Hz Butterworth low-pass at 200 Hz.
    pub const LOW_PASS_40: Biquad = Biquad {
        b: [13538, 27076, 13538],
        a: [-24217, 12833],
    };

    const ONE: f32 = 65536.0;

    fn quantize(b: [f32; 3], a: [f32; 2], a0: f32) -> Self {
        let q = |x: f32| libm::roundf(x / a0 * Self::ONE) as i32;
        Biquad {
            b: [q(b[0]), q(b[1]), q(b[2])],
            a: [q(a[0]), q(a[1])],
        }
    }

    /// Notch at `f0` Hz with quality factor `q`.
    pub fn notch(fs: SamplingFrequency, f0: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * f0 / fs.raw();
        let cos = libm::cosf(w0);
        let alpha = libm::sinf(w0) / (2.0 * q);

        Self::quantize([1.0, -2.0 * cos, 1.0], [-2.0 * cos, 1.0 - alpha], 1.0 + alpha)
    }

    /// Butterworth low-pass with cutoff `f0` Hz.
    pub fn low_pass(fs: SamplingFrequency, f0: f32) -> Self {
        let w0 = 2.0 * PI * f0 / fs.raw();
        let cos = libm::cosf(w0);
        let alpha = libm::sinf(w0) / (2.0 * core::f32::consts::FRAC_1_SQRT_2);
        let b = (1.0 - cos) / 2.0;

        Self::quantize([b, 2.0 * b, b], [-2.0 * cos, 1.0 - alpha], 1.0 + alpha)
    }
}

/// The interchangeable conditioning filters. Only one is active for the lifetime of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterVariant {
    /// 50 Hz notch, Q ≈ 1
    #[default]
    Notch50Wide,
    /// 50 Hz notch, Q ≈ 2
    Notch50Narrow,
    /// 60 Hz notch, Q ≈ 1
    Notch60,
    /// 40 Hz low-pass
    LowPass40,
}

impl FilterVariant {
    /// Coefficients for `fs`. The tables are exact at the nominal 200 Hz, other rates are
    /// designed once from the same pole/zero placement.
    pub fn coefficients(self, fs: SamplingFrequency) -> Biquad {
        if fs == SamplingFrequency::default() {
            return match self {
                FilterVariant::Notch50Wide => Biquad::NOTCH_50_WIDE,
                FilterVariant::Notch50Narrow => Biquad::NOTCH_50_NARROW,
                FilterVariant::Notch60 => Biquad::NOTCH_60,
                FilterVariant::LowPass40 => Biquad::LOW_PASS_40,
            };
        }

        match self {
            FilterVariant::Notch50Wide => Biquad::notch(fs, 50.0, 1.0),
            FilterVariant::Notch50Narrow => Biquad::notch(fs, 50.0, 2.0),
            FilterVariant::Notch60 => Biquad::notch(fs, 60.0, 1.0),
            FilterVariant::LowPass40 => Biquad::low_pass(fs, 40.0),
        }
    }
}

/// One conditioned sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conditioned {
    /// Clamped to the ADC range, for display.
    pub clamped: u16,
    /// Unclamped, for the differentiator and the QT path.
    pub raw: i32,
}

pub struct DigitalFilterBank {
    coefficients: Biquad,
    /// Running DC offset, moves at most one LSB per sample
    mid: i32,
    x: [i32; 2],
    y: [i32; 2],
}

impl DigitalFilterBank {
    pub fn new(variant: FilterVariant, fs: SamplingFrequency, initial_offset: u16) -> Self {
        Self {
            coefficients: variant.coefficients(fs),
            mid: i32::from(initial_offset),
            x: [0; 2],
            y: [0; 2],
        }
    }

    pub fn clear(&mut self, initial_offset: u16) {
        self.mid = i32::from(initial_offset);
        self.x = [0; 2];
        self.y = [0; 2];
    }

    pub fn offset(&self) -> i32 {
        self.mid
    }

    pub fn update(&mut self, sample: u16) -> Conditioned {
        let sample = i32::from(sample);
        self.mid += (sample - self.mid).signum();

        let x = sample - self.mid;
        let Biquad { b, a } = self.coefficients;
        let acc = i64::from(b[0]) * i64::from(x)
            + i64::from(b[1]) * i64::from(self.x[0])
            + i64::from(b[2]) * i64::from(self.x[1])
            - i64::from(a[0]) * i64::from(self.y[0])
            - i64::from(a[1]) * i64::from(self.y[1]);
        let y = (acc >> 16) as i32;

        self.x = [x, self.x[0]];
        self.y = [y, self.y[0]];

        let raw = y + self.mid;
        Conditioned {
            clamped: raw.clamp(0, ADC_MAX) as u16,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplingFrequencyExt;

    fn residual_amplitude(variant: FilterVariant, hum_hz: f32, amplitude: f32) -> i32 {
        let fs = 200.sps();
        let mut filter = DigitalFilterBank::new(variant, fs, 512);
        let mut lo = i32::MAX;
        let mut hi = i32::MIN;
        for i in 0..2000 {
            let t = i as f32 / fs.raw();
            let hum = amplitude * (2.0 * PI * hum_hz * t + 0.3).sin();
            let out = filter.update((512.0 + hum).round() as u16);
            if i >= 1000 {
                lo = lo.min(out.raw);
                hi = hi.max(out.raw);
            }
        }
        (hi - lo) / 2
    }

    #[test]
    fn notches_attenuate_their_design_frequency() {
        for (variant, hz) in [
            (FilterVariant::Notch50Wide, 50.0),
            (FilterVariant::Notch50Narrow, 50.0),
            (FilterVariant::Notch60, 60.0),
        ] {
            let residual = residual_amplitude(variant, hz, 100.0);
            assert!(residual < 10, "{:?}: residual {}", variant, residual);
        }
    }

    #[test]
    fn flat_input_passes_through() {
        let mut filter = DigitalFilterBank::new(FilterVariant::LowPass40, 200.sps(), 512);
        for _ in 0..100 {
            assert_eq!(filter.update(512).raw, 512);
        }
    }

    #[test]
    fn offset_tracker_is_slew_limited() {
        let mut filter = DigitalFilterBank::new(FilterVariant::Notch50Wide, 200.sps(), 512);
        let mut prev = filter.offset();
        for sample in [1023, 1023, 0, 0, 0, 700, 512, 512] {
            filter.update(sample);
            assert!((filter.offset() - prev).abs() <= 1);
            prev = filter.offset();
        }
        assert_eq!(filter.offset(), 512);
    }

    #[test]
    fn low_pass_overshoot_is_clamped_but_raw_is_kept() {
        let mut filter = DigitalFilterBank::new(FilterVariant::LowPass40, 200.sps(), 0);
        let out: Vec<Conditioned> = [1023, 1023, 1023, 0, 0, 0]
            .iter()
            .map(|&s| filter.update(s))
            .collect();

        assert_eq!(out[2].raw, 1068);
        assert_eq!(out[2].clamped, 1023);
        assert_eq!(out[5].raw, -54);
        assert_eq!(out[5].clamped, 0);
        assert_eq!(out[4].raw, out[4].clamped as i32);
    }

    #[test]
    fn designed_coefficients_match_tables() {
        let fs = 200.0.sps();
        assert_eq!(Biquad::notch(fs, 50.0, 1.0), Biquad::NOTCH_50_WIDE);
        assert_eq!(Biquad::notch(fs, 50.0, 2.0), Biquad::NOTCH_50_NARROW);
        assert_eq!(Biquad::notch(fs, 60.0, 1.0), Biquad::NOTCH_60);
        assert_eq!(Biquad::low_pass(fs, 40.0), Biquad::LOW_PASS_40);
    }

    #[test]
    fn other_rates_keep_unity_dc_gain() {
        let fs = 500.sps();
        for variant in [FilterVariant::Notch50Wide, FilterVariant::LowPass40] {
            let Biquad { b, a } = variant.coefficients(fs);
            let num: i32 = b.iter().sum();
            let den: i32 = 65536 + a[0] + a[1];
            assert!((num - den).abs() <= 3, "{:?}: {} vs {}", variant, num, den);
        }
    }
}
