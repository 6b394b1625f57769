use crate::{sampling::SamplingFrequency, sliding::SlidingWindow};

/// Longest supported lag. `round(fs / 65)` stays below this up to about 2 kHz.
pub const MAX_LAG: usize = 31;

/// `x[i] - x[i - lag]` over the conditioned ECG.
pub struct Differentiator {
    lag: usize,
    delay: SlidingWindow<i32, { MAX_LAG + 1 }>,
}

impl Differentiator {
    pub fn new(fs: SamplingFrequency) -> Self {
        let lag = fs.differentiator_lag().clamp(1, MAX_LAG);
        Self {
            lag,
            delay: SlidingWindow::new(lag + 1),
        }
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn clear(&mut self) {
        self.delay.clear();
    }

    /// Returns 0 until `lag` samples of history are available.
    pub fn update(&mut self, sample: i32) -> i32 {
        // The window holds lag + 1 values, the oldest one is x[i - lag] after this push
        self.delay.push(sample);
        match self.delay.oldest() {
            Some(past) => sample - past,
            None => 0,
        }
    }
}
