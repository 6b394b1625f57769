/// Isoelectric level estimate.
///
/// Each sample is blended in with weight `1 / (diff² + (sample - g)² + 1)`, so the estimate
/// follows quiet stretches of the trace and barely moves during the QRS complex or the T wave.
pub struct BaselineTracker {
    level: Option<f32>,
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BaselineTracker {
    pub fn new() -> Self {
        Self { level: None }
    }

    pub fn clear(&mut self) {
        self.level = None;
    }

    /// Current baseline, `None` before the first sample.
    pub fn level(&self) -> Option<f32> {
        self.level
    }

    pub fn update(&mut self, diff: i32, sample: i32) -> f32 {
        let sample = sample as f32;
        let g = match self.level {
            // Start from the first sample, a far off guess would take minutes to converge
            None => sample,
            Some(g) => {
                let diff = diff as f32;
                let error = sample - g;
                let f = 1.0 / (diff * diff + error * error + 1.0);
                g * (1.0 - f) + sample * f
            }
        };
        self.level = Some(g);
        g
    }
}
