//! Median selection and exponential blending shared by the beat metrics.

use crate::sliding::SlidingWindow;

/// Middle value of three, without sorting.
///
/// ```rust
/// use qt_monitor::smoothing::median_of_three;
///
/// assert_eq!(median_of_three(72.0, 140.0, 75.0), 75.0);
/// ```
pub fn median_of_three(c: f32, d: f32, e: f32) -> f32 {
    if c > d {
        if d > e {
            d
        } else if c > e {
            e
        } else {
            c
        }
    } else if c > e {
        c
    } else if d > e {
        e
    } else {
        d
    }
}

/// Middle value of five, without sorting.
pub fn median_of_five(a: f32, b: f32, c: f32, d: f32, e: f32) -> f32 {
    let (a, b) = ordered(a, b);
    let (c, d) = ordered(c, d);

    // The smaller pair minimum lies below three other values, drop it. The median is then the
    // second smallest of the remaining four.
    let (x1, x2, y) = if a < c { (c, d, b) } else { (a, b, d) };
    let (y1, y2) = ordered(y, e);

    if x1 < y1 {
        x2.min(y1)
    } else {
        x1.min(y2)
    }
}

#[inline]
fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// The last `N` raw estimates of one metric. The first estimate fills every slot so that a fresh
/// window never drags the median toward zero.
///
/// Only windows of 3 and 5 exist, other lengths do not compile:
///
/// ```compile_fail
/// use qt_monitor::smoothing::MedianWindow;
///
/// let _window = MedianWindow::<4>::new();
/// ```
#[derive(Clone, Debug)]
pub struct MedianWindow<const N: usize> {
    window: SlidingWindow<f32, N>,
}

impl<const N: usize> Default for MedianWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MedianWindow<N> {
    const SUPPORTED_LENGTH: () = assert!(N == 3 || N == 5, "median windows are 3 or 5 long");

    pub fn new() -> Self {
        let () = Self::SUPPORTED_LENGTH;
        Self {
            window: SlidingWindow::default(),
        }
    }

    /// Adds a raw estimate and returns the median of the window.
    pub fn push(&mut self, value: f32) -> f32 {
        if self.window.is_empty() {
            self.window.fill(value);
        } else {
            self.window.push(value);
        }

        let mut v = [0.0; 5];
        for (slot, x) in v.iter_mut().zip(self.window.iter_unordered()) {
            *slot = x;
        }

        match N {
            3 => median_of_three(v[0], v[1], v[2]),
            _ => median_of_five(v[0], v[1], v[2], v[3], v[4]),
        }
    }
}

/// Single pole smoother: `value += (x - value) * weight`.
///
/// The first update adopts the estimate as is.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialSmoother {
    value: f32,
    weight: f32,
    primed: bool,
}

impl ExponentialSmoother {
    /// BPM and QT: `(s * 5 + x) / 6`.
    pub const ONE_SIXTH: f32 = 1.0 / 6.0;
    /// PAT: `s + (x - s) / 4`.
    pub const ONE_QUARTER: f32 = 0.25;

    pub fn new(initial: f32, weight: f32) -> Self {
        Self {
            value: initial,
            weight,
            primed: false,
        }
    }

    pub fn update(&mut self, x: f32) -> f32 {
        if self.primed {
            self.value += (x - self.value) * self.weight;
        } else {
            self.value = x;
            self.primed = true;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn permutations(values: &[f32]) -> Vec<Vec<f32>> {
        if values.len() <= 1 {
            return vec![values.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..values.len() {
            let mut rest = values.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn median_of_three_all_orderings() {
        let orderings = permutations(&[1.0, 2.0, 3.0]);
        assert_eq!(orderings.len(), 6);
        for p in orderings {
            assert_eq!(median_of_three(p[0], p[1], p[2]), 2.0, "{:?}", p);
        }
    }

    #[test]
    fn median_of_five_all_orderings() {
        let orderings = permutations(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(orderings.len(), 120);
        for p in orderings {
            assert_eq!(median_of_five(p[0], p[1], p[2], p[3], p[4]), 30.0, "{:?}", p);
        }
    }

    #[test]
    fn median_handles_ties() {
        assert_eq!(median_of_three(5.0, 5.0, 1.0), 5.0);
        assert_eq!(median_of_five(1.0, 1.0, 9.0, 9.0, 9.0), 9.0);
        assert_eq!(median_of_five(1.0, 1.0, 1.0, 9.0, 9.0), 1.0);
    }

    proptest! {
        #[test]
        fn median_of_five_matches_sort(values in prop::array::uniform5(-1000.0f32..1000.0)) {
            let mut sorted = values;
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let [a, b, c, d, e] = values;
            prop_assert_eq!(median_of_five(a, b, c, d, e), sorted[2]);
            prop_assert_eq!(median_of_five(e, d, c, b, a), sorted[2]);
        }
    }

    #[test]
    fn median_window_rejects_single_outlier() {
        let mut window = MedianWindow::<5>::new();
        assert_eq!(window.push(360.0), 360.0);
        assert_eq!(window.push(900.0), 360.0);
        assert_eq!(window.push(365.0), 360.0);
        assert_eq!(window.push(370.0), 365.0);

        let mut window = MedianWindow::<3>::new();
        assert_eq!(window.push(75.0), 75.0);
        assert_eq!(window.push(150.0), 75.0);
        assert_eq!(window.push(76.0), 76.0);
    }

    #[test]
    fn exponential_smoother_seeds_then_blends() {
        let mut s = ExponentialSmoother::new(60.0, ExponentialSmoother::ONE_SIXTH);
        assert_eq!(s.value(), 60.0);
        assert_eq!(s.update(90.0), 90.0);
        let v = s.update(96.0);
        assert!((v - 91.0).abs() < 1e-4);

        let mut s = ExponentialSmoother::new(0.0, ExponentialSmoother::ONE_QUARTER);
        s.update(100.0);
        assert!((s.update(200.0) - 125.0).abs() < 1e-4);
    }

    #[test]
    fn one_sixth_weight_closes_two_thirds_of_a_step_in_six_updates() {
        let mut s = ExponentialSmoother::new(60.0, ExponentialSmoother::ONE_SIXTH);
        s.update(60.0);
        for _ in 0..6 {
            s.update(90.0);
        }
        // (5/6)^6 = 0.335
        let remaining = (90.0 - s.value()) / 30.0;
        assert!(remaining < 0.34 && remaining > 0.33, "{}", remaining);
    }
}
