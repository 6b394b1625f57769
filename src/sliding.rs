//! Fixed capacity ring buffer with a runtime length.

#[derive(Clone, Debug)]
pub struct SlidingWindow<T, const N: usize> {
    buffer: [T; N],
    len: usize,
    idx: usize,
    full: bool,
}

impl<T: Default + Copy, const N: usize> Default for SlidingWindow<T, N> {
    fn default() -> Self {
        Self::new(N)
    }
}

impl<T, const N: usize> SlidingWindow<T, N>
where
    T: Default + Copy,
{
    /// Creates a window holding the last `len` values. `len` is clamped to `1..=N`.
    pub fn new(len: usize) -> Self {
        Self {
            buffer: [T::default(); N],
            len: len.clamp(1, N),
            idx: 0,
            full: false,
        }
    }

    pub fn clear(&mut self) {
        self.idx = 0;
        self.full = false;
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.len
        } else {
            self.idx
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value that the next `push` will evict, if the window is full.
    pub fn oldest(&self) -> Option<T> {
        self.full.then(|| self.buffer[self.idx])
    }

    /// Overwrites every slot with `value` and marks the window full.
    pub fn fill(&mut self, value: T) {
        self.buffer[..self.len].fill(value);
        self.idx = 0;
        self.full = true;
    }

    /// Stores `sample`, returning the evicted value once the window is full.
    pub fn push(&mut self, sample: T) -> Option<T> {
        let old = self.oldest();

        self.buffer[self.idx] = sample;
        self.idx = (self.idx + 1) % self.len;
        if self.idx == 0 {
            self.full = true;
        }

        old
    }

    pub fn iter_unordered(&self) -> impl Iterator<Item = T> + Clone + '_ {
        self.buffer[..self.len()].iter().copied()
    }
}
