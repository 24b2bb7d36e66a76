//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between a minimum and a maximum.
///
/// Expects `min <= max`, which callers are to enforce when validating their
/// parameters.
pub fn clamp<T: Float>(value: &T, min: &T, max: &T) -> T {
    if *value > *max {
        *max
    }
    else if *value < *min {
        *min
    }
    else {
        *value
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Rolling (boxcar) mean over the last `capacity` samples.
///
/// Until `capacity` samples have been pushed the mean is taken over however
/// many samples have been seen so far.
#[derive(Debug, Clone)]
pub struct RollingMean {
    samples: Vec<f64>,
    head: usize,
    len: usize,
    sum: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RollingMean {
    /// Create a new mean over a window of `capacity` samples.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![0.0; capacity],
            head: 0,
            len: 0,
            sum: 0.0,
        }
    }

    /// Push a new sample, evicting the oldest one if the window is full, and
    /// return the updated mean.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.len == self.samples.len() {
            self.sum -= self.samples[self.head];
        }
        else {
            self.len += 1;
        }

        self.samples[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.samples.len();

        self.mean()
    }

    /// Current mean, or zero if no samples have been pushed yet.
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            0.0
        }
        else {
            self.sum / self.len as f64
        }
    }

    /// Number of samples currently inside the window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no samples have been pushed since construction or the last
    /// reset.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard all accumulated samples.
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
        self.sum = 0.0;

        for s in self.samples.iter_mut() {
            *s = 0.0;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
