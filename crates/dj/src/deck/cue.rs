//! Ordered cue points with a cycling cursor.

/// Cue points of one deck, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueList {
    points: Vec<f64>,
    current: Option<usize>,
}

impl CueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cue point.
    ///
    /// Returns `false` without changing anything when `position_seconds` is
    /// not a positive number or an entry with exactly the same value exists.
    pub fn add(&mut self, position_seconds: f64) -> bool {
        if position_seconds.is_nan() || position_seconds <= 0.0 || self.contains(position_seconds) {
            return false;
        }
        self.points.push(position_seconds);
        true
    }

    /// Exact-value membership test.
    pub fn contains(&self, position_seconds: f64) -> bool {
        self.points.iter().any(|&p| p == position_seconds)
    }

    /// Remove every cue point and reset the cursor.
    pub fn clear(&mut self) {
        self.points.clear();
        self.current = None;
    }

    /// Advance the cursor to the next cue (wrapping) and return its position.
    ///
    /// The first call after a clear lands on the first cue.
    pub fn jump_next(&mut self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(index) => (index + 1) % self.points.len(),
            None => 0,
        };
        self.current = Some(next);
        Some(self.points[next])
    }

    /// Index of the last cue jumped to.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Position of the last cue jumped to.
    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
