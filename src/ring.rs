use std::collections::VecDeque;

/// Appends `value` and drops from the front until `buf.len() <= limit`.
pub fn push<T>(mut buf: Vec<T>, value: T, limit: usize) -> Vec<T> {
    buf.push(value);
    if buf.len() > limit {
        let excess = buf.len() - limit;
        buf.drain(..excess);
    }
    buf
}

/// Number of samples needed so that `window_seconds` of wall-clock time is
/// covered at one sample per `poll_interval_ms`. Never less than one.
pub fn capacity_for(window_seconds: u64, poll_interval_ms: u64) -> usize {
    if poll_interval_ms == 0 {
        return 1;
    }
    let window_ms = window_seconds.saturating_mul(1000);
    window_ms.div_ceil(poll_interval_ms).max(1) as usize
}

/// Fixed-capacity FIFO window. Pushing past the limit evicts the oldest value.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    limit: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            items: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.items.len() == self.limit {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }

    /// Changes the capacity. On shrink the oldest values are dropped; nothing
    /// is re-sampled.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.items.len() > self.limit {
            self.items.pop_front();
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders values as a unicode sparkline scaled to the window's own range.
pub fn sparkline(values: &[f64]) -> String {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                return ' ';
            }
            if max <= min {
                return BARS[0];
            }
            let idx = ((v - min) / (max - min) * (BARS.len() - 1) as f64).round() as usize;
            BARS[idx.min(BARS.len() - 1)]
        })
        .collect()
}
