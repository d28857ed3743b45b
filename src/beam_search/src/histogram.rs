//! Counting the values of the children produced at one depth, and turning
//! those counts into the threshold that caps the next frontier at the beam
//! width.

/// Counts per value over the window `base..base + counts.len()`. The window
/// grows in either direction as values arrive; the values seen at a single
/// depth stay within a narrow band, so the window stays small even when the
/// values themselves are large.
#[derive(Clone, Debug, Default)]
pub struct Histogram {
    base: i64,
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, value: i64) {
        self.record_many(value, 1);
    }

    fn record_many(&mut self, value: i64, count: u64) {
        if self.counts.is_empty() {
            self.base = value;
            self.counts.push(0);
        } else if value < self.base {
            let shift = (self.base - value) as usize;
            // Leave slack below so that a run of decreasing values does not
            // shift the window every time
            let slack = shift.max(self.counts.len());
            let mut counts = vec![0; slack + self.counts.len()];
            counts[slack..].copy_from_slice(&self.counts);
            self.counts = counts;
            self.base -= slack as i64;
        }
        let index = (value - self.base) as usize;
        if index >= self.counts.len() {
            self.counts.resize(index + 1, 0);
        }
        self.counts[index] += count;
        self.total += count;
    }

    /// Fold another worker's counts into this one.
    pub fn merge(&mut self, other: &Histogram) {
        for (value, count) in other.iter() {
            self.record_many(value, count);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of values recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn count(&self, value: i64) -> u64 {
        value
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|index| self.counts.get(index).copied())
            .unwrap_or(0)
    }

    /// The nonzero buckets in increasing order of value.
    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(index, &count)| (self.base + index as i64, count))
    }

    /// The smallest value recorded.
    #[must_use]
    pub fn low(&self) -> Option<i64> {
        self.iter().next().map(|(value, _)| value)
    }

    /// The largest value recorded.
    #[must_use]
    pub fn high(&self) -> Option<i64> {
        self.counts
            .iter()
            .rposition(|&count| count > 0)
            .map(|index| self.base + index as i64)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.total = 0;
    }

    /// The threshold that keeps `width` values in expectation. Every bucket
    /// below the threshold is kept, the threshold bucket is kept in part,
    /// and everything above it is dropped.
    #[must_use]
    pub fn cutoff(&self, width: u64) -> Cutoff {
        let mut below = 0;
        for (value, count) in self.iter() {
            if below + count > width {
                #[allow(clippy::cast_precision_loss)]
                let keep_probability = (width - below) as f64 / count as f64;
                return Cutoff {
                    threshold: value,
                    keep_probability,
                };
            }
            below += count;
        }
        Cutoff::KEEP_ALL
    }
}

/// Frontier nodes valued below `threshold` are kept, nodes valued exactly
/// `threshold` are kept with `keep_probability`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cutoff {
    pub threshold: i64,
    pub keep_probability: f64,
}

impl Cutoff {
    pub const KEEP_ALL: Self = Self {
        threshold: i64::MAX,
        keep_probability: 1.0,
    };
}

/// Decides which nodes on the cutoff bucket survive. Rather than flipping an
/// independent coin per node, it adds the keep probability to a running sum
/// and keeps a node each time the sum crosses one, so that out of `k` ties
/// either `floor(k * p)` or `ceil(k * p)` survive.
#[derive(Clone, Debug)]
pub struct BoundaryAcceptor {
    cutoff: Cutoff,
    running: f64,
}

impl BoundaryAcceptor {
    /// A starting phase that keeps the first tie whenever the keep
    /// probability is at least 0.001. With the ties split over several
    /// workers, each worker then rounds its share up rather than down.
    pub const EAGER_PHASE: f64 = 0.999;

    /// `phase` in `[0, 1)` is where the running sum starts.
    #[must_use]
    pub fn new(cutoff: Cutoff, phase: f64) -> Self {
        debug_assert!((0.0..1.0).contains(&phase));
        Self {
            cutoff,
            running: phase,
        }
    }

    #[inline]
    pub fn accept(&mut self, value: i64) -> bool {
        if value < self.cutoff.threshold {
            return true;
        }
        if value > self.cutoff.threshold {
            return false;
        }
        self.running += self.cutoff.keep_probability;
        if self.running >= 1.0 {
            self.running -= 1.0;
            true
        } else {
            false
        }
    }
}
