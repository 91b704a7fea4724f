//! Fixed-edge bucketed histograms.

/// Latency bucket edges in milliseconds (rendered as seconds).
pub const TIME_EDGES_MS: &[u64] = &[
    30_000, 60_000, 90_000, 120_000, 150_000, 180_000, 240_000, 300_000, 360_000, 480_000,
    600_000, 900_000, 1_200_000, 1_800_000, 2_400_000, 3_600_000,
];

/// Memory bucket edges in bytes (rendered as decimal megabytes).
pub const MEMORY_EDGES_BYTES: &[u64] = &[
    100_000_000,
    200_000_000,
    300_000_000,
    400_000_000,
    500_000_000,
    600_000_000,
    800_000_000,
    1_000_000_000,
    1_200_000_000,
    1_500_000_000,
    2_000_000_000,
    2_500_000_000,
    3_000_000_000,
    4_000_000_000,
    5_000_000_000,
    6_000_000_000,
    8_000_000_000,
    10_000_000_000,
];

/// Returns the bucket for `value`: the index of the smallest edge `>= value`,
/// or `edges.len()` (the overflow bucket) if `value` exceeds every edge.
///
/// `edges` must be strictly increasing.
#[must_use]
pub fn find_cut_index(edges: &[u64], value: u64) -> usize {
    edges.partition_point(|&edge| edge < value)
}

/// Counts of values per bucket.
///
/// `counts` has one more slot than `edges`; the last slot is the open-ended
/// overflow bucket. Edge tables are constants and never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    edges: &'static [u64],
    counts: Vec<u64>,
}

impl Histogram {
    /// Creates an empty histogram over `edges`.
    #[must_use]
    pub fn new(edges: &'static [u64]) -> Self {
        debug_assert!(edges.windows(2).all(|w| w[0] < w[1]));
        Self {
            edges,
            counts: vec![0; edges.len() + 1],
        }
    }

    /// Records one value.
    pub fn record(&mut self, value: u64) {
        let idx = find_cut_index(self.edges, value);
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    /// Zeroes every bucket.
    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    /// Returns the bucket edges.
    #[must_use]
    pub const fn edges(&self) -> &'static [u64] {
        self.edges
    }

    /// Returns the bucket counts, overflow last.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Returns the number of values recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns the index of the highest non-empty bucket.
    #[must_use]
    pub fn highest_nonzero(&self) -> Option<usize> {
        self.counts.iter().rposition(|&c| c != 0)
    }
}
