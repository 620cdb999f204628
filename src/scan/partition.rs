use std::ops::RangeInclusive;

/// An inclusive range of block numbers, owned by exactly one scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// A range with `start > end` holds no blocks
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    /// Block numbers in ascending order
    pub fn blocks(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Splits `start..=end` into contiguous, non-overlapping ranges, one per worker
///
/// Each range gets `len / workers` blocks, and the last one is extended to `end` to absorb the
/// remainder. When there are more workers than blocks, the worker count is clamped to the number
/// of blocks, so every returned range holds at least one block.
/// An empty input range (`start > end`) yields no ranges.
pub fn partition(start: u64, end: u64, workers: usize) -> Vec<BlockRange> {
    let total = BlockRange::new(start, end);
    if total.is_empty() {
        return vec![];
    }

    // saturates only for the full u64 domain, and the last range still ends at `end`
    let len = total.len();
    let workers = (workers.max(1) as u64).min(len);
    let base = len / workers;

    (0..workers)
        .map(|i| {
            let from = start + i * base;
            let to = if i == workers - 1 {
                end
            } else {
                from + base - 1
            };
            BlockRange::new(from, to)
        })
        .collect()
}
