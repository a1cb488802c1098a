//! Row-aligned partitioning of the grid across workers.

use std::num::NonZeroUsize;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Worker count used when available parallelism cannot be detected.
pub const FALLBACK_WORKERS: usize = 3;

/// Contiguous half-open range of flat cell indices owned by one worker.
///
/// Always aligned to row boundaries, so `start` and `end` are multiples of the
/// grid width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    /// Partition covering rows `[row_start, row_end)`.
    pub fn rows(width: usize, row_start: usize, row_end: usize) -> Self {
        Self {
            start: row_start * width,
            end: row_end * width,
        }
    }

    /// Partition covering the whole grid.
    pub fn whole(width: usize, height: usize) -> Self {
        Self::rows(width, 0, height)
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// First row covered.
    #[inline]
    pub fn first_row(&self, width: usize) -> usize {
        self.start / width
    }

    /// Number of rows covered.
    #[inline]
    pub fn row_count(&self, width: usize) -> usize {
        self.len() / width
    }
}

/// Split `height` rows into `workers` contiguous partitions.
///
/// The first `height % workers` partitions get one extra row. Callers keep
/// `workers <= height` so no partition is empty.
pub fn partition_rows(width: usize, height: usize, workers: usize) -> Vec<Partition> {
    let workers = workers.max(1);
    let base = height / workers;
    let extra = height % workers;

    let mut partitions = Vec::with_capacity(workers);
    let mut row = 0;
    for i in 0..workers {
        let rows = base + usize::from(i < extra);
        partitions.push(Partition::rows(width, row, row + rows));
        row += rows;
    }
    partitions
}

/// Worker count for a hardware parallelism hint.
///
/// Reserves one core for the coordinating thread, keeps at least one worker,
/// and never exceeds the number of rows.
pub fn worker_count(hint: Option<NonZeroUsize>, height: usize) -> usize {
    let workers = match hint {
        Some(n) => n.get().saturating_sub(1).max(1),
        None => FALLBACK_WORKERS,
    };
    workers.min(height.max(1))
}

/// Worker count from the running machine's available parallelism.
pub fn detect_worker_count(height: usize) -> usize {
    worker_count(std::thread::available_parallelism().ok(), height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let parts = partition_rows(10, 8, 4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], Partition { start: 0, end: 20 });
        assert_eq!(parts[3], Partition { start: 60, end: 80 });
    }

    #[test]
    fn test_remainder_goes_first() {
        let parts = partition_rows(5, 7, 3);
        let rows: Vec<usize> = parts.iter().map(|p| p.row_count(5)).collect();
        assert_eq!(rows, vec![3, 2, 2]);
        assert_eq!(parts[1].first_row(5), 3);
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(NonZeroUsize::new(8), 100), 7);
        assert_eq!(worker_count(NonZeroUsize::new(1), 100), 1);
        assert_eq!(worker_count(None, 100), FALLBACK_WORKERS);
        // Never more workers than rows
        assert_eq!(worker_count(NonZeroUsize::new(64), 4), 4);
    }

    proptest! {
        #[test]
        fn partitions_tile_the_grid(
            width in 1usize..40,
            height in 1usize..60,
            workers in 1usize..16,
        ) {
            let workers = workers.min(height);
            let parts = partition_rows(width, height, workers);

            prop_assert_eq!(parts.len(), workers);
            prop_assert_eq!(parts[0].start, 0);
            prop_assert_eq!(parts[workers - 1].end, width * height);
            for pair in parts.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            for p in &parts {
                prop_assert!(!p.is_empty());
                prop_assert_eq!(p.start % width, 0);
                prop_assert_eq!(p.end % width, 0);
            }
        }
    }
}
