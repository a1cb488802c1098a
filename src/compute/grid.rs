//! Shared double-buffered cell grid.
//!
//! All three cell arrays and the control byte live in one contiguous region:
//!
//! ```text
//! [ buffer A | buffer B | lastRendered | control ]
//!   w*h        w*h        w*h            1
//! ```
//!
//! Cells are `AtomicU8` accessed with `Relaxed` ordering. Workers read and
//! write the region concurrently without locks; phase separation comes from
//! the coordinator's barrier, and the command/notification channels provide
//! the happens-before edges between phases.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

use rayon::prelude::*;

use super::{Partition, SwapPermit};

/// Dead cell.
pub const DEAD: u8 = 0;
/// Live cell.
pub const ALIVE: u8 = 1;
/// `lastRendered` sentinel that never equals a real cell value.
pub const STALE: u8 = 0xFF;

/// Grid state shared by the coordinator and every worker.
pub struct GridState {
    width: usize,
    height: usize,
    region: Box<[AtomicU8]>,
}

impl GridState {
    /// Allocate an all-dead grid. `lastRendered` starts stale.
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        let region: Box<[AtomicU8]> = (0..3 * size + 1)
            .map(|i| {
                let v = if (2 * size..3 * size).contains(&i) {
                    STALE
                } else {
                    DEAD
                };
                AtomicU8::new(v)
            })
            .collect();

        Self {
            width,
            height,
            region,
        }
    }

    /// Build a grid whose current buffer holds `cells` (row-major).
    ///
    /// Values other than 0 are stored as alive. Missing trailing cells are dead.
    pub fn from_cells(width: usize, height: usize, cells: &[u8]) -> Self {
        let grid = Self::new(width, height);
        for (cell, &v) in grid.current().iter().zip(cells) {
            cell.store(u8::from(v != DEAD), Ordering::Relaxed);
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    /// Convert (x, y) to a flat index.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Convert a flat index to (x, y).
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    #[inline]
    fn control(&self) -> &AtomicU8 {
        &self.region[3 * self.size()]
    }

    /// Which buffer (0 = A, 1 = B) is current.
    #[inline]
    pub fn active_buffer(&self) -> u8 {
        self.control().load(Ordering::Acquire)
    }

    #[inline]
    fn buffer(&self, which: u8) -> &[AtomicU8] {
        let size = self.size();
        let offset = usize::from(which) * size;
        &self.region[offset..offset + size]
    }

    /// Authoritative cell states.
    #[inline]
    pub fn current(&self) -> &[AtomicU8] {
        self.buffer(self.active_buffer())
    }

    /// Buffer receiving the next generation.
    #[inline]
    pub fn next(&self) -> &[AtomicU8] {
        self.buffer(self.active_buffer() ^ 1)
    }

    /// Last value drawn for each cell.
    #[inline]
    pub fn last_rendered(&self) -> &[AtomicU8] {
        let size = self.size();
        &self.region[2 * size..3 * size]
    }

    /// Make `next()` current. Cell contents are untouched.
    pub fn swap(&self, _permit: SwapPermit) {
        self.control().fetch_xor(1, Ordering::AcqRel);
    }

    /// Cell value at (x, y) in `current()`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.current()[self.index(x, y)].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y) != DEAD
    }

    /// Set the cell at (x, y) in `current()`.
    pub fn set(&self, x: usize, y: usize, alive: bool) {
        self.current()[self.index(x, y)].store(u8::from(alive), Ordering::Relaxed);
    }

    /// Flip the cell at (x, y) in `current()`. Returns the new state.
    pub fn toggle(&self, x: usize, y: usize) -> bool {
        let previous = self.current()[self.index(x, y)].fetch_xor(ALIVE, Ordering::Relaxed);
        previous == DEAD
    }

    /// Force the cells in `range` to redraw on the next render.
    pub fn mark_stale(&self, range: Range<usize>) {
        for cell in &self.last_rendered()[range] {
            cell.store(STALE, Ordering::Relaxed);
        }
    }

    /// Force the whole grid to redraw on the next render.
    pub fn mark_all_stale(&self) {
        self.mark_stale(0..self.size());
    }

    /// Number of live cells in `current()`.
    pub fn alive_count(&self) -> usize {
        self.current()
            .par_iter()
            .filter(|c| c.load(Ordering::Relaxed) != DEAD)
            .count()
    }

    /// Number of live cells in `current()` within a partition.
    pub fn alive_in(&self, partition: Partition) -> usize {
        self.current()[partition.range()]
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) != DEAD)
            .count()
    }

    /// Flat dump of `current()`.
    pub fn current_bytes(&self) -> Vec<u8> {
        self.current()
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Copy the overlapping top-left region of `current()` into a grid of a
    /// different size.
    pub fn resized(&self, width: usize, height: usize) -> Self {
        let grid = Self::new(width, height);
        for y in 0..self.height.min(height) {
            for x in 0..self.width.min(width) {
                grid.set(x, y, self.is_alive(x, y));
            }
        }
        grid
    }
}

impl std::fmt::Debug for GridState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridState")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("active_buffer", &self.active_buffer())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(cells: &[AtomicU8]) -> Vec<u8> {
        cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    #[test]
    fn test_new_grid_layout() {
        let grid = GridState::new(4, 3);
        assert_eq!(grid.size(), 12);
        assert_eq!(grid.active_buffer(), 0);
        assert!(load(grid.current()).iter().all(|&v| v == DEAD));
        assert!(load(grid.last_rendered()).iter().all(|&v| v == STALE));
    }

    #[test]
    fn test_swap_flips_buffers() {
        let grid = GridState::new(3, 3);
        grid.next()[4].store(ALIVE, Ordering::Relaxed);
        let next_before = load(grid.next());
        let current_before = load(grid.current());

        grid.swap(SwapPermit::mint());

        assert_eq!(grid.active_buffer(), 1);
        assert_eq!(load(grid.current()), next_before);
        assert_eq!(load(grid.next()), current_before);

        grid.swap(SwapPermit::mint());
        assert_eq!(grid.active_buffer(), 0);
    }

    #[test]
    fn test_set_toggle_and_count() {
        let grid = GridState::new(5, 5);
        grid.set(1, 2, true);
        assert!(grid.is_alive(1, 2));
        assert!(grid.toggle(4, 4));
        assert!(!grid.toggle(1, 2));
        assert_eq!(grid.alive_count(), 1);
        assert_eq!(grid.coords(grid.index(4, 4)), (4, 4));
    }

    #[test]
    fn test_from_cells_and_resize() {
        let grid = GridState::from_cells(3, 2, &[1, 0, 2, 0, 1, 0]);
        assert_eq!(grid.current_bytes(), vec![1, 0, 1, 0, 1, 0]);

        let bigger = grid.resized(4, 3);
        assert_eq!(bigger.current_bytes(), vec![1, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

        let smaller = grid.resized(2, 1);
        assert_eq!(smaller.current_bytes(), vec![1, 0]);
    }

    #[test]
    fn test_mark_stale() {
        let grid = GridState::new(2, 2);
        for cell in grid.last_rendered() {
            cell.store(DEAD, Ordering::Relaxed);
        }
        grid.mark_stale(2..4);
        assert_eq!(load(grid.last_rendered()), vec![0, 0, STALE, STALE]);
    }
}
