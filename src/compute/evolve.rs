//! Evolution engine - next-generation computation and grid edits.
//!
//! Each worker owns one engine. `evolve` is a pure function of `current()`
//! and the rule set over the worker's partition, so disjoint partitions can
//! be evolved in parallel without coordination.

use std::sync::atomic::{AtomicU8, Ordering};

use rand::prelude::*;

use super::{DEAD, EditPhase, EvolvePhase, GridState, Partition};
use crate::schema::RuleSet;

/// Maximum random patch radius as a fraction of the smaller grid dimension.
pub const RANDOM_RADIUS_FRACTION: f32 = 0.1;

/// Per-worker evolution engine.
pub struct EvolutionEngine {
    rules: RuleSet,
    rng: StdRng,
}

impl EvolutionEngine {
    /// Create an engine with a deterministic RNG seed.
    pub fn new(rules: RuleSet, seed: u64) -> Self {
        Self {
            rules,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create an engine with an entropy-seeded RNG.
    pub fn from_entropy(rules: RuleSet) -> Self {
        Self {
            rules,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Replace the local rule set copy.
    pub fn set_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    /// Compute the next generation of `partition` from `current()` into `next()`.
    pub fn evolve(&self, grid: &GridState, partition: Partition, _phase: EvolvePhase) {
        let width = grid.width();
        let height = grid.height();
        let current = grid.current();
        let next = grid.next();

        for idx in partition.range() {
            let (x, y) = grid.coords(idx);
            let alive = current[idx].load(Ordering::Relaxed) != DEAD;
            let neighbors = count_neighbors(current, width, height, x, y);
            let value = u8::from(self.rules.next_state(alive, neighbors));
            next[idx].store(value, Ordering::Relaxed);
        }
    }

    /// Paint `passes` random circular patches anywhere on the grid.
    ///
    /// Every cell inside a patch gets a fresh random bit. Patches wrap around
    /// the edges and may overlap patches from other workers.
    pub fn randomize(&mut self, grid: &GridState, passes: u32, _phase: EditPhase) {
        let width = grid.width();
        let height = grid.height();
        let current = grid.current();
        let max_radius =
            ((width.min(height) as f32 * RANDOM_RADIUS_FRACTION) as i64).max(1);

        for _ in 0..passes {
            let cx = self.rng.gen_range(0..width) as i64;
            let cy = self.rng.gen_range(0..height) as i64;
            let radius = self.rng.gen_range(1..=max_radius);
            let radius_sq = radius * radius;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy > radius_sq {
                        continue;
                    }
                    let x = wrap(cx + dx, width);
                    let y = wrap(cy + dy, height);
                    let bit = u8::from(self.rng.gen_bool(0.5));
                    current[y * width + x].store(bit, Ordering::Relaxed);
                }
            }
        }
    }

    /// Kill every cell of `partition` in `current()`.
    pub fn clear(&self, grid: &GridState, partition: Partition, _phase: EditPhase) {
        for cell in &grid.current()[partition.range()] {
            cell.store(DEAD, Ordering::Relaxed);
        }
    }
}

#[inline]
fn wrap(v: i64, len: usize) -> usize {
    v.rem_euclid(len as i64) as usize
}

/// Count live cells among the 8 toroidal neighbor offsets of (x, y).
///
/// On a grid 1 or 2 cells wide (or tall) several offsets wrap onto the same
/// cell, including (x, y) itself; each offset is counted separately.
#[inline]
pub fn count_neighbors(cells: &[AtomicU8], width: usize, height: usize, x: usize, y: usize) -> u8 {
    let cols = [(x + width - 1) % width, x, (x + 1) % width];
    let rows = [(y + height - 1) % height, y, (y + 1) % height];

    let mut count = 0u8;
    for (dy, &row) in rows.iter().enumerate() {
        let base = row * width;
        for (dx, &col) in cols.iter().enumerate() {
            if (dx, dy) == (1, 1) {
                continue;
            }
            count += u8::from(cells[base + col].load(Ordering::Relaxed) != DEAD);
        }
    }
    count
}
