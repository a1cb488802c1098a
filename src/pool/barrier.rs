//! Completion barrier over a fixed number of workers.

use super::CommandTag;

/// Counts outstanding commands across the pool.
///
/// `waiting` starts at the pool size and drops by one per command sent. The
/// barrier is reached when every sent command has reported completion,
/// i.e. when `waiting` is back to the pool size.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    total: usize,
    waiting: usize,
}

impl CompletionBarrier {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            waiting: total,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Commands still in flight.
    #[inline]
    pub fn busy(&self) -> usize {
        self.total - self.waiting
    }

    /// True when no command is in flight.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.waiting == self.total
    }

    /// Record `count` commands sent.
    pub fn dispatched(&mut self, count: usize) {
        debug_assert!(count <= self.waiting, "more commands in flight than workers");
        self.waiting = self.waiting.saturating_sub(count);
    }

    /// Take back `count` commands that were counted but never delivered.
    pub fn cancelled(&mut self, count: usize) {
        self.waiting = (self.waiting + count).min(self.total);
    }

    /// Record one completion. Returns the completed tag when this completion
    /// satisfies the barrier.
    pub fn complete(&mut self, tag: Option<CommandTag>) -> Option<Option<CommandTag>> {
        debug_assert!(self.waiting < self.total, "completion without dispatch");
        self.waiting = (self.waiting + 1).min(self.total);
        self.is_idle().then_some(tag)
    }
}
