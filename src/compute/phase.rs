//! Phase tokens gating access to the shared grid.
//!
//! Workers touch the grid without locks. Correctness depends on the
//! coordinator's barrier keeping phases apart, so each kind of access takes a
//! zero-sized token that only this crate can mint. The coordinator mints one
//! per dispatched command and the receiving operation consumes it.

/// Read `current()`, write `next()` for one partition.
#[derive(Debug)]
pub struct EvolvePhase {
    _private: (),
}

/// Read `current()`, write `lastRendered` for one partition.
#[derive(Debug)]
pub struct RenderPhase {
    _private: (),
}

/// Write `current()` (clear, randomize, paint).
#[derive(Debug)]
pub struct EditPhase {
    _private: (),
}

/// Flip the active buffer. Issued once per completed evolve barrier.
#[derive(Debug)]
pub struct SwapPermit {
    _private: (),
}

impl EvolvePhase {
    #[inline]
    pub(crate) fn mint() -> Self {
        Self { _private: () }
    }
}

impl RenderPhase {
    #[inline]
    pub(crate) fn mint() -> Self {
        Self { _private: () }
    }
}

impl EditPhase {
    #[inline]
    pub(crate) fn mint() -> Self {
        Self { _private: () }
    }
}

impl SwapPermit {
    #[inline]
    pub(crate) fn mint() -> Self {
        Self { _private: () }
    }
}
