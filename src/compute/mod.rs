//! Compute module - Grid state, evolution and rendering for Life simulations.

mod evolve;
mod grid;
mod partition;
mod phase;
mod render;

pub use evolve::*;
pub use grid::*;
pub use partition::*;
pub use phase::*;
pub use render::*;
