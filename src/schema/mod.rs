//! Schema module - Configuration and rule types for Life simulations.

mod config;
mod rules;

pub use config::*;
pub use rules::*;
