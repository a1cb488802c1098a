//! Pool module - Worker threads, the coordinator barrier and the tick timer.
//!
//! The coordinator talks to every worker over its own command channel and
//! collects completions from one shared notification channel. Workers never
//! talk to each other.

mod barrier;
mod command;
mod coordinator;
mod ticker;
mod worker;

pub use barrier::*;
pub use command::*;
pub use coordinator::*;
pub use ticker::*;
pub use worker::*;
