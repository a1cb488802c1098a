//! Parallel Life - a multi-threaded Game of Life engine.
//!
//! The grid lives in one shared byte region holding two generation buffers
//! and a record of what was last drawn. A pool of worker threads each owns a
//! horizontal band of rows: they evolve their band, then draw only the cells
//! that changed onto their own canvas. A coordinator counts completions and
//! moves the pool through evolve, swap and render phases.
//!
//! # Architecture
//!
//! - `schema`: Configuration and rule sets
//! - `compute`: Grid storage, evolution, partitioning and rendering
//! - `pool`: Worker threads, command protocol, barrier and coordinator
//! - `session`: Tick loop and request queue tying everything together
//! - `snapshot`: Binary snapshots and pluggable storage
//!
//! # Example
//!
//! ```rust,no_run
//! use parallel_life::{Session, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     width: 64,
//!     height: 48,
//!     ..SimulationConfig::default()
//! };
//!
//! let mut session: Session = Session::start(config).unwrap();
//! session.run_ticks(100).unwrap();
//! println!(
//!     "generation {}: {} alive",
//!     session.generation(),
//!     session.alive_count()
//! );
//!
//! let frame = session.into_frame();
//! println!("frame is {}x{}", frame.width, frame.height);
//! ```

pub mod compute;
pub mod pool;
pub mod schema;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use compute::{EvolutionEngine, Frame, GridState, Partition, PartitionedRenderer, Surface};
pub use pool::{Coordinator, Envelope, WorkerUnit};
pub use schema::{RuleSet, SimulationConfig};
pub use session::{Session, SessionError, StopHandle};
pub use snapshot::{DirStorage, MemoryStorage, SessionSnapshot, Storage};
