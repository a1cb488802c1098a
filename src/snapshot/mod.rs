//! Session snapshots and the storage they are kept in.
//!
//! # Blob Format
//!
//! ```text
//! Header (40 bytes):
//!   Magic: "LIFE" (4 bytes)
//!   Version: u16
//!   Flags: u16 (bit 0 = LZ4)
//!   Width: u32
//!   Height: u32
//!   Density: u32
//!   Frequency: f64
//!   Born mask: u16
//!   Survive mask: u16
//!   Reserved: 8 bytes
//!
//! Cells (width * height bytes, optionally LZ4 compressed):
//!   Row-major, 0 = dead, 1 = alive
//! ```

mod format;
mod storage;

pub use format::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SessionSnapshot, SnapshotError, SnapshotHeader};
pub use storage::{DirStorage, MemoryStorage, Storage, StorageError};
