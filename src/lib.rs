//! Diskpack: a simulated block-storage allocator with in-place defragmentation
//!
//! Models a minimal filesystem allocator the way early FAT-style systems
//! worked: a fixed arena of blocks, files stored as linked chains of block
//! indices, and a compaction pass that repacks every occupied block into
//! the lowest contiguous range while rewriting chain pointers as blocks
//! move.
//!
//! ## Components
//!
//! - [`arena`] - The block arena: occupancy, owner tags, index-based links
//! - [`catalog`] - Ordered file records (name, creation date, chain head)
//! - [`disk`] - The aggregate: create/delete files, random population,
//!   global block swap, consistency checking
//! - [`defrag`] - Stepwise write-cursor compaction
//! - [`error`] - Error types for disk operations
//!
//! ## Example
//!
//! ```rust
//! use diskpack::Disk;
//! use chrono::NaiveDate;
//!
//! let mut disk = Disk::new(50);
//! let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//!
//! disk.create_file("report.txt", date, 4).unwrap();
//! disk.create_file("notes.md", date, 6).unwrap();
//! disk.create_file("todo.txt", date, 2).unwrap();
//!
//! // Deleting the middle file leaves a hole...
//! disk.delete_file_by_name("notes.md").unwrap();
//!
//! // ...which defragmentation closes, preserving every chain.
//! disk.defragment_all();
//! assert_eq!(disk.stats().fragmentation, 0.0);
//! disk.check_consistency().unwrap();
//! ```
//!
//! The core performs no I/O and holds no global state: a [`Disk`] is a
//! plain value, so tests and demos can run as many side by side as they
//! want. Rendering and console interaction live in the `demo` binary.

pub mod arena;
pub mod catalog;
pub mod defrag;
pub mod disk;
pub mod error;

pub use arena::{Block, BlockArena, BlockIndex};
pub use catalog::{FileCatalog, FileRecord};
pub use defrag::{DefragEvent, Defragmenter};
pub use disk::{Disk, DiskStats, DEFAULT_CAPACITY};
pub use error::{DiskError, Result};
