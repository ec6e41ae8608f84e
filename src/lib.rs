//! Quarry - the storage-engine core of a disk-oriented database
//!
//! This crate implements a buffer-pool-backed B+ tree index: a balanced
//! on-disk index whose nodes live in the frames of a fixed-size buffer pool
//! governed by an LRU-K replacer, with RAII page guards enforcing the
//! pin/latch discipline.
//!
//! # Architecture
//!
//! The system is organized into layers, leaves first:
//!
//! - **Disk layer** (`storage::disk`): page-granular persistent storage
//!   - `DiskManager`: reads and writes fixed-size pages in a database file
//!   - `DiskScheduler`: background worker processing queued I/O requests
//!
//! - **Buffer pool** (`buffer`): a fixed set of in-memory frames over the disk
//!   - `BufferPoolManager`: page table, free list, pin counts, write-back
//!   - `LruKReplacer`: backward-k-distance victim selection
//!   - `FrameHeader`: per-frame metadata plus the latched 4 KiB buffer
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: scoped pins
//!
//! - **Index** (`index`): the B+ tree built entirely on page guards
//!   - `BPlusTree`: point lookup, insert with splits, delete with
//!     borrow/merge, root identity in a persistent header page
//!   - `IndexIterator`: forward iteration over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPoolManager;
//! use quarry::index::BPlusTree;
//! use quarry::storage::disk::DiskManager;
//! use quarry::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree = BPlusTree::new(Arc::clone(&bpm), 255, 255).unwrap();
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get(42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, QuarryError, RecordId, Result, SlotId};
