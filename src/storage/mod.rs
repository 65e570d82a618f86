//! # Storage Module
//!
//! The foundational block layer: a memory-mapped file addressed purely by
//! block index, plus the fill/trim helpers that give blocks their shape.
//!
//! ## Block Addressing
//!
//! The file is a concatenation of fixed-width blocks; a block's index is
//! its byte offset divided by the block width. Nothing above this module
//! ever deals in raw offsets, and the engine never relocates a block, so
//! indices are stable addresses for the lifetime of a record.
//!
//! ## Safety Model
//!
//! Memory-mapped regions become invalid when the file is grown and
//! remapped. Rather than runtime guards, the borrow checker enforces
//! safety at compile time:
//!
//! ```text
//! block(&self, i) -> &[u8]          // immutable borrow of self
//! block_mut(&mut self, i) -> &mut [u8]
//! grow(&mut self, n)                // exclusive borrow, no live slices
//! ```
//!
//! ## Growth
//!
//! The allocator appends exactly one block at a time, so the file length
//! is always the smallest multiple of the block width that holds every
//! record. Files whose length is not block-aligned (a torn append from a
//! foreign writer) are aligned forward with `-` filler at open.

mod block;
mod mmap;

pub use block::{body_capacity, fill_block, fill_block_chained, free_block, trim_body};
pub use mmap::MmapBlockFile;
