//! # slotdb - Block-Addressed Tagged-Record Store
//!
//! slotdb is an embedded, single-file key-value store organized into named
//! tables of rows plus a flat global namespace. Records are stored in
//! fixed-size blocks so that an entity's on-disk address is a stable integer
//! block index, reusable as a cross-reference between records.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotdb::Db;
//!
//! let db = Db::open("./my.db")?;
//!
//! let mut users = db.add_table("users")?;
//! users.add_row("alice", "admin")?;
//!
//! let row = users.get_row("alice")?;
//! assert_eq!(row.value(), "admin");
//!
//! db.close()?;
//! ```
//!
//! ## Architecture
//!
//! Everything above the block layer is a convention over four primitives:
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │  Public API (Db / Table / Row / Data) │
//! ├───────────────────────────────────────┤
//! │  Namespace conventions (tag + lists)  │
//! ├───────────────────────────────────────┤
//! │  Record primitives (add/get/del/set)  │
//! ├───────────────┬───────────────────────┤
//! │ Chain manager │ Allocator / Scanner   │
//! ├───────────────┴───────────────────────┤
//! │  Payload codec (escape/cipher/pack)   │
//! ├───────────────────────────────────────┤
//! │  Block I/O (memory-mapped file)       │
//! └───────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! The database is a single file of fixed-width blocks. The first byte of
//! every block is a tag discriminating its role:
//!
//! ```text
//! #   engine header / metadata record
//! ~   global data record
//! $   table record
//! :   row record
//! &   continuation block of an oversized record
//! !   free block, reusable by the allocator
//! -   alignment filler outside any record
//! ```
//!
//! Block 0 holds `#bit=<base36 width>`; block 1 holds the encoded record
//! `enc=enc`, whose readability after decoding doubles as the encryption
//! handshake. Oversized records spill into `&` blocks linked by trailing
//! `@<base36 index>` pointers.
//!
//! ## Module Overview
//!
//! - [`storage`]: memory-mapped block file, tail alignment, block helpers
//! - [`encoding`]: base-36 indices and the structural-byte escape
//! - [`codec`]: payload pipeline with pluggable cipher and compressor seams
//! - [`engine`]: the four record primitives over an explicit cursor
//! - [`database`]: handles, the open/close lifecycle, compaction
//! - `cli`: interactive REPL for inspection

pub mod cli;
pub mod codec;
pub mod config;
pub mod database;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod storage;

pub use codec::{Cipher, Compressor};
pub use database::{Data, Db, OpenOptions, Row, Table};
pub use engine::{Pattern, Record, Replaced};
pub use error::{Error, Result};
