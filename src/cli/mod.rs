//! # Command-Line Interface
//!
//! Interactive REPL for poking at a database: listing tables, reading and
//! writing rows and global entries, and triggering compaction. All
//! commands are dot commands; there is no query language.

mod commands;
mod history;
mod repl;

pub use repl::Repl;
