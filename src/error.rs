//! Error types for slotdb.
//!
//! Provides a unified error type for all operations. The `*Exists` variants
//! carry a handle to the record that was found, so callers can recover from
//! a duplicate insert without a second lookup.

use thiserror::Error;

use crate::database::{Data, Row, Table};

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for slotdb operations.
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block {block} out of bounds (block_count={count})")]
    OutOfBounds { block: u64, count: u64 },

    // -------------------------------------------------------------------------
    // Structural (fatal at open)
    // -------------------------------------------------------------------------
    #[error("bit size {0} too large for the header block")]
    BitSizeTooLarge(usize),

    #[error("invalid database header: {0}")]
    InvalidHeader(String),

    #[error("reserved prefix byte {0:#04x} cannot be registered as a tag")]
    ReservedPrefix(u8),

    #[error("tag byte {0:#04x} is not registered with this database")]
    UnregisteredTag(u8),

    // -------------------------------------------------------------------------
    // Cryptographic
    // -------------------------------------------------------------------------
    #[error("failed to decrypt database")]
    DecryptFailed,

    #[error("failed to decode record")]
    DecodeFailed,

    // -------------------------------------------------------------------------
    // Lookup / capacity
    // -------------------------------------------------------------------------
    #[error("record not found")]
    NotFound,

    #[error("payload exceeds the database size ceiling")]
    PayloadTooLarge,

    #[error("invalid search pattern: {0}")]
    Regex(#[from] regex::Error),

    // -------------------------------------------------------------------------
    // Uniqueness (non-fatal, carries the existing handle)
    // -------------------------------------------------------------------------
    #[error("table already exists")]
    TableExists(Table),

    #[error("row already exists")]
    RowExists(Row),

    #[error("data entry already exists")]
    DataExists(Data),

    // -------------------------------------------------------------------------
    // Handle lifecycle
    // -------------------------------------------------------------------------
    #[error("handle refers to a deleted record")]
    StaleHandle,
}

impl Error {
    /// True for the per-record decode failures that linear scans swallow.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Error::DecodeFailed | Error::DecryptFailed)
    }
}
