//! # Engine Configuration Constants
//!
//! This module centralizes the constants that define the on-disk format.
//! Most of them are load-bearing: changing any value in the BLOCK LAYOUT or
//! STRUCTURAL BYTES sections changes the file format and breaks databases
//! written by earlier builds.
//!
//! ## Dependency Graph
//!
//! ```text
//! block size B (per database, from the header record)
//!       │
//!       ├─> body capacity        = B - 1 (tag byte)
//!       │                          - 1 more in debug layout (newline)
//!       │
//!       └─> continuation capacity = body capacity - len("@<base36 index>")
//!
//! CORE_CHARS ++ registered tags
//!       │
//!       └─> escape alphabet of the payload codec; the index of a byte in
//!           this sequence is what `%<decimal>%` escapes encode, so the
//!           ORDER is part of the file format
//! ```
//!
//! ## Critical Invariants
//!
//! 1. Every tag byte appears in the escape alphabet, so an encoded payload
//!    can never be mistaken for a block tag or a `@` pointer.
//! 2. `MIN_BLOCK_SIZE` leaves room for the raw `#bit=` header plus at least
//!    one filler byte at every legal width.

// ============================================================================
// BLOCK LAYOUT
// ============================================================================

/// Default block width for new databases.
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// Smallest block width accepted in the production layout.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Smallest block width accepted in the debug layout. Small blocks keep
/// chained records easy to eyeball in a hex dump.
pub const MIN_DEBUG_BLOCK_SIZE: usize = 16;

/// Largest block width. The base-36 rendering of this still fits the
/// fixed `#bit=` header field.
pub const MAX_BLOCK_SIZE: usize = 64000;

/// Ceiling on the total file size in bytes. Caps the block-index range so
/// continuation pointers stay within a bounded base-36 width (about one
/// billion blocks at the maximum block size).
pub const MAX_FILE_SIZE: u64 = 99_999_999_999_999;

/// Widest base-36 rendering of a block width in the `#bit=` header.
pub const BIT_HEADER_DIGITS: usize = 5;

const _: () = assert!(MIN_DEBUG_BLOCK_SIZE >= 16, "debug blocks must fit the raw bit header");
const _: () = assert!(MIN_BLOCK_SIZE >= MIN_DEBUG_BLOCK_SIZE);
const _: () = assert!(DEFAULT_BLOCK_SIZE >= MIN_BLOCK_SIZE && DEFAULT_BLOCK_SIZE <= MAX_BLOCK_SIZE);

// ============================================================================
// TAG ALPHABET
// Byte 0 of every block. New tags must be added to the escape alphabet.
// ============================================================================

/// Engine header / metadata record.
pub const TAG_HEADER: u8 = b'#';

/// Global data record, not owned by any table.
pub const TAG_DATA: u8 = b'~';

/// Table record; its value is the comma-separated base-36 list of row blocks.
pub const TAG_TABLE: u8 = b'$';

/// Row record, owned by exactly one table.
pub const TAG_ROW: u8 = b':';

/// Continuation block holding the tail of an oversized record. Never a scan
/// origin; reachable only through a `@` pointer.
pub const TAG_CHAIN: u8 = b'&';

/// Free block. The tag itself is the free-list marker; there is no in-memory
/// free list to rebuild on open.
pub const TAG_FREE: u8 = b'!';

/// Alignment filler outside any record, and the trailing pad byte inside
/// partially filled blocks.
pub const FILLER: u8 = b'-';

/// Last byte of every block in the debug layout, for human inspection.
pub const DEBUG_TERMINATOR: u8 = b'\n';

/// Marks the start of a continuation pointer at the end of a record body.
pub const POINTER_MARK: u8 = b'@';

/// Separates key from value inside a decoded payload.
pub const PAYLOAD_SEPARATOR: u8 = b'=';

// ============================================================================
// STRUCTURAL BYTES
// ============================================================================

/// Bytes with syntactic meaning inside a block body. Their position in this
/// sequence is the index written by a `%<decimal>%` escape, so the order is
/// part of the file format.
pub const CORE_CHARS: &[u8] = b"%=,@#!-\n";

/// Record tags registered by default, appended to [`CORE_CHARS`] to form the
/// escape alphabet. Extra tags registered at open extend this list.
pub const DEFAULT_TAGS: &[u8] = b"$:~";

// ============================================================================
// HEADER RECORDS
// ============================================================================

/// Raw prefix of block 0: `#bit=<base36 width>` padded with filler.
pub const BIT_HEADER_PREFIX: &[u8] = b"#bit=";

/// Key and value of the handshake record at block 1. The record is written
/// through the codec, so decoding it back to `enc=enc` proves the cipher
/// configuration matches the file.
pub const ENC_HANDSHAKE: &[u8] = b"enc";

/// Trailer appended to every plaintext payload before encryption and
/// verified after decryption. Its absence signals a wrong key.
pub const ENC_TRAILER: &[u8] = b"#enc";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_is_escapable() {
        for tag in [TAG_HEADER, TAG_DATA, TAG_TABLE, TAG_ROW, TAG_FREE, FILLER] {
            assert!(
                CORE_CHARS.contains(&tag) || DEFAULT_TAGS.contains(&tag),
                "tag {:?} missing from escape alphabet",
                tag as char
            );
        }
    }

    #[test]
    fn escape_alphabet_order_is_stable() {
        // Index positions are written into files as %<n>% escapes.
        assert_eq!(CORE_CHARS.iter().position(|&b| b == b'%'), Some(0));
        assert_eq!(CORE_CHARS.iter().position(|&b| b == b'='), Some(1));
        assert_eq!(CORE_CHARS.iter().position(|&b| b == b'\n'), Some(7));
        assert_eq!(DEFAULT_TAGS, b"$:~");
    }

    #[test]
    fn bit_header_fits_smallest_debug_block() {
        // "#bit=" + widest base36 width + newline must fit in 16 bytes.
        assert!(BIT_HEADER_PREFIX.len() + BIT_HEADER_DIGITS + 1 <= MIN_DEBUG_BLOCK_SIZE);
    }
}
