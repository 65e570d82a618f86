//! # Block Shape Helpers
//!
//! A block is `[tag][body][filler]`, with the last byte reserved for a
//! newline in the debug layout. These helpers are the only code that
//! writes filler or computes body capacity, so the two layouts cannot
//! drift apart.
//!
//! ```text
//! production:  [tag][body........][-----]
//! debug:       [tag][body........][----][\n]
//! chained:     [tag][body....][@<base36>]      (pointer fills to the edge)
//! ```

use crate::config::{DEBUG_TERMINATOR, FILLER, TAG_FREE};

/// Body capacity of a block that ends without a continuation pointer.
pub fn body_capacity(block_size: usize, debug_layout: bool) -> usize {
    block_size - 1 - usize::from(debug_layout)
}

/// Writes a complete block: tag, body, filler to the edge.
///
/// `body` must fit within [`body_capacity`].
pub fn fill_block(block: &mut [u8], tag: u8, body: &[u8], debug_layout: bool) {
    debug_assert!(body.len() <= body_capacity(block.len(), debug_layout));

    block[0] = tag;
    block[1..1 + body.len()].copy_from_slice(body);

    let pad_end = block.len() - usize::from(debug_layout);
    for b in &mut block[1 + body.len()..pad_end] {
        *b = FILLER;
    }
    if debug_layout {
        block[block.len() - 1] = DEBUG_TERMINATOR;
    }
}

/// Writes a block whose body ends in a continuation pointer. The body
/// slice must be sized so tag + body + pointer (+ newline) fill the block
/// exactly.
pub fn fill_block_chained(
    block: &mut [u8],
    tag: u8,
    body: &[u8],
    pointer: &[u8],
    debug_layout: bool,
) {
    debug_assert_eq!(
        1 + body.len() + pointer.len() + usize::from(debug_layout),
        block.len(),
        "chained block must be filled exactly"
    );

    block[0] = tag;
    block[1..1 + body.len()].copy_from_slice(body);
    block[1 + body.len()..1 + body.len() + pointer.len()].copy_from_slice(pointer);
    if debug_layout {
        block[block.len() - 1] = DEBUG_TERMINATOR;
    }
}

/// Reclaims a block: `!` tag, filler body.
pub fn free_block(block: &mut [u8], debug_layout: bool) {
    fill_block(block, TAG_FREE, &[], debug_layout);
}

/// Strips trailing filler and newline bytes from a block body.
pub fn trim_body(body: &[u8]) -> &[u8] {
    let mut end = body.len();
    while end > 0 && (body[end - 1] == FILLER || body[end - 1] == DEBUG_TERMINATOR) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_reserves_tag_and_terminator() {
        assert_eq!(body_capacity(16, false), 15);
        assert_eq!(body_capacity(16, true), 14);
        assert_eq!(body_capacity(128, false), 127);
    }

    #[test]
    fn fill_block_pads_with_filler() {
        let mut block = [0u8; 16];
        fill_block(&mut block, b'$', b"tbl%1%", false);

        assert_eq!(&block, b"$tbl%1%---------");
    }

    #[test]
    fn fill_block_debug_reserves_newline() {
        let mut block = [0u8; 16];
        fill_block(&mut block, b'$', b"tbl%1%", true);

        assert_eq!(&block, b"$tbl%1%--------\n");
    }

    #[test]
    fn fill_block_exact_fit_has_no_filler() {
        let mut block = [0u8; 16];
        fill_block(&mut block, b':', b"abcdefghijklmno", false);

        assert_eq!(&block, b":abcdefghijklmno");
    }

    #[test]
    fn fill_block_chained_fills_exactly() {
        let mut block = [0u8; 16];
        fill_block_chained(&mut block, b':', b"abcdefghijkl", b"@1a", false);

        assert_eq!(&block, b":abcdefghijkl@1a");
    }

    #[test]
    fn fill_block_chained_debug_layout() {
        let mut block = [0u8; 16];
        fill_block_chained(&mut block, b':', b"abcdefghijk", b"@1a", true);

        assert_eq!(&block, b":abcdefghijk@1a\n");
    }

    #[test]
    fn free_block_is_all_filler() {
        let mut block = *b":abcdefghijkl@1a";
        free_block(&mut block, false);

        assert_eq!(&block, b"!---------------");
    }

    #[test]
    fn trim_body_strips_filler_and_newline() {
        assert_eq!(trim_body(b"abc----\n"), b"abc");
        assert_eq!(trim_body(b"abc"), b"abc");
        assert_eq!(trim_body(b"----"), b"");
        assert_eq!(trim_body(b""), b"");
    }

    #[test]
    fn trim_body_keeps_interior_filler() {
        assert_eq!(trim_body(b"a-b--"), b"a-b");
    }
}
