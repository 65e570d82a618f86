//! # Chain Manager
//!
//! Records larger than one block spill into continuation blocks. The
//! writer carves the encoded payload into slices, ends each full block
//! with a `@<base36 index>` pointer naming the next block, and tags every
//! continuation `&`. The reader splices the chain back together by
//! following trailing pointers; the deleter follows them flipping each
//! block to `!`.
//!
//! Because the codec strips every structural byte from the payload, a
//! trailing `@` followed by base-36 digits can only be a pointer. There
//! is no length field and none is needed.
//!
//! A pointer whose target is missing or not tagged `&` ends the record at
//! the pointer ("end of record" rather than a hard error); a cycle guard
//! bounds every walk by the block count so corrupt files cannot hang a
//! scan.

use smallvec::SmallVec;

use crate::config::{POINTER_MARK, TAG_CHAIN};
use crate::encoding::base36::{decode_base36, encode_base36, is_base36_digit, MAX_DIGITS};
use crate::error::{Error, Result};
use crate::storage::{fill_block, fill_block_chained, trim_body};

use super::Core;

impl Core {
    /// Writes `payload` into `start` and as many continuations as it
    /// needs. New continuation slots are found scanning forward from the
    /// block after the current one, except that `first_alloc_from`
    /// overrides the starting point of the first search (the rewrite path
    /// extends from the top of the file).
    pub(crate) fn write_tail(
        &mut self,
        start: u64,
        start_tag: u8,
        payload: &[u8],
        first_alloc_from: Option<u64>,
    ) -> Result<()> {
        let debug_layout = self.codec().debug_layout();
        let block_size = self.storage().block_size();
        let cap = crate::storage::body_capacity(block_size, debug_layout);

        let mut line = start;
        let mut tag = start_tag;
        let mut rest = payload;
        let mut alloc_from = first_alloc_from;

        loop {
            if rest.len() <= cap {
                fill_block(self.storage_mut().block_mut(line)?, tag, rest, debug_layout);
                return Ok(());
            }

            let from = alloc_from.take().unwrap_or(line + 1);
            let next = self.alloc_block(from)?;
            // Reserve the slot so the next search cannot hand it out again.
            self.storage_mut().block_mut(next)?[0] = TAG_CHAIN;

            let token = pointer_token(next);
            let body_len = cap
                .checked_sub(token.len())
                .filter(|&n| n > 0)
                .ok_or(Error::PayloadTooLarge)?;

            fill_block_chained(
                self.storage_mut().block_mut(line)?,
                tag,
                &rest[..body_len],
                &token,
                debug_layout,
            );

            rest = &rest[body_len..];
            line = next;
            tag = TAG_CHAIN;
        }
    }

    /// Reads the full raw body of the record at `line`, splicing every
    /// continuation in place of its pointer and trimming filler.
    pub(crate) fn collect_chain(&self, line: u64) -> Result<Vec<u8>> {
        let mut body = trim_body(&self.storage().block(line)?[1..]).to_vec();

        let mut hops = 0;
        let max_hops = self.storage().block_count();
        while let Some((cut, next)) = split_pointer(&body) {
            hops += 1;
            if hops > max_hops {
                body.truncate(cut);
                break;
            }

            match self.storage().block(next) {
                Ok(block) if block[0] == TAG_CHAIN => {
                    let tail = trim_body(&block[1..]).to_vec();
                    body.truncate(cut);
                    body.extend_from_slice(&tail);
                }
                _ => {
                    body.truncate(cut);
                    break;
                }
            }
        }
        Ok(body)
    }

    /// Flips the record at `line` and every reachable continuation to
    /// free, returning the raw body that was stored.
    pub(crate) fn free_chain(&mut self, line: u64) -> Result<Vec<u8>> {
        let mut body = trim_body(&self.storage().block(line)?[1..]).to_vec();
        self.reclaim_block(line)?;

        let mut hops = 0;
        let max_hops = self.storage().block_count();
        while let Some((cut, next)) = split_pointer(&body) {
            hops += 1;
            if hops > max_hops {
                body.truncate(cut);
                break;
            }

            let tail = match self.storage().block(next) {
                Ok(block) if block[0] == TAG_CHAIN => trim_body(&block[1..]).to_vec(),
                _ => {
                    body.truncate(cut);
                    break;
                }
            };

            self.reclaim_block(next)?;
            body.truncate(cut);
            body.extend_from_slice(&tail);
        }
        Ok(body)
    }

    /// The compound walk behind [`Core::set`]: rewrites the record at
    /// `line` reusing its existing chain block by block, freeing the old
    /// tail once the new payload runs out, or extending through the
    /// allocator when the new payload outlasts the chain. Returns the raw
    /// body that was stored before the rewrite.
    pub(crate) fn rewrite_chain(
        &mut self,
        line: u64,
        tag: u8,
        encoded: &[u8],
    ) -> Result<Vec<u8>> {
        let debug_layout = self.codec().debug_layout();
        let block_size = self.storage().block_size();
        let cap = crate::storage::body_capacity(block_size, debug_layout);

        let mut old_raw = Vec::new();
        let mut current = line;
        let mut current_tag = tag;
        let mut rest = encoded;

        let mut hops = 0;
        let max_hops = self.storage().block_count();

        loop {
            let raw = trim_body(&self.storage().block(current)?[1..]).to_vec();

            // Resolve this block's pointer before overwriting it.
            let (data_end, next) = match split_pointer(&raw) {
                Some((cut, n)) => match self.storage().block(n) {
                    Ok(block) if block[0] == TAG_CHAIN => (cut, Some(n)),
                    _ => (cut, None),
                },
                None => (raw.len(), None),
            };
            old_raw.extend_from_slice(&raw[..data_end]);

            let Some(next) = next else {
                if rest.is_empty() {
                    self.reclaim_block(current)?;
                } else {
                    self.write_tail(current, current_tag, rest, Some(0))?;
                }
                break;
            };

            if rest.is_empty() {
                // New payload already fully written; the rest of the old
                // chain is reclaimed as the walk collects it.
                self.reclaim_block(current)?;
            } else if rest.len() > cap {
                let token = pointer_token(next);
                let body_len = cap
                    .checked_sub(token.len())
                    .filter(|&n| n > 0)
                    .ok_or(Error::PayloadTooLarge)?;
                fill_block_chained(
                    self.storage_mut().block_mut(current)?,
                    current_tag,
                    &rest[..body_len],
                    &token,
                    debug_layout,
                );
                rest = &rest[body_len..];
            } else {
                fill_block(
                    self.storage_mut().block_mut(current)?,
                    current_tag,
                    rest,
                    debug_layout,
                );
                rest = &[];
            }

            current = next;
            current_tag = TAG_CHAIN;

            hops += 1;
            if hops > max_hops {
                break;
            }
        }

        Ok(old_raw)
    }
}

/// Builds the `@<base36>` pointer token for a block index.
fn pointer_token(line: u64) -> SmallVec<[u8; MAX_DIGITS + 1]> {
    let mut token = SmallVec::new();
    token.push(POINTER_MARK);
    token.extend_from_slice(&encode_base36(line));
    token
}

/// Recognizes a trailing continuation pointer: a `@` whose suffix is one
/// or more base-36 digits running to the end of the body. Returns the
/// pointer's byte offset and the decoded target index.
fn split_pointer(body: &[u8]) -> Option<(usize, u64)> {
    let at = body.iter().rposition(|&b| b == POINTER_MARK)?;
    let digits = &body[at + 1..];
    if digits.is_empty() || !digits.iter().all(|&b| is_base36_digit(b)) {
        return None;
    }
    decode_base36(digits).map(|line| (at, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::config::{DEFAULT_TAGS, TAG_DATA, TAG_FREE, TAG_HEADER, TAG_ROW};
    use crate::engine::Pattern;
    use crate::storage::MmapBlockFile;
    use tempfile::tempdir;

    fn test_core() -> (Core, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = MmapBlockFile::create(dir.path().join("chain.db"), 16, 1).unwrap();
        let mut core = Core::new(storage, Codec::new(None, None, DEFAULT_TAGS, true));
        fill_block(core.storage_mut().block_mut(0).unwrap(), TAG_HEADER, b"", true);
        (core, dir)
    }

    fn chain_of(core: &Core, line: u64) -> Vec<u64> {
        let mut blocks = vec![line];
        let mut body = trim_body(&core.storage().block(line).unwrap()[1..]).to_vec();
        while let Some((cut, next)) = split_pointer(&body) {
            blocks.push(next);
            let _ = cut;
            body = trim_body(&core.storage().block(next).unwrap()[1..]).to_vec();
        }
        blocks
    }

    #[test]
    fn split_pointer_recognizes_trailing_token() {
        assert_eq!(split_pointer(b"abc@1a"), Some((3, 46)));
        assert_eq!(split_pointer(b"abc"), None);
        assert_eq!(split_pointer(b"abc@"), None);
        assert_eq!(split_pointer(b"@7"), Some((0, 7)));
    }

    #[test]
    fn oversized_record_spills_into_a_tagged_continuation() {
        let (mut core, _dir) = test_core();

        let value = vec![b'v'; 40];
        let rec = core.add(TAG_ROW, b"k", &value).unwrap();

        let chain = chain_of(&core, rec.line);
        assert!(chain.len() > 1, "expected a spill");
        for &c in &chain[1..] {
            assert_eq!(core.storage().block(c).unwrap()[0], TAG_CHAIN);
        }

        let mut cursor = rec.line;
        let got = core
            .get(TAG_ROW, &Pattern::any(), &Pattern::any(), &mut cursor, true)
            .unwrap();
        assert_eq!(got.value, value);
    }

    #[test]
    fn chain_blocks_are_strictly_increasing_on_append() {
        let (mut core, _dir) = test_core();

        let rec = core.add(TAG_ROW, b"k", &vec![b'x'; 200]).unwrap();

        let chain = chain_of(&core, rec.line);
        assert!(chain.len() >= 3);
        for pair in chain.windows(2) {
            assert!(pair[0] < pair[1], "chain must not revisit blocks");
        }
    }

    #[test]
    fn delete_frees_exactly_the_chain() {
        let (mut core, _dir) = test_core();

        let keep = core.add(TAG_DATA, b"keep", b"1").unwrap();
        let rec = core.add(TAG_ROW, b"k", &vec![b'y'; 64]).unwrap();
        let chain = chain_of(&core, rec.line);

        let mut cursor = rec.line;
        core.delete(TAG_ROW, &mut cursor, true).unwrap().unwrap();

        for &c in &chain {
            assert_eq!(core.storage().block(c).unwrap()[0], TAG_FREE);
        }
        assert_eq!(core.storage().block(keep.line).unwrap()[0], TAG_DATA);
    }

    #[test]
    fn shrinking_set_frees_the_old_tail() {
        let (mut core, _dir) = test_core();

        let rec = core.add(TAG_ROW, b"k", &vec![b'z'; 64]).unwrap();
        let chain = chain_of(&core, rec.line);
        assert!(chain.len() >= 4);

        core.set(TAG_ROW, b"k", b"s", rec.line).unwrap();

        assert_eq!(core.storage().block(rec.line).unwrap()[0], TAG_ROW);
        for &c in &chain[1..] {
            assert_eq!(core.storage().block(c).unwrap()[0], TAG_FREE);
        }
    }

    #[test]
    fn growing_set_reuses_then_extends_the_chain() {
        let (mut core, _dir) = test_core();

        let rec = core.add(TAG_ROW, b"k", &vec![b'a'; 30]).unwrap();
        let before = chain_of(&core, rec.line);

        let long = vec![b'b'; 90];
        core.set(TAG_ROW, b"k", &long, rec.line).unwrap();
        let after = chain_of(&core, rec.line);

        assert!(after.len() > before.len());
        assert_eq!(&after[..before.len()], &before[..]);

        let mut cursor = rec.line;
        let got = core
            .get(TAG_ROW, &Pattern::any(), &Pattern::any(), &mut cursor, true)
            .unwrap();
        assert_eq!(got.value, long);
    }

    #[test]
    fn set_reports_the_old_value_across_a_chain() {
        let (mut core, _dir) = test_core();

        let old_value = vec![b'q'; 50];
        let rec = core.add(TAG_ROW, b"k", &old_value).unwrap();

        let replaced = core.set(TAG_ROW, b"k2", b"new", rec.line).unwrap();

        assert_eq!(replaced.old_key, b"k");
        assert_eq!(replaced.old_value, old_value);
    }

    #[test]
    fn pointer_width_transitions_round_trip() {
        // Chains whose continuation indices straddle a base-36 width
        // boundary get shorter bodies mid-chain; the payload must still
        // come back intact.
        for boundary in [36u64, 1296, 46656] {
            let (mut core, _dir) = test_core();
            core.storage_mut().grow(boundary).unwrap();

            let value = vec![b'v'; 64];
            let rec = core.add(TAG_ROW, b"k", &value).unwrap();
            assert_eq!(rec.line, boundary, "append lands on the boundary");

            let mut cursor = rec.line;
            let got = core
                .get(TAG_ROW, &Pattern::any(), &Pattern::any(), &mut cursor, true)
                .unwrap();
            assert_eq!(got.value, value);
        }
    }

    #[test]
    fn corrupt_pointer_ends_the_record_quietly() {
        let (mut core, _dir) = test_core();

        let rec = core.add(TAG_ROW, b"k", &vec![b'w'; 40]).unwrap();
        let chain = chain_of(&core, rec.line);

        // Wreck the first continuation's tag.
        core.storage_mut().block_mut(chain[1]).unwrap()[0] = b'?';

        let body = core.collect_chain(rec.line).unwrap();
        assert!(!body.is_empty());
        assert!(split_pointer(&body).is_none(), "pointer must be dropped");
    }
}
