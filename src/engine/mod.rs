//! # Record Engine
//!
//! The four primitives (add, get, delete, set) over tagged records. The
//! engine is oblivious to what a tag means; tables, rows and the global
//! namespace are conventions applied by the database layer.
//!
//! ## Explicit Cursor
//!
//! Scans take the starting block index as an explicit `cursor` parameter
//! and leave it one past the last block examined, so a caller can continue
//! a scan across calls. Threading this state through the OS file offset
//! would make every primitive a reentrancy hazard; here the cursor is
//! plain data.
//!
//! ## Block State Machine
//!
//! ```text
//!              add / set
//!     FREE (!) ─────────────► IN_USE (#,~,$,:)
//!     ▲                            │
//!     │         delete             │ chain spill
//!     └────────────────────────────┘
//!     CONTINUATION (&) ── chain freed ──► FREE (!)
//! ```
//!
//! A `&` block is invisible to every scan; it is reachable only through
//! the `@` pointer at the end of its predecessor's body.

mod chain;
mod pattern;
mod scanner;

pub use pattern::Pattern;

use tracing::debug;

use crate::codec::{split_payload, Codec};
use crate::error::{Error, Result};
use crate::storage::{free_block, MmapBlockFile};

/// A decoded record and the block index it lives at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub line: u64,
}

/// Result of [`Core::set`]: the rewritten record plus the decoded prior
/// key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    pub record: Record,
    pub old_key: Vec<u8>,
    pub old_value: Vec<u8>,
}

/// The record engine over one block file. Not internally synchronized;
/// the database layer holds a mutex around every public call.
#[derive(Debug)]
pub struct Core {
    storage: MmapBlockFile,
    codec: Codec,
}

impl Core {
    pub fn new(storage: MmapBlockFile, codec: Codec) -> Self {
        Self { storage, codec }
    }

    /// Writes a new record under `tag` into the lowest free slot (or at
    /// end of file) and returns it. Uniqueness is the caller's business.
    pub fn add(&mut self, tag: u8, key: &[u8], value: &[u8]) -> Result<Record> {
        let encoded = self.codec.encode(key, value)?;
        let origin = self.alloc_block(0)?;
        self.write_tail(origin, tag, &encoded, None)?;

        debug!(tag = %(tag as char), line = origin, "record added");

        Ok(Record {
            key: key.to_vec(),
            value: value.to_vec(),
            line: origin,
        })
    }

    /// Scans for the first record under `tag` matching both patterns,
    /// starting at `*cursor`. On return the cursor sits one past the last
    /// block examined.
    ///
    /// With `probe` set, only the block at the cursor is tested: a tag
    /// mismatch or pattern miss is `NotFound`, and a decode failure is
    /// surfaced instead of skipped. This is the mode used by table-scoped
    /// lookups, which jump straight to a row's block index and want a
    /// single confirmation.
    pub fn get(
        &self,
        tag: u8,
        key_pattern: &Pattern,
        value_pattern: &Pattern,
        cursor: &mut u64,
        probe: bool,
    ) -> Result<Record> {
        let count = self.storage.block_count();
        let mut line = *cursor;

        if !probe {
            self.storage.prefetch(line, count.saturating_sub(line));
        }

        while line < count {
            if self.storage.block(line)?[0] != tag {
                if probe {
                    *cursor = line + 1;
                    return Err(Error::NotFound);
                }
                line += 1;
                continue;
            }

            let body = self.collect_chain(line)?;
            let payload = match self.codec.decode(&body) {
                Ok(p) => p,
                Err(e) => {
                    *cursor = line + 1;
                    if probe {
                        return Err(e);
                    }
                    line += 1;
                    continue;
                }
            };

            if !payload.is_empty() {
                let (key, value) = split_payload(&payload);
                if key_pattern.matches(key) && value_pattern.matches(value) {
                    *cursor = line + 1;
                    return Ok(Record {
                        key: key.to_vec(),
                        value: value.to_vec(),
                        line,
                    });
                }
            }

            *cursor = line + 1;
            if probe {
                return Err(Error::NotFound);
            }
            line += 1;
        }

        *cursor = count;
        Err(Error::NotFound)
    }

    /// Frees the next record under `tag` (or, with `probe`, the record at
    /// the cursor if and only if its tag matches) together with its whole
    /// chain, and returns what was there. Nothing to free is `Ok(None)`,
    /// which makes deletion idempotent.
    pub fn delete(&mut self, tag: u8, cursor: &mut u64, probe: bool) -> Result<Option<Record>> {
        let count = self.storage.block_count();
        let mut line = *cursor;

        loop {
            if line >= count {
                *cursor = count;
                return Ok(None);
            }
            if self.storage.block(line)?[0] == tag {
                break;
            }
            if probe {
                return Ok(None);
            }
            line += 1;
        }

        let raw = self.free_chain(line)?;
        *cursor = line + 1;

        debug!(tag = %(tag as char), line, "record deleted");

        let payload = self.codec.decode(&raw).unwrap_or_default();
        let (key, value) = split_payload(&payload);
        Ok(Some(Record {
            key: key.to_vec(),
            value: value.to_vec(),
            line,
        }))
    }

    /// Rewrites the record whose primary block is `line` in place, reusing
    /// its chain block by block: continuations still needed are refilled,
    /// the rest are freed, and if the new payload outlasts the old chain
    /// it is extended through the allocator. A wrong tag at `line` is
    /// `NotFound`.
    pub fn set(&mut self, tag: u8, key: &[u8], value: &[u8], line: u64) -> Result<Replaced> {
        if self.storage.block(line)?[0] != tag {
            return Err(Error::NotFound);
        }

        let encoded = self.codec.encode(key, value)?;
        let old_raw = self.rewrite_chain(line, tag, &encoded)?;

        debug!(tag = %(tag as char), line, "record rewritten");

        let old_payload = self.codec.decode(&old_raw).unwrap_or_default();
        let (old_key, old_value) = split_payload(&old_payload);
        Ok(Replaced {
            record: Record {
                key: key.to_vec(),
                value: value.to_vec(),
                line,
            },
            old_key: old_key.to_vec(),
            old_value: old_value.to_vec(),
        })
    }

    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    pub fn block_count(&self) -> u64 {
        self.storage.block_count()
    }

    pub fn block_size(&self) -> usize {
        self.storage.block_size()
    }

    pub fn debug_layout(&self) -> bool {
        self.codec.debug_layout()
    }

    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Swaps in a freshly opened block file (compaction rename).
    pub(crate) fn replace_storage(&mut self, storage: MmapBlockFile) {
        self.storage = storage;
    }

    pub(crate) fn storage(&self) -> &MmapBlockFile {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut MmapBlockFile {
        &mut self.storage
    }

    /// Flips a single block to free without touching any chain. Used by
    /// the rewrite walk, which has already collected the chain itself.
    fn reclaim_block(&mut self, line: u64) -> Result<()> {
        let debug_layout = self.codec.debug_layout();
        free_block(self.storage.block_mut(line)?, debug_layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_TAGS, TAG_DATA, TAG_ROW, TAG_TABLE};
    use tempfile::tempdir;

    fn test_core(block_size: usize) -> (Core, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage =
            MmapBlockFile::create(dir.path().join("core.db"), block_size, 1).unwrap();
        let mut core = Core::new(storage, Codec::new(None, None, DEFAULT_TAGS, true));
        // Block 0 stands in for the header so records start at 1.
        crate::storage::fill_block(
            core.storage_mut().block_mut(0).unwrap(),
            crate::config::TAG_HEADER,
            b"",
            true,
        );
        (core, dir)
    }

    #[test]
    fn add_then_get_roundtrip() {
        let (mut core, _dir) = test_core(16);

        let added = core.add(TAG_DATA, b"k", b"v").unwrap();
        assert_eq!(added.line, 1);

        let mut cursor = 0;
        let got = core
            .get(TAG_DATA, &Pattern::literal(b"k".as_slice()), &Pattern::any(), &mut cursor, false)
            .unwrap();
        assert_eq!(got.key, b"k");
        assert_eq!(got.value, b"v");
        assert_eq!(got.line, 1);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn add_reuses_the_lowest_free_slot() {
        let (mut core, _dir) = test_core(16);

        core.add(TAG_DATA, b"a", b"1").unwrap();
        let b = core.add(TAG_DATA, b"b", b"2").unwrap();
        core.add(TAG_DATA, b"c", b"3").unwrap();

        let mut cursor = b.line;
        core.delete(TAG_DATA, &mut cursor, true).unwrap().unwrap();

        let d = core.add(TAG_DATA, b"d", b"4").unwrap();
        assert_eq!(d.line, b.line);
    }

    #[test]
    fn get_scans_past_other_tags() {
        let (mut core, _dir) = test_core(16);

        core.add(TAG_TABLE, b"t", b"").unwrap();
        core.add(TAG_ROW, b"r", b"1").unwrap();
        core.add(TAG_DATA, b"g", b"2").unwrap();

        let mut cursor = 0;
        let got = core
            .get(TAG_DATA, &Pattern::any(), &Pattern::any(), &mut cursor, false)
            .unwrap();
        assert_eq!(got.key, b"g");
    }

    #[test]
    fn probe_mode_tests_only_the_cursor_block() {
        let (mut core, _dir) = test_core(16);

        core.add(TAG_ROW, b"r1", b"x").unwrap();
        let r2 = core.add(TAG_ROW, b"r2", b"y").unwrap();

        let mut cursor = r2.line;
        let got = core
            .get(TAG_ROW, &Pattern::literal(b"r2".as_slice()), &Pattern::any(), &mut cursor, true)
            .unwrap();
        assert_eq!(got.key, b"r2");

        // Probing r2's block for r1 must not walk on to other blocks.
        let mut cursor = r2.line;
        let miss = core.get(
            TAG_ROW,
            &Pattern::literal(b"r1".as_slice()),
            &Pattern::any(),
            &mut cursor,
            true,
        );
        assert!(matches!(miss, Err(Error::NotFound)));
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut core, _dir) = test_core(16);

        let rec = core.add(TAG_DATA, b"k", b"v").unwrap();

        let mut cursor = rec.line;
        assert!(core.delete(TAG_DATA, &mut cursor, true).unwrap().is_some());

        let mut cursor = rec.line;
        assert!(core.delete(TAG_DATA, &mut cursor, true).unwrap().is_none());
    }

    #[test]
    fn delete_returns_the_old_record() {
        let (mut core, _dir) = test_core(16);

        let rec = core.add(TAG_DATA, b"k", b"v").unwrap();

        let mut cursor = rec.line;
        let old = core.delete(TAG_DATA, &mut cursor, true).unwrap().unwrap();
        assert_eq!(old.key, b"k");
        assert_eq!(old.value, b"v");
        assert_eq!(old.line, rec.line);
    }

    #[test]
    fn set_rewrites_in_place_and_reports_the_old_pair() {
        let (mut core, _dir) = test_core(16);

        let rec = core.add(TAG_DATA, b"k", b"old").unwrap();
        let replaced = core.set(TAG_DATA, b"k", b"new", rec.line).unwrap();

        assert_eq!(replaced.record.line, rec.line);
        assert_eq!(replaced.old_key, b"k");
        assert_eq!(replaced.old_value, b"old");

        let mut cursor = rec.line;
        let got = core
            .get(TAG_DATA, &Pattern::any(), &Pattern::any(), &mut cursor, true)
            .unwrap();
        assert_eq!(got.value, b"new");
    }

    #[test]
    fn set_with_wrong_tag_is_not_found() {
        let (mut core, _dir) = test_core(16);

        let rec = core.add(TAG_DATA, b"k", b"v").unwrap();
        assert!(matches!(
            core.set(TAG_ROW, b"k", b"v", rec.line),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn every_block_has_a_valid_tag_and_exact_width() {
        for block_size in [16usize, 64, 128, 1024] {
            let dir = tempdir().unwrap();
            let storage =
                MmapBlockFile::create(dir.path().join("w.db"), block_size, 1).unwrap();
            let mut core = Core::new(storage, Codec::new(None, None, DEFAULT_TAGS, false));
            crate::storage::fill_block(
                core.storage_mut().block_mut(0).unwrap(),
                crate::config::TAG_HEADER,
                b"",
                false,
            );

            core.add(TAG_TABLE, b"t", b"").unwrap();
            let long = vec![b'x'; block_size * 3];
            let rec = core.add(TAG_ROW, b"row", &long).unwrap();
            core.set(TAG_ROW, b"row", b"short", rec.line).unwrap();
            let mut cursor = 0;
            core.delete(TAG_TABLE, &mut cursor, false).unwrap();

            assert_eq!(core.storage().file_size() % block_size as u64, 0);
            for line in 0..core.block_count() {
                let tag = core.storage().block(line).unwrap()[0];
                assert!(
                    b"#~$:&!-".contains(&tag),
                    "bad tag {:?} at block {} (block_size {})",
                    tag as char,
                    line,
                    block_size
                );
            }
        }
    }
}
