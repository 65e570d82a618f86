//! # Allocator / Scanner
//!
//! Linear search over the block stream. There is no in-memory free list
//! to rebuild on open: the `!` tag written into a reclaimed block is the
//! free-list marker itself, and allocation is a scan for the first `!`
//! block, falling back to appending at end of file.
//!
//! Both operations are O(file / block size) worst case, which is the cost
//! the compaction pass exists to keep in check.

use tracing::trace;

use crate::config::{MAX_FILE_SIZE, TAG_CHAIN, TAG_FREE};
use crate::error::{Error, Result};

use super::Core;

impl Core {
    /// Returns the first block at or after `from` carrying `tag`, or
    /// `None` at end of file. Continuations are never scan origins, so
    /// asking for `&` is a caller bug.
    pub(crate) fn find_next_record(&self, tag: u8, from: u64) -> Result<Option<u64>> {
        debug_assert_ne!(tag, TAG_CHAIN, "continuations are not scannable records");

        let count = self.storage().block_count();
        for line in from..count {
            if self.storage().block(line)?[0] == tag {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Returns the first free (`!`) block at or after `from`.
    pub(crate) fn find_free_slot(&self, from: u64) -> Result<Option<u64>> {
        let count = self.storage().block_count();
        for line in from..count {
            if self.storage().block(line)?[0] == TAG_FREE {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Hands out a writable block index: the first free slot at or after
    /// `from`, or a fresh block appended at end of file. The appended
    /// block is zeroed until its writer fills it.
    pub(crate) fn alloc_block(&mut self, from: u64) -> Result<u64> {
        if let Some(line) = self.find_free_slot(from)? {
            trace!(line, "reusing free block");
            return Ok(line);
        }

        let line = self.storage().block_count();
        let block_size = self.storage().block_size() as u64;
        if (line + 1) * block_size > MAX_FILE_SIZE {
            return Err(Error::PayloadTooLarge);
        }

        self.storage_mut().grow(line + 1)?;
        trace!(line, "appended block at end of file");
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::Codec;
    use crate::config::{DEFAULT_TAGS, TAG_DATA, TAG_FREE, TAG_TABLE};
    use crate::engine::Core;
    use crate::storage::{fill_block, free_block, MmapBlockFile};
    use tempfile::tempdir;

    fn core_with_tags(tags: &[u8]) -> (Core, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = MmapBlockFile::create(dir.path().join("s.db"), 16, 4).unwrap();
        let mut core = Core::new(storage, Codec::new(None, None, DEFAULT_TAGS, true));
        for (line, &tag) in tags.iter().enumerate() {
            fill_block(core.storage_mut().block_mut(line as u64).unwrap(), tag, b"", true);
        }
        (core, dir)
    }

    #[test]
    fn find_next_record_skips_other_tags() {
        let (core, _dir) = core_with_tags(b"#~$~");

        assert_eq!(core.find_next_record(TAG_TABLE, 0).unwrap(), Some(2));
        assert_eq!(core.find_next_record(TAG_DATA, 0).unwrap(), Some(1));
        assert_eq!(core.find_next_record(TAG_DATA, 2).unwrap(), Some(3));
    }

    #[test]
    fn find_next_record_end_of_file_is_none() {
        let (core, _dir) = core_with_tags(b"#~~~");

        assert_eq!(core.find_next_record(TAG_TABLE, 0).unwrap(), None);
        assert_eq!(core.find_next_record(TAG_DATA, 4).unwrap(), None);
    }

    #[test]
    fn alloc_prefers_the_first_free_slot() {
        let (mut core, _dir) = core_with_tags(b"#~!~");

        assert_eq!(core.alloc_block(0).unwrap(), 2);
        assert_eq!(core.alloc_block(3).unwrap(), 4);
    }

    #[test]
    fn alloc_appends_and_grows_by_one() {
        let (mut core, _dir) = core_with_tags(b"#~$~");

        let line = core.alloc_block(0).unwrap();

        assert_eq!(line, 4);
        assert_eq!(core.block_count(), 5);
    }

    #[test]
    fn freed_blocks_become_allocatable() {
        let (mut core, _dir) = core_with_tags(b"#~$~");
        let debug_layout = core.debug_layout();

        free_block(core.storage_mut().block_mut(1).unwrap(), debug_layout);
        assert_eq!(core.storage().block(1).unwrap()[0], TAG_FREE);

        assert_eq!(core.alloc_block(0).unwrap(), 1);
    }
}
