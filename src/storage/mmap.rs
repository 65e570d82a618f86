//! # Memory-Mapped Block File
//!
//! `MmapBlockFile` maps the entire database file into the process address
//! space and hands out block-sized slices. The block width is a runtime
//! value fixed per file (it is recorded in the header block and immutable
//! thereafter), so unlike a compile-time page size every bounds computation
//! carries the width along.
//!
//! ## Design Notes
//!
//! - `block()` / `block_mut()` are O(1) pointer arithmetic into the map;
//!   no syscalls for resident blocks.
//! - `grow()` flushes, extends the file, and remaps. Because it takes
//!   `&mut self`, the borrow checker guarantees no block slice survives a
//!   remap.
//! - A file whose length is not a multiple of the block width is aligned
//!   forward with `-` filler before mapping, so every index names a full
//!   block.
//!
//! ## Platform Behavior
//!
//! Uses the `memmap2` crate (mmap/msync on Unix, section objects on
//! Windows). On Unix, `prefetch()` issues `MADV_WILLNEED` ahead of linear
//! scans.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::MmapMut;

use crate::config::FILLER;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct MmapBlockFile {
    file: File,
    mmap: MmapMut,
    block_size: usize,
    block_count: u64,
}

impl MmapBlockFile {
    /// Opens an existing database file, aligning any residual tail forward
    /// to a block boundary with filler bytes.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Error::InvalidHeader(format!(
                "empty database file '{}'",
                path.display()
            )));
        }

        let len = align_tail(&mut file, len, block_size)?;
        let block_count = len / block_size as u64;

        // SAFETY: the file is opened read-write by this handle and the
        // engine assumes single-process access; the map's lifetime is tied
        // to this struct and every access is bounds-checked against
        // block_count, which only changes under &mut self in grow().
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file,
            mmap,
            block_size,
            block_count,
        })
    }

    /// Creates (or truncates) a database file sized to `initial_blocks`
    /// zeroed blocks. The caller formats them before anything reads.
    pub fn create<P: AsRef<Path>>(
        path: P,
        block_size: usize,
        initial_blocks: u64,
    ) -> Result<Self> {
        debug_assert!(initial_blocks > 0, "cannot map an empty file");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        file.set_len(initial_blocks * block_size as u64)?;

        // SAFETY: freshly created file with exclusive access, sized above
        // to a whole number of blocks; same bounds discipline as open().
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file,
            mmap,
            block_size,
            block_count: initial_blocks,
        })
    }

    pub fn block(&self, index: u64) -> Result<&[u8]> {
        self.check_bounds(index)?;
        let offset = index as usize * self.block_size;
        Ok(&self.mmap[offset..offset + self.block_size])
    }

    pub fn block_mut(&mut self, index: u64) -> Result<&mut [u8]> {
        self.check_bounds(index)?;
        let offset = index as usize * self.block_size;
        Ok(&mut self.mmap[offset..offset + self.block_size])
    }

    /// Extends the file to `new_block_count` blocks. No-op when the file
    /// is already at least that large.
    pub fn grow(&mut self, new_block_count: u64) -> Result<()> {
        if new_block_count <= self.block_count {
            return Ok(());
        }

        self.mmap.flush_async()?;
        self.file
            .set_len(new_block_count * self.block_size as u64)?;

        // SAFETY: grow() holds &mut self so no block slice is live; the
        // old map is dropped on reassignment after the file was extended.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        self.block_count = new_block_count;

        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn file_size(&self) -> u64 {
        self.block_count * self.block_size as u64
    }

    /// Hints the kernel that a linear scan is about to walk `count` blocks
    /// starting at `from`.
    pub fn prefetch(&self, from: u64, count: u64) {
        if from >= self.block_count {
            return;
        }

        #[cfg(unix)]
        {
            let end = (from + count).min(self.block_count);
            let offset = from as usize * self.block_size;
            let len = (end - from) as usize * self.block_size;

            // SAFETY: offset and len were clamped to the mapped range
            // above; MADV_WILLNEED is advisory and cannot fault.
            unsafe {
                libc::madvise(
                    self.mmap.as_ptr().add(offset) as *mut libc::c_void,
                    len,
                    libc::MADV_WILLNEED,
                );
            }
        }
        #[cfg(not(unix))]
        let _ = count;
    }

    fn check_bounds(&self, index: u64) -> Result<()> {
        if index >= self.block_count {
            return Err(Error::OutOfBounds {
                block: index,
                count: self.block_count,
            });
        }
        Ok(())
    }
}

/// Pads a torn tail out to the next block boundary with filler bytes and
/// returns the aligned length.
fn align_tail(file: &mut File, len: u64, block_size: usize) -> Result<u64> {
    let residue = len % block_size as u64;
    if residue == 0 {
        return Ok(len);
    }

    let pad = block_size as u64 - residue;
    file.seek(SeekFrom::End(0))?;
    file.write_all(&vec![FILLER; pad as usize])?;
    Ok(len + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_sizes_the_file_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        let storage = MmapBlockFile::create(&path, 16, 2).unwrap();

        assert_eq!(storage.block_count(), 2);
        assert_eq!(storage.file_size(), 32);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }

    #[test]
    fn block_roundtrip() {
        let dir = tempdir().unwrap();
        let mut storage = MmapBlockFile::create(dir.path().join("t.db"), 16, 3).unwrap();

        storage.block_mut(1).unwrap().copy_from_slice(b"0123456789abcdef");

        assert_eq!(storage.block(1).unwrap(), b"0123456789abcdef");
        assert_eq!(storage.block(0).unwrap(), &[0u8; 16]);
    }

    #[test]
    fn block_out_of_bounds_fails() {
        let dir = tempdir().unwrap();
        let storage = MmapBlockFile::create(dir.path().join("t.db"), 16, 2).unwrap();

        assert!(matches!(
            storage.block(2),
            Err(Error::OutOfBounds { block: 2, count: 2 })
        ));
    }

    #[test]
    fn grow_extends_by_one_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut storage = MmapBlockFile::create(&path, 16, 1).unwrap();

        storage.grow(2).unwrap();

        assert_eq!(storage.block_count(), 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
        assert_eq!(storage.block(1).unwrap(), &[0u8; 16]);
    }

    #[test]
    fn grow_is_noop_when_smaller() {
        let dir = tempdir().unwrap();
        let mut storage = MmapBlockFile::create(dir.path().join("t.db"), 16, 4).unwrap();

        storage.grow(2).unwrap();

        assert_eq!(storage.block_count(), 4);
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        {
            let mut storage = MmapBlockFile::create(&path, 16, 1).unwrap();
            storage.block_mut(0).unwrap()[..4].copy_from_slice(b"#bit");
            storage.sync().unwrap();
        }

        let storage = MmapBlockFile::open(&path, 16).unwrap();
        assert_eq!(&storage.block(0).unwrap()[..4], b"#bit");
    }

    #[test]
    fn open_aligns_a_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        std::fs::write(&path, b"#bit=g----------X-torn").unwrap();

        let storage = MmapBlockFile::open(&path, 16).unwrap();

        assert_eq!(storage.block_count(), 2);
        let tail = storage.block(1).unwrap();
        assert_eq!(&tail[..6], b"X-torn");
        assert!(tail[6..].iter().all(|&b| b == FILLER));
    }

    #[test]
    fn open_empty_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        std::fs::write(&path, b"").unwrap();

        assert!(MmapBlockFile::open(&path, 16).is_err());
    }
}
