//! # Compaction
//!
//! Long-lived databases accumulate `!` holes and orphaned rows, and every
//! scan pays for them. Compaction clones the live contents (tables
//! first, then their rows, then the global namespace) into a fresh file
//! under the same block size and codec, fsyncs it, and swaps it in by
//! rename. Nothing is rewritten in place, so a crash mid-compaction
//! leaves the original file untouched.
//!
//! Tables land at the top of the new file, which is the access pattern
//! that matters: row reads jump by index, but every table lookup is a
//! linear scan from block 0.
//!
//! Records stored under extra tags are engine-level data with no
//! ownership convention, so compaction does not carry them; stick to the
//! table/row/data layer if you need compaction.
//!
//! Existing handles keep their old block indices and must be re-fetched
//! after a successful compaction.

use std::fs;

use tracing::info;

use crate::config::{TAG_DATA, TAG_ROW, TAG_TABLE};
use crate::encoding::encode_base36;
use crate::engine::Pattern;
use crate::error::Result;
use crate::storage::MmapBlockFile;

use super::table::row_lines;
use super::{create_core, Db};

impl Db {
    /// Compacts the database in place, dropping free blocks and orphaned
    /// rows and moving tables to the lowest block indices.
    pub fn optimize(&self) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock();
        core.sync()?;

        let mut opt_path = shared.path.as_os_str().to_os_string();
        opt_path.push(".opt");
        let opt_path = std::path::PathBuf::from(opt_path);

        let mut new_core = create_core(&opt_path, &shared.config)?;

        let mut tables = Vec::new();
        let mut cursor = 0;
        while let Ok(rec) = core.get(
            TAG_TABLE,
            &Pattern::any(),
            &Pattern::any(),
            &mut cursor,
            false,
        ) {
            tables.push(rec);
        }

        for table in &tables {
            let new_table = new_core.add(TAG_TABLE, &table.key, b"")?;

            let mut list = Vec::new();
            for row_line in row_lines(&table.value) {
                let mut probe = row_line;
                let Ok(row) = core.get(
                    TAG_ROW,
                    &Pattern::any(),
                    &Pattern::any(),
                    &mut probe,
                    true,
                ) else {
                    continue;
                };

                let new_row = new_core.add(TAG_ROW, &row.key, &row.value)?;
                if !list.is_empty() {
                    list.push(b',');
                }
                list.extend_from_slice(&encode_base36(new_row.line));
            }

            new_core.set(TAG_TABLE, &table.key, &list, new_table.line)?;
        }

        let mut cursor = 0;
        while let Ok(rec) = core.get(
            TAG_DATA,
            &Pattern::any(),
            &Pattern::any(),
            &mut cursor,
            false,
        ) {
            new_core.add(TAG_DATA, &rec.key, &rec.value)?;
        }

        new_core.sync()?;
        let old_blocks = core.block_count();
        let new_blocks = new_core.block_count();
        drop(new_core);

        fs::rename(&opt_path, &shared.path)?;
        let storage = MmapBlockFile::open(&shared.path, shared.config.block_size)?;
        core.replace_storage(storage);

        info!(
            path = %shared.path.display(),
            old_blocks,
            new_blocks,
            "database compacted"
        );
        Ok(())
    }
}
