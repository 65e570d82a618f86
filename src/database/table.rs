//! # Tables
//!
//! A table is a `$`-tagged record whose key is the table name and whose
//! value is the comma-separated base-36 list of its rows' primary block
//! indices, in insertion order. Row lookups jump straight to those
//! indices and confirm with a single probe, so a stale entry in the list
//! (from a crash between a row delete and the table rewrite) costs one
//! probe and nothing else.

use tracing::debug;

use crate::config::{TAG_ROW, TAG_TABLE};
use crate::encoding::{decode_base36, encode_base36};
use crate::engine::{Pattern, Record};
use crate::error::{Error, Result};

use super::{clean, lossy_string, Db, Row};

/// Handle to a table record. Holds the table's block index and a copy of
/// its row list; the list is refreshed by the mutating methods.
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) db: Db,
    pub(crate) key: Vec<u8>,
    pub(crate) val: Vec<u8>,
    pub(crate) line: Option<u64>,
}

impl Db {
    /// Creates a table. If one with this name exists, returns
    /// [`Error::TableExists`] carrying a handle to it.
    pub fn add_table(&self, name: &str) -> Result<Table> {
        let key = clean(name.as_bytes());
        let mut core = self.shared.core.lock();

        let mut cursor = 0;
        if let Ok(existing) = core.get(
            TAG_TABLE,
            &Pattern::literal(key.clone()),
            &Pattern::any(),
            &mut cursor,
            false,
        ) {
            drop(core);
            return Err(Error::TableExists(Table::from_record(self.clone(), existing)));
        }

        let rec = core.add(TAG_TABLE, &key, b"")?;
        drop(core);

        debug!(name, line = rec.line, "table added");
        Ok(Table::from_record(self.clone(), rec))
    }

    /// Fetches a table by exact name.
    pub fn get_table(&self, name: &str) -> Result<Table> {
        let key = clean(name.as_bytes());
        let core = self.shared.core.lock();

        let mut cursor = 0;
        let rec = core.get(
            TAG_TABLE,
            &Pattern::literal(key),
            &Pattern::any(),
            &mut cursor,
            false,
        )?;
        drop(core);

        Ok(Table::from_record(self.clone(), rec))
    }

    /// Collects every table whose name matches `name`. An empty result is
    /// simply an empty vector.
    pub fn find_tables(&self, name: &Pattern) -> Result<Vec<Table>> {
        let core = self.shared.core.lock();

        let mut tables = Vec::new();
        let mut cursor = 0;
        while let Ok(rec) = core.get(TAG_TABLE, name, &Pattern::any(), &mut cursor, false) {
            tables.push(Table::from_record(self.clone(), rec));
        }
        Ok(tables)
    }
}

impl Table {
    pub(crate) fn from_record(db: Db, rec: Record) -> Self {
        Self {
            db,
            key: rec.key,
            val: rec.value,
            line: Some(rec.line),
        }
    }

    pub fn name(&self) -> String {
        lossy_string(&self.key)
    }

    /// Block index of the table record, or `None` after [`Table::del`].
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// Number of entries in the row list.
    pub fn row_count(&self) -> usize {
        row_lines(&self.val).count()
    }

    /// Inserts a row. If one with this key exists in the table, returns
    /// [`Error::RowExists`] carrying a handle to it.
    pub fn add_row(&mut self, key: &str, value: &str) -> Result<Row> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let key_b = clean(key.as_bytes());
        let val_b = clean(value.as_bytes());

        let mut core = self.db.shared.core.lock();

        for row_line in row_lines(&self.val) {
            let mut cursor = row_line;
            if let Ok(existing) = core.get(
                TAG_ROW,
                &Pattern::literal(key_b.clone()),
                &Pattern::any(),
                &mut cursor,
                true,
            ) {
                drop(core);
                return Err(Error::RowExists(Row::from_record(self.db.clone(), existing)));
            }
        }

        let rec = core.add(TAG_ROW, &key_b, &val_b)?;

        let mut new_val = self.val.clone();
        if !new_val.is_empty() {
            new_val.push(b',');
        }
        new_val.extend_from_slice(&encode_base36(rec.line));
        core.set(TAG_TABLE, &self.key, &new_val, line)?;
        drop(core);

        self.val = new_val;
        debug!(table = %self.name(), key, line = rec.line, "row added");
        Ok(Row::from_record(self.db.clone(), rec))
    }

    /// Fetches a row by exact key, probing only the blocks this table's
    /// row list points at.
    pub fn get_row(&self, key: &str) -> Result<Row> {
        let key_b = clean(key.as_bytes());
        let core = self.db.shared.core.lock();

        for row_line in row_lines(&self.val) {
            let mut cursor = row_line;
            if let Ok(rec) = core.get(
                TAG_ROW,
                &Pattern::literal(key_b.clone()),
                &Pattern::any(),
                &mut cursor,
                true,
            ) {
                drop(core);
                return Ok(Row::from_record(self.db.clone(), rec));
            }
        }
        Err(Error::NotFound)
    }

    /// Collects every row of this table matching both patterns.
    pub fn find_rows(&self, key: &Pattern, value: &Pattern) -> Result<Vec<Row>> {
        let core = self.db.shared.core.lock();

        let mut rows = Vec::new();
        for row_line in row_lines(&self.val) {
            let mut cursor = row_line;
            if let Ok(rec) = core.get(TAG_ROW, key, value, &mut cursor, true) {
                rows.push(Row::from_record(self.db.clone(), rec));
            }
        }
        Ok(rows)
    }

    /// Renames the table, rewriting its record in place.
    pub fn rename(&mut self, name: &str) -> Result<()> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let key = clean(name.as_bytes());

        let mut core = self.db.shared.core.lock();
        core.set(TAG_TABLE, &key, &self.val, line)?;
        drop(core);

        self.key = key;
        Ok(())
    }

    /// Deletes the table record and every row its list points at. Rows
    /// whose block has already been repurposed are skipped. Idempotent:
    /// deleting through a stale handle is a no-op.
    pub fn del(&mut self) -> Result<()> {
        let Some(line) = self.line.take() else {
            return Ok(());
        };

        let mut core = self.db.shared.core.lock();

        let mut cursor = line;
        core.delete(TAG_TABLE, &mut cursor, true)?;

        for row_line in row_lines(&self.val) {
            let mut cursor = row_line;
            core.delete(TAG_ROW, &mut cursor, true)?;
        }
        drop(core);

        debug!(table = %self.name(), line, "table deleted");
        Ok(())
    }
}

/// Iterates the block indices in a table's comma-separated row list.
/// Malformed entries are skipped.
pub(crate) fn row_lines(val: &[u8]) -> impl Iterator<Item = u64> + '_ {
    val.split(|&b| b == b',').filter_map(decode_base36)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lines_parses_base36_entries() {
        let lines: Vec<u64> = row_lines(b"2,a,1a").collect();
        assert_eq!(lines, vec![2, 10, 46]);
    }

    #[test]
    fn row_lines_empty_value_yields_nothing() {
        assert_eq!(row_lines(b"").count(), 0);
    }

    #[test]
    fn row_lines_skips_malformed_entries() {
        let lines: Vec<u64> = row_lines(b"2,?,3").collect();
        assert_eq!(lines, vec![2, 3]);
    }
}
