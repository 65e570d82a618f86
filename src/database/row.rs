//! # Rows
//!
//! A row is a `:`-tagged record owned by exactly one table: its block
//! index appears in that table's list. The list entry is a weak
//! back-reference used for lookup only: an orphaned row, mentioned by no
//! table, stays readable by a linear scan and is reclaimed by compaction.

use crate::config::TAG_ROW;
use crate::engine::Record;
use crate::error::{Error, Result};

use super::{clean, lossy_string, Db};

/// Handle to a row record.
#[derive(Debug, Clone)]
pub struct Row {
    pub(crate) db: Db,
    pub(crate) key: Vec<u8>,
    pub(crate) val: Vec<u8>,
    pub(crate) line: Option<u64>,
}

impl Row {
    pub(crate) fn from_record(db: Db, rec: Record) -> Self {
        Self {
            db,
            key: rec.key,
            val: rec.value,
            line: Some(rec.line),
        }
    }

    pub fn key(&self) -> String {
        lossy_string(&self.key)
    }

    pub fn value(&self) -> String {
        lossy_string(&self.val)
    }

    /// Block index of the row record, or `None` after [`Row::del`].
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// Replaces the row's value, rewriting the record in place.
    pub fn set_value(&mut self, value: &str) -> Result<()> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let val = clean(value.as_bytes());

        self.db
            .shared
            .core
            .lock()
            .set(TAG_ROW, &self.key, &val, line)?;

        self.val = val;
        Ok(())
    }

    /// Changes the row's key, keeping its value.
    pub fn rename(&mut self, key: &str) -> Result<()> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let key = clean(key.as_bytes());

        self.db
            .shared
            .core
            .lock()
            .set(TAG_ROW, &key, &self.val, line)?;

        self.key = key;
        Ok(())
    }

    /// Deletes the row if its block still holds one. The owning table's
    /// list keeps a stale entry until the table is rewritten; lookups
    /// tolerate it. Idempotent.
    pub fn del(&mut self) -> Result<()> {
        let Some(line) = self.line.take() else {
            return Ok(());
        };

        let mut cursor = line;
        self.db.shared.core.lock().delete(TAG_ROW, &mut cursor, true)?;
        Ok(())
    }
}
