//! # Global Data
//!
//! `~`-tagged records form a flat key-value namespace owned by no table.
//! Unlike rows there is no index list to consult, so every lookup is a
//! linear scan from the top of the file.

use tracing::debug;

use crate::config::TAG_DATA;
use crate::engine::{Pattern, Record};
use crate::error::{Error, Result};

use super::{clean, lossy_string, Db};

/// Handle to a global data record.
#[derive(Debug, Clone)]
pub struct Data {
    pub(crate) db: Db,
    pub(crate) key: Vec<u8>,
    pub(crate) val: Vec<u8>,
    pub(crate) line: Option<u64>,
}

impl Db {
    /// Creates a global entry. If one with this key exists, returns
    /// [`Error::DataExists`] carrying a handle to it.
    pub fn add_data(&self, key: &str, value: &str) -> Result<Data> {
        let key_b = clean(key.as_bytes());
        let val_b = clean(value.as_bytes());

        let mut core = self.shared.core.lock();

        let mut cursor = 0;
        if let Ok(existing) = core.get(
            TAG_DATA,
            &Pattern::literal(key_b.clone()),
            &Pattern::any(),
            &mut cursor,
            false,
        ) {
            drop(core);
            return Err(Error::DataExists(Data::from_record(self.clone(), existing)));
        }

        let rec = core.add(TAG_DATA, &key_b, &val_b)?;
        drop(core);

        debug!(key, line = rec.line, "data added");
        Ok(Data::from_record(self.clone(), rec))
    }

    /// Fetches a global entry by exact key.
    pub fn get_data(&self, key: &str) -> Result<Data> {
        let key_b = clean(key.as_bytes());
        let core = self.shared.core.lock();

        let mut cursor = 0;
        let rec = core.get(
            TAG_DATA,
            &Pattern::literal(key_b),
            &Pattern::any(),
            &mut cursor,
            false,
        )?;
        drop(core);

        Ok(Data::from_record(self.clone(), rec))
    }

    /// Collects every global entry matching both patterns.
    pub fn find_data(&self, key: &Pattern, value: &Pattern) -> Result<Vec<Data>> {
        let core = self.shared.core.lock();

        let mut entries = Vec::new();
        let mut cursor = 0;
        while let Ok(rec) = core.get(TAG_DATA, key, value, &mut cursor, false) {
            entries.push(Data::from_record(self.clone(), rec));
        }
        Ok(entries)
    }
}

impl Data {
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

    /// Block index of the record, or `None` after [`Data::del`].
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// Replaces the value, rewriting the record in place.
    pub fn set_value(&mut self, value: &str) -> Result<()> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let val = clean(value.as_bytes());

        self.db
            .shared
            .core
            .lock()
            .set(TAG_DATA, &self.key, &val, line)?;

        self.val = val;
        Ok(())
    }

    /// Changes the key, keeping the value.
    pub fn rename(&mut self, key: &str) -> Result<()> {
        let line = self.line.ok_or(Error::StaleHandle)?;
        let key = clean(key.as_bytes());

        self.db
            .shared
            .core
            .lock()
            .set(TAG_DATA, &key, &self.val, line)?;

        self.key = key;
        Ok(())
    }

    /// Deletes the entry. Idempotent.
    pub fn del(&mut self) -> Result<()> {
        let Some(line) = self.line.take() else {
            return Ok(());
        };

        let mut cursor = line;
        self.db
            .shared
            .core
            .lock()
            .delete(TAG_DATA, &mut cursor, true)?;
        Ok(())
    }
}
