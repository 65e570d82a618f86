//! # Database Handles and Lifecycle
//!
//! `Db` is the public entry point: it owns the record engine behind a
//! mutex and hands out `Table` / `Row` / `Data` handles that clone the
//! shared state. Every public call locks the engine for its duration, so
//! operations on a single database linearize in call order; concurrent
//! handles to the same underlying *file* are unsupported.
//!
//! ## Open Protocol
//!
//! Opening a missing (or empty) file creates it with two header records:
//!
//! - block 0, written raw: `#bit=<base36 width>` padded with filler
//! - block 1, written through the codec: `enc=enc`
//!
//! Opening an existing file parses block 0 for the width (the value in
//! the file always wins over the option) and then reads the record at
//! block 1. Decoding it back to `enc=enc` proves the configured cipher
//! matches the file; anything else is [`Error::DecryptFailed`].
//!
//! ## Tag Registration
//!
//! Extra record tags may be registered at open for use with the
//! tagged-record layer. A tag that collides with the structural byte set
//! (or with whitespace, which would be unreadable in dumps) is rejected
//! with [`Error::ReservedPrefix`]. Registered tags join the escape
//! alphabet, so registration is part of the file format and must be
//! consistent across opens.

mod data;
mod optimize;
mod row;
mod table;

pub use data::Data;
pub use row::Row;
pub use table::Table;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::codec::{Cipher, Codec, Compressor};
use crate::config::{
    BIT_HEADER_PREFIX, CORE_CHARS, DEFAULT_BLOCK_SIZE, DEFAULT_TAGS, ENC_HANDSHAKE,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, MIN_DEBUG_BLOCK_SIZE, TAG_CHAIN, TAG_HEADER,
};
use crate::encoding::{decode_base36, encode_base36};
use crate::engine::{Core, Pattern, Record, Replaced};
use crate::error::{Error, Result};
use crate::storage::{body_capacity, fill_block, MmapBlockFile};

/// Codec and layout settings retained for reopening (compaction swaps the
/// file out under the same configuration).
#[derive(Clone)]
pub(crate) struct DbConfig {
    pub(crate) block_size: usize,
    pub(crate) debug_layout: bool,
    pub(crate) tags: Vec<u8>,
    cipher: Option<Arc<dyn Cipher>>,
    compressor: Option<Arc<dyn Compressor>>,
}

impl DbConfig {
    pub(crate) fn codec(&self) -> Codec {
        Codec::new(
            self.cipher.clone(),
            self.compressor.clone(),
            &self.tags,
            self.debug_layout,
        )
    }
}

pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
    pub(crate) path: PathBuf,
    pub(crate) config: DbConfig,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.core.get_mut().sync();
    }
}

/// An open database. Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct Db {
    pub(crate) shared: Arc<Shared>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("path", &self.shared.path)
            .field("block_size", &self.shared.config.block_size)
            .finish()
    }
}

/// Builder for configuring and opening a database.
///
/// ```ignore
/// let db = Db::options()
///     .block_size(1024)
///     .cipher(my_cipher)
///     .open("./my.db")?;
/// ```
#[derive(Default)]
pub struct OpenOptions {
    block_size: Option<usize>,
    cipher: Option<Arc<dyn Cipher>>,
    compressor: Option<Arc<dyn Compressor>>,
    debug_layout: bool,
    extra_tags: Vec<u8>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block width for a newly created database. Clamped to the legal
    /// range; ignored when the file already exists (the header wins).
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Symmetric cipher applied to every payload. Must match the cipher
    /// the file was created with; the handshake record enforces this.
    pub fn cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Whole-record compressor, applied only without a cipher and only in
    /// the production layout.
    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Human-inspectable layout: every block ends in a newline, payloads
    /// are never compressed, and the minimum block width drops to 16.
    /// Must match the layout the file was created with.
    pub fn debug_layout(mut self, debug_layout: bool) -> Self {
        self.debug_layout = debug_layout;
        self
    }

    /// Registers extra record tags for the tagged-record layer. Validated
    /// against the structural byte set at open.
    pub fn extra_tags(mut self, tags: &[u8]) -> Self {
        self.extra_tags.extend_from_slice(tags);
        self
    }

    /// Opens the database, creating the file (and parent directories) if
    /// needed. A missing `.db` extension is appended.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Db> {
        let path = normalize_path(path.as_ref());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tags = register_tags(&self.extra_tags)?;
        let block_size = clamp_block_size(
            self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            self.debug_layout,
        );

        let config = DbConfig {
            block_size,
            debug_layout: self.debug_layout,
            tags,
            cipher: self.cipher,
            compressor: self.compressor,
        };

        let is_new = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let core = if is_new {
            let core = create_core(&path, &config)?;
            info!(path = %path.display(), block_size, "created database");
            core
        } else {
            let block_size = read_bit_header(&path)?;
            let mut config = config.clone();
            config.block_size = block_size;
            let storage = MmapBlockFile::open(&path, block_size)?;
            let core = Core::new(storage, config.codec());
            verify_handshake(&core)?;
            info!(path = %path.display(), block_size, "opened database");

            return Ok(Db {
                shared: Arc::new(Shared {
                    core: Mutex::new(core),
                    path,
                    config,
                }),
            });
        };

        Ok(Db {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                path,
                config,
            }),
        })
    }
}

impl Db {
    /// Opens `path` with default options (no cipher, no compressor,
    /// production layout, default block width).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Db> {
        OpenOptions::new().open(path)
    }

    /// Starts an [`OpenOptions`] builder.
    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    /// Syncs and closes the database. Outstanding handle clones keep the
    /// file mapped until they drop, but this flushes everything written
    /// so far.
    pub fn close(self) -> Result<()> {
        let core = self.shared.core.lock();
        core.sync()
    }

    /// Flushes written blocks to disk without closing.
    pub fn sync(&self) -> Result<()> {
        self.shared.core.lock().sync()
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn block_size(&self) -> usize {
        self.shared.config.block_size
    }

    // ------------------------------------------------------------------
    // Tagged-record layer
    //
    // Raw access to the record primitives for registered extra tags (the
    // built-in tags work too). The table/row/data conventions are not
    // applied here.
    // ------------------------------------------------------------------

    /// Adds a record under a registered tag. No uniqueness check.
    pub fn add_record(&self, tag: u8, key: &[u8], value: &[u8]) -> Result<Record> {
        self.check_tag(tag)?;
        self.shared.core.lock().add(tag, key, value)
    }

    /// Collects every record under `tag` matching both patterns.
    pub fn find_records(
        &self,
        tag: u8,
        key_pattern: &Pattern,
        value_pattern: &Pattern,
    ) -> Result<Vec<Record>> {
        self.check_tag(tag)?;
        let core = self.shared.core.lock();
        let mut records = Vec::new();
        let mut cursor = 0;
        while let Ok(rec) = core.get(tag, key_pattern, value_pattern, &mut cursor, false) {
            records.push(rec);
        }
        Ok(records)
    }

    /// Rewrites the record at `line` in place.
    pub fn set_record_at(
        &self,
        tag: u8,
        line: u64,
        key: &[u8],
        value: &[u8],
    ) -> Result<Replaced> {
        self.check_tag(tag)?;
        self.shared.core.lock().set(tag, key, value, line)
    }

    /// Frees the record at `line` if its tag matches; no-op otherwise.
    pub fn del_record_at(&self, tag: u8, line: u64) -> Result<Option<Record>> {
        self.check_tag(tag)?;
        let mut cursor = line;
        self.shared.core.lock().delete(tag, &mut cursor, true)
    }

    fn check_tag(&self, tag: u8) -> Result<()> {
        if self.shared.config.tags.contains(&tag) {
            Ok(())
        } else {
            Err(Error::UnregisteredTag(tag))
        }
    }
}

/// Builds a fresh database file at `path`: bit header at block 0, the
/// encoded `enc=enc` handshake at block 1.
pub(crate) fn create_core(path: &Path, config: &DbConfig) -> Result<Core> {
    let digits = encode_base36(config.block_size as u64);
    let mut header = Vec::with_capacity(BIT_HEADER_PREFIX.len() + digits.len());
    header.extend_from_slice(&BIT_HEADER_PREFIX[1..]); // tag byte written separately
    header.extend_from_slice(&digits);

    if header.len() > body_capacity(config.block_size, config.debug_layout) {
        return Err(Error::BitSizeTooLarge(config.block_size));
    }

    let storage = MmapBlockFile::create(path, config.block_size, 1)?;
    let mut core = Core::new(storage, config.codec());

    fill_block(
        core.storage_mut().block_mut(0)?,
        TAG_HEADER,
        &header,
        config.debug_layout,
    );

    core.add(TAG_HEADER, ENC_HANDSHAKE, ENC_HANDSHAKE)?;
    Ok(core)
}

/// Reads the block width from the raw `#bit=` header of an existing file.
fn read_bit_header(path: &Path) -> Result<usize> {
    use std::io::Read;

    let mut file = fs::File::open(path)?;
    let mut buf = [0u8; 10];
    file.read_exact(&mut buf)
        .map_err(|_| Error::InvalidHeader("file too short for a bit header".into()))?;

    if !buf.starts_with(BIT_HEADER_PREFIX) {
        return Err(Error::InvalidHeader(
            "missing #bit= header at block 0".into(),
        ));
    }

    let digits: Vec<u8> = buf[BIT_HEADER_PREFIX.len()..]
        .iter()
        .copied()
        .take_while(|&b| b != crate::config::FILLER && b != crate::config::DEBUG_TERMINATOR)
        .collect();

    let block_size = decode_base36(&digits)
        .ok_or_else(|| Error::InvalidHeader("bit size is not base-36".into()))?
        as usize;

    if !(MIN_DEBUG_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(Error::InvalidHeader(format!(
            "bit size {} out of range",
            block_size
        )));
    }
    Ok(block_size)
}

/// Confirms the codec can read the handshake record back as `enc=enc`.
fn verify_handshake(core: &Core) -> Result<()> {
    let mut cursor = 1;
    match core.get(
        TAG_HEADER,
        &Pattern::literal(ENC_HANDSHAKE),
        &Pattern::any(),
        &mut cursor,
        false,
    ) {
        Ok(rec) if rec.value == ENC_HANDSHAKE => Ok(()),
        _ => Err(Error::DecryptFailed),
    }
}

/// Full tag list for a database: the defaults plus validated extras.
fn register_tags(extra: &[u8]) -> Result<Vec<u8>> {
    let mut tags = DEFAULT_TAGS.to_vec();
    for &tag in extra {
        let reserved = CORE_CHARS.contains(&tag)
            || tags.contains(&tag)
            || tag == TAG_CHAIN
            || tag.is_ascii_whitespace()
            || tag == 0;
        if reserved {
            return Err(Error::ReservedPrefix(tag));
        }
        tags.push(tag);
    }
    Ok(tags)
}

fn clamp_block_size(requested: usize, debug_layout: bool) -> usize {
    let min = if debug_layout {
        MIN_DEBUG_BLOCK_SIZE
    } else {
        MIN_BLOCK_SIZE
    };
    requested.clamp(min, MAX_BLOCK_SIZE)
}

fn normalize_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "db" => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".db");
            PathBuf::from(name)
        }
    }
}

/// Strips leading zero bytes from caller-supplied names, keys and values
/// so plain string input can never select the pattern discriminant.
pub(crate) fn clean(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

pub(crate) fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
