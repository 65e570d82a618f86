//! # Payload Codec
//!
//! Transforms a logical `key=value` payload into the byte form stored in
//! block bodies, and back. The write pipeline is:
//!
//! ```text
//! payload = key ++ '=' ++ value
//! if cipher configured:        payload = encrypt(payload ++ "#enc")
//! else if production layout:   payload = compress(payload)   (if configured)
//! body = escape(payload)
//! ```
//!
//! Reads run the inverse. After decryption the codec verifies and strips
//! the `#enc` trailer; a missing trailer means the key is wrong and the
//! record is unreadable. Encryption and compression are mutually exclusive,
//! and the debug layout skips compression so block bodies stay legible.
//!
//! ## Cipher and Compressor Seams
//!
//! The engine only requires symmetric byte-in/byte-out transforms, so the
//! concrete primitives live behind object-safe traits supplied at open.
//! Implementations must be deterministic per key if byte-identical rewrite
//! semantics matter to the caller; the engine itself only requires that
//! `decrypt(encrypt(x)) == x`.
//!
//! ## Critical Property
//!
//! After encoding, the body contains no structural byte and no registered
//! tag (see [`crate::encoding::escape`]), so every subsequent scan for a
//! tag byte or a trailing `@` pointer is unambiguous.

use std::fmt;
use std::sync::Arc;

use crate::config::{CORE_CHARS, ENC_TRAILER, PAYLOAD_SEPARATOR};
use crate::encoding::{escape, unescape};
use crate::error::{Error, Result};

/// Symmetric cipher seam. `decrypt(encrypt(x)) == x` for the same instance.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>>;
}

/// Whole-record compressor seam.
pub trait Compressor: Send + Sync {
    fn compress(&self, raw: &[u8]) -> Vec<u8>;
    fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>>;
}

/// Payload pipeline configuration shared by every primitive of a database.
#[derive(Clone)]
pub struct Codec {
    cipher: Option<Arc<dyn Cipher>>,
    compressor: Option<Arc<dyn Compressor>>,
    alphabet: Vec<u8>,
    debug_layout: bool,
}

impl Codec {
    /// Builds a codec. `tags` is the full registered tag list; the escape
    /// alphabet is `CORE_CHARS` followed by `tags`, in that order.
    pub fn new(
        cipher: Option<Arc<dyn Cipher>>,
        compressor: Option<Arc<dyn Compressor>>,
        tags: &[u8],
        debug_layout: bool,
    ) -> Self {
        let mut alphabet = CORE_CHARS.to_vec();
        alphabet.extend_from_slice(tags);
        Self {
            cipher,
            compressor,
            alphabet,
            debug_layout,
        }
    }

    /// Encodes `key` and `value` into a block body fragment.
    pub fn encode(&self, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(key.len() + value.len() + 1);
        payload.extend_from_slice(key);
        payload.push(PAYLOAD_SEPARATOR);
        payload.extend_from_slice(value);

        if let Some(cipher) = &self.cipher {
            payload.extend_from_slice(ENC_TRAILER);
            payload = cipher.encrypt(&payload)?;
        } else if !self.debug_layout {
            if let Some(compressor) = &self.compressor {
                payload = compressor.compress(&payload);
            }
        }

        Ok(escape(&payload, &self.alphabet))
    }

    /// Decodes a collected record body back into the raw payload. The
    /// caller splits the payload on its first `=`.
    pub fn decode(&self, body: &[u8]) -> Result<Vec<u8>> {
        let mut payload = unescape(body, &self.alphabet);

        if let Some(cipher) = &self.cipher {
            payload = cipher.decrypt(&payload).map_err(|e| match e {
                Error::DecryptFailed => Error::DecryptFailed,
                _ => Error::DecodeFailed,
            })?;
            if !payload.ends_with(ENC_TRAILER) {
                return Err(Error::DecryptFailed);
            }
            payload.truncate(payload.len() - ENC_TRAILER.len());
        } else if !self.debug_layout {
            if let Some(compressor) = &self.compressor {
                payload = compressor
                    .decompress(&payload)
                    .map_err(|_| Error::DecodeFailed)?;
            }
        }

        Ok(payload)
    }

    /// The escape alphabet, `CORE_CHARS` followed by the registered tags.
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn debug_layout(&self) -> bool {
        self.debug_layout
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("cipher", &self.cipher.is_some())
            .field("compressor", &self.compressor.is_some())
            .field("alphabet", &String::from_utf8_lossy(&self.alphabet))
            .field("debug_layout", &self.debug_layout)
            .finish()
    }
}

/// Splits a decoded payload at its first `=`. A payload without a
/// separator is all key, with an empty value.
pub fn split_payload(payload: &[u8]) -> (&[u8], &[u8]) {
    match payload.iter().position(|&b| b == PAYLOAD_SEPARATOR) {
        Some(i) => (&payload[..i], &payload[i + 1..]),
        None => (payload, &[]),
    }
}
