//! # Encoding Module
//!
//! Textual encodings used inside block bodies:
//!
//! - `base36`: lowercase base-36 block indices, used by continuation
//!   pointers, the `#bit=` header, and the row lists stored in table values
//! - `escape`: the `%<decimal>%` structural-byte escape that keeps payloads
//!   free of tag bytes and separators

pub mod base36;
pub mod escape;

pub use base36::{decode_base36, encode_base36};
pub use escape::{escape, unescape};
