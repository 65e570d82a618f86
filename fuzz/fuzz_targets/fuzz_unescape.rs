//! Fuzz testing for the structural-byte codec.
//!
//! Feeds arbitrary byte sequences through unescape to ensure malformed
//! block bodies never panic, and checks that the escape/unescape pair
//! stays a lossless round trip on arbitrary payloads.

#![no_main]

use libfuzzer_sys::fuzz_target;

use slotdb::encoding::{escape, unescape};

const ALPHABET: &[u8] = b"%=,@#!-\n$:~";

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a (possibly corrupt) block body.
    let _ = unescape(data, ALPHABET);

    // Arbitrary bytes as a payload must survive the round trip.
    let escaped = escape(data, ALPHABET);
    for &b in &escaped {
        assert!(b == b'%' || !ALPHABET.contains(&b));
    }
    assert_eq!(unescape(&escaped, ALPHABET), data);
});
