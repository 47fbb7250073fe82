//! Textual marker format for deferred child elements.
//!
//! A marker is `<A<O<ELEMENT ` followed by the key as exactly 16 lowercase
//! hex digits (big-endian, zero padded) and then `>O>A>`. Markers only live
//! inside captured bodies between capture and rendering; the format is not
//! meant for storage.

use std::fmt;
use std::io;

pub const MARKER_PREFIX: &str = "<A<O<ELEMENT ";
pub const MARKER_SUFFIX: &str = ">O>A>";

/// Number of hex digits in an encoded key.
pub const KEY_LEN: usize = 16;

/// Total length of an encoded marker in bytes.
pub const MARKER_LEN: usize = MARKER_PREFIX.len() + KEY_LEN + MARKER_SUFFIX.len();

pub(crate) const PREFIX: &[u8] = MARKER_PREFIX.as_bytes();
pub(crate) const SUFFIX: &[u8] = MARKER_SUFFIX.as_bytes();

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Opaque substitution key correlating a marker to a registered writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(pub u64);

impl ElementKey {
    /// The key as 16 lowercase hex digits.
    pub fn to_hex(self) -> [u8; KEY_LEN] {
        let mut hex = [0u8; KEY_LEN];
        for (i, digit) in hex.iter_mut().enumerate() {
            let shift = (KEY_LEN - 1 - i) * 4;
            *digit = HEX_DIGITS[((self.0 >> shift) & 0xf) as usize];
        }
        hex
    }

    /// Parse exactly 16 lowercase hex digits.
    ///
    /// Upper-case digits are rejected, same as in the scanner.
    pub fn from_hex(hex: &[u8]) -> Option<Self> {
        if hex.len() != KEY_LEN {
            return None;
        }
        let mut value = 0u64;
        for &b in hex {
            value = (value << 4) | u64::from(hex_value(b)?);
        }
        Some(ElementKey(value))
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The value of a digit the scanner accepts inside a key (`[0-9a-f]`).
#[inline]
pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Encode a key into its marker bytes.
pub fn encode_marker(key: ElementKey) -> [u8; MARKER_LEN] {
    let mut marker = [0u8; MARKER_LEN];
    let key_start = PREFIX.len();
    let suffix_start = key_start + KEY_LEN;
    marker[..key_start].copy_from_slice(PREFIX);
    marker[key_start..suffix_start].copy_from_slice(&key.to_hex());
    marker[suffix_start..].copy_from_slice(SUFFIX);
    marker
}

/// Write the marker for `key` to a byte sink.
pub fn write_marker<W: io::Write + ?Sized>(key: ElementKey, out: &mut W) -> io::Result<()> {
    out.write_all(&encode_marker(key))
}

/// Append the marker for `key` to a string being captured.
pub fn push_marker(key: ElementKey, out: &mut String) {
    out.push_str(MARKER_PREFIX);
    for &digit in &key.to_hex() {
        out.push(char::from(digit));
    }
    out.push_str(MARKER_SUFFIX);
}

/// The marker for `key` as an owned string.
pub fn marker_string(key: ElementKey) -> String {
    let mut out = String::with_capacity(MARKER_LEN);
    push_marker(key, &mut out);
    out
}

/// Decode a complete marker, returning `None` unless `bytes` is exactly one
/// well-formed marker.
pub fn decode_marker(bytes: &[u8]) -> Option<ElementKey> {
    let rest = bytes.strip_prefix(PREFIX)?;
    let hex = rest.strip_suffix(SUFFIX)?;
    ElementKey::from_hex(hex)
}
