//! Bit-string prefixes addressing prefix-tree nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::zp::Zp;

/// A string of bits of explicit length.
///
/// Bits are stored MSB-first within each byte. Bits past `len` in the last
/// byte are always zero, so derived equality and hashing are exact.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBitstring", into = "RawBitstring")]
pub struct Bitstring {
    len: usize,
    bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct RawBitstring {
    len: u32,
    bytes: Vec<u8>,
}

impl Bitstring {
    /// An all-zero bit-string of `len` bits.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            bytes: vec![0u8; byte_len(len)],
        }
    }

    /// Every bit of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len() * 8,
            bytes: bytes.to_vec(),
        }
    }

    /// The first `len` bits of an element's little-endian byte encoding.
    ///
    /// The low-order bytes of a hashed element are the most uniformly
    /// distributed, so they drive tree branching.
    pub fn of_element(z: &Zp, len: usize) -> Self {
        Self::from_bytes(&z.value().to_le_bytes()).truncated(len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read bit `i`. Panics if `i >= len`.
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {} out of range {}", i, self.len);
        self.bytes[i / 8] & mask(i) != 0
    }

    /// Set bit `i` to one. Panics if `i >= len`.
    pub fn set(&mut self, i: usize) {
        assert!(i < self.len, "bit index {} out of range {}", i, self.len);
        self.bytes[i / 8] |= mask(i);
    }

    /// Set bit `i` to zero. Panics if `i >= len`.
    pub fn clear(&mut self, i: usize) {
        assert!(i < self.len, "bit index {} out of range {}", i, self.len);
        self.bytes[i / 8] &= !mask(i);
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        self.len += 1;
        if bit {
            self.set(self.len - 1);
        }
    }

    /// The first `len` bits. Panics if `len` exceeds the current length.
    pub fn truncated(&self, len: usize) -> Self {
        assert!(len <= self.len, "cannot truncate {} bits to {}", self.len, len);
        let mut out = Self {
            len,
            bytes: self.bytes[..byte_len(len)].to_vec(),
        };
        out.clear_trailing();
        out
    }

    /// This prefix extended by the low `quantum` bits of `index`, most
    /// significant first.
    pub fn child(&self, index: usize, quantum: u32) -> Self {
        let mut out = self.clone();
        for shift in (0..quantum).rev() {
            out.push((index >> shift) & 1 == 1);
        }
        out
    }

    /// Read `quantum` bits starting at `offset` as an integer.
    pub fn chunk(&self, offset: usize, quantum: u32) -> usize {
        (0..quantum as usize).fold(0, |acc, i| (acc << 1) | self.get(offset + i) as usize)
    }

    /// True if `self` is a prefix of `other`.
    pub fn is_prefix_of(&self, other: &Bitstring) -> bool {
        self.len <= other.len && other.truncated(self.len) == *self
    }

    fn clear_trailing(&mut self) {
        let used = self.len % 8;
        if used != 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= 0xffu8 << (8 - used);
            }
        }
    }
}

fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

fn mask(i: usize) -> u8 {
    0x80 >> (i % 8)
}

impl TryFrom<RawBitstring> for Bitstring {
    type Error = CoreError;

    fn try_from(raw: RawBitstring) -> Result<Self, Self::Error> {
        let len = raw.len as usize;
        if raw.bytes.len() != byte_len(len) {
            return Err(CoreError::MalformedPrefix(format!(
                "{} bits need {} bytes, got {}",
                len,
                byte_len(len),
                raw.bytes.len()
            )));
        }
        let mut out = Self {
            len,
            bytes: raw.bytes,
        };
        out.clear_trailing();
        Ok(out)
    }
}

impl From<Bitstring> for RawBitstring {
    fn from(b: Bitstring) -> Self {
        Self {
            len: b.len as u32,
            bytes: b.bytes,
        }
    }
}

impl fmt::Display for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitstring({})", self)
    }
}
