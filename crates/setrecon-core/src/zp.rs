//! Prime-field elements.
//!
//! All arithmetic is modulo the Mersenne prime `2^127 - 1`. Reduction against
//! a Mersenne prime is a shift and an add, so every operation stays inside
//! `u128` without a bignum dependency.
//!
//! An element doubles as a record identifier: its wire and storage form is a
//! fixed-width big-endian byte string (see [`Zp::to_element_bytes`]).

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::CoreError;

/// The field modulus, `2^127 - 1`.
pub const MODULUS: u128 = (1u128 << 127) - 1;

/// Width in bytes of an element's byte encoding.
pub const ELEMENT_WIDTH: usize = 16;

const LOW_64: u128 = u64::MAX as u128;

/// Domain separator for [`Zp::hash_key`].
const KEY_DOMAIN: &[u8] = b"setrecon-element-v0:";

/// An element of the prime field `Z/pZ`, always stored fully reduced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Zp(u128);

impl Zp {
    /// The additive identity.
    pub const ZERO: Self = Self(0);

    /// The multiplicative identity.
    pub const ONE: Self = Self(1);

    /// Create an element, reducing `value` into the field.
    pub const fn new(value: u128) -> Self {
        Self(reduce(value))
    }

    /// The reduced integer value.
    pub const fn value(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Raise to the power `exp` by square-and-multiply.
    pub fn pow(self, mut exp: u128) -> Self {
        let mut base = self;
        let mut acc = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc * base;
            }
            base = base * base;
            exp >>= 1;
        }
        acc
    }

    /// Multiplicative inverse, `None` for zero.
    pub fn inv(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            // Fermat: a^(p-2) = a^-1 for prime p.
            Some(self.pow(MODULUS - 2))
        }
    }

    /// Field division, `None` when `rhs` is zero.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        rhs.inv().map(|inv| self * inv)
    }

    /// Deterministic evaluation points: `1, -1, 2, -2, ...`.
    ///
    /// Both peers must derive the same points from the same sample count, so
    /// this is part of the protocol and must never change.
    pub fn points(n: usize) -> Vec<Self> {
        (0..n)
            .map(|i| {
                let k = Self::new((i / 2 + 1) as u128);
                if i % 2 == 0 {
                    k
                } else {
                    -k
                }
            })
            .collect()
    }

    /// Canonical big-endian byte encoding.
    pub fn to_element_bytes(&self) -> [u8; ELEMENT_WIDTH] {
        self.0.to_be_bytes()
    }

    /// Decode a big-endian element encoding.
    ///
    /// Shorter input is left-padded with zeros. Values outside the field are
    /// rejected rather than reduced so that decoding stays the exact inverse
    /// of [`Zp::to_element_bytes`].
    pub fn from_element_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() > ELEMENT_WIDTH {
            return Err(CoreError::ElementWidth {
                max: ELEMENT_WIDTH,
                got: bytes.len(),
            });
        }
        let mut buf = [0u8; ELEMENT_WIDTH];
        buf[ELEMENT_WIDTH - bytes.len()..].copy_from_slice(bytes);
        let value = u128::from_be_bytes(buf);
        if value >= MODULUS {
            return Err(CoreError::OutOfRange(hex::encode(bytes)));
        }
        Ok(Self(value))
    }

    /// Map an application key to an element.
    pub fn hash_key(key: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(key);
        let digest = hasher.finalize();

        let mut buf = [0u8; ELEMENT_WIDTH];
        buf.copy_from_slice(&digest.as_bytes()[..ELEMENT_WIDTH]);
        Self::new(u128::from_be_bytes(buf) >> 1)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_element_bytes())
    }
}

/// Reduce any `u128` modulo `2^127 - 1`.
const fn reduce(x: u128) -> u128 {
    // 2^127 = 1 (mod p), so fold the top bit onto the low 127 bits.
    let r = (x & MODULUS) + (x >> 127);
    if r >= MODULUS {
        r - MODULUS
    } else {
        r
    }
}

/// Multiply two reduced values modulo `2^127 - 1`.
fn mul_mod(a: u128, b: u128) -> u128 {
    let (a_hi, a_lo) = (a >> 64, a & LOW_64);
    let (b_hi, b_lo) = (b >> 64, b & LOW_64);

    // Both inputs are below 2^127, so the high limbs are below 2^63 and
    // none of the partial products or the middle sum can overflow.
    let ll = a_lo * b_lo;
    let mid = a_lo * b_hi + a_hi * b_lo;
    let hh = a_hi * b_hi;

    let (lo, carry) = ll.overflowing_add(mid << 64);
    let hi = hh + (mid >> 64) + carry as u128;

    // product = hi * 2^128 + lo, and 2^128 = 2 (mod p).
    reduce(reduce(hi << 1) + (lo & MODULUS) + (lo >> 127))
}

impl Add for Zp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(reduce(self.0 + rhs.0))
    }
}

impl Sub for Zp {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(self.0 + MODULUS - rhs.0)
        }
    }
}

impl Neg for Zp {
    type Output = Self;

    fn neg(self) -> Self {
        Self::ZERO - self
    }
}

impl Mul for Zp {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(mul_mod(self.0, rhs.0))
    }
}

impl From<u64> for Zp {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl fmt::Debug for Zp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zp({:#x})", self.0)
    }
}

impl fmt::Display for Zp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl Serialize for Zp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_element_bytes())
    }
}

impl<'de> Deserialize<'de> for Zp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(ZpVisitor)
    }
}

struct ZpVisitor;

impl<'de> Visitor<'de> for ZpVisitor {
    type Value = Zp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at most {} bytes encoding a field element", ELEMENT_WIDTH)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Zp, E> {
        Zp::from_element_bytes(v).map_err(E::custom)
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Zp, E> {
        self.visit_bytes(&v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Zp, A::Error> {
        let mut bytes = Vec::with_capacity(ELEMENT_WIDTH);
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        self.visit_bytes(&bytes)
    }
}
