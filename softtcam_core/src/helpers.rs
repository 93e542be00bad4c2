//! Helper functions for ternary key arithmetic
//!
//! Keys are fixed-width bit strings compared most-significant-bit first:
//! bit index 0 is the MSB of the underlying integer.

use std::fmt::{Debug, Display, LowerHex};
use std::hash::Hash;
use std::ops::{BitAnd, BitOr, BitXor, Not, Shr};

/// A fixed-width bit string usable as TCAM data, mask and lookup key.
pub trait KeyBits:
    Copy
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + LowerHex
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Shr<u32, Output = Self>
{
    /// Key width `W` in bits.
    const WIDTH: u32;
    const ZERO: Self;
    const ONES: Self;

    fn leading_zero_bits(self) -> u32;

    /// Bit at `index`, MSB first.
    #[inline]
    fn bit(self, index: u32) -> bool {
        debug_assert!(index < Self::WIDTH);
        (self >> (Self::WIDTH - 1 - index)) & (Self::ONES >> (Self::WIDTH - 1)) != Self::ZERO
    }

    /// Leading `len` bits set, the rest clear.
    #[inline]
    fn prefix_mask(len: u32) -> Self {
        if len == 0 {
            Self::ZERO
        } else if len >= Self::WIDTH {
            Self::ONES
        } else {
            !(Self::ONES >> len)
        }
    }

    /// Bits `[from, to)` set, the rest clear.
    #[inline]
    fn span(from: u32, to: u32) -> Self {
        Self::prefix_mask(to) & !Self::prefix_mask(from)
    }
}

macro_rules! impl_key_bits {
    ($($t:ty),*) => {$(
        impl KeyBits for $t {
            const WIDTH: u32 = <$t>::BITS;
            const ZERO: Self = 0;
            const ONES: Self = <$t>::MAX;

            #[inline]
            fn leading_zero_bits(self) -> u32 {
                self.leading_zeros()
            }
        }
    )*};
}

impl_key_bits!(u8, u16, u32, u64, u128);

/// Length of the longest prefix on which two ternary patterns agree in
/// both data and mask. Returns `K::WIDTH` for identical patterns.
#[inline]
pub fn common_prefix_len<K: KeyBits>(data1: K, mask1: K, data2: K, mask2: K) -> u32 {
    let diff = (data1 ^ data2) | (mask1 ^ mask2);
    diff.leading_zero_bits().min(K::WIDTH)
}

/// First bit index carrying a one under a zero mask bit, if any.
#[inline]
pub fn wildcard_violation<K: KeyBits>(data: K, mask: K) -> Option<u32> {
    let bad = data & !mask;
    if bad == K::ZERO {
        None
    } else {
        Some(bad.leading_zero_bits())
    }
}

/// True when every bit of `key` inside `[from, to)` agrees with `data`
/// wherever `mask` is set.
#[inline]
pub fn key_matches_span<K: KeyBits>(key: K, data: K, mask: K, from: u32, to: u32) -> bool {
    (key ^ data) & mask & K::span(from, to) == K::ZERO
}

/// True when two patterns agree bit for bit (data and mask) inside `[from, to)`.
#[inline]
pub fn pattern_matches_span<K: KeyBits>(data1: K, mask1: K, data2: K, mask2: K, from: u32, to: u32) -> bool {
    ((data1 ^ data2) | (mask1 ^ mask2)) & K::span(from, to) == K::ZERO
}

/// Ternary rendering: `0`/`1` for cared bits, `*` for wildcards.
pub fn to_ternary_string<K: KeyBits>(data: K, mask: K) -> String {
    (0..K::WIDTH)
        .map(|i| match (mask.bit(i), data.bit(i)) {
            (false, _) => '*',
            (true, false) => '0',
            (true, true) => '1',
        })
        .collect()
}
