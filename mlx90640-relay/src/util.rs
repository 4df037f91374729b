// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}

/// Interpret the lowest `num_bits` bits of `value` as a two's complement integer.
///
/// Any bits above `num_bits` are ignored. A width of 16 reinterprets the whole word.
pub(crate) fn sign_extend(value: u16, num_bits: u8) -> i16 {
    let shift_amount = 16 - u32::from(num_bits);
    ((value << shift_amount) as i16) >> shift_amount
}

/// Iterate over the 4-bit fields in a sequence of words, least significant nibble first.
pub(crate) fn signed_nibbles(words: &[u16]) -> impl Iterator<Item = i16> + '_ {
    words
        .iter()
        .flat_map(|word| (0..4).map(move |n| sign_extend(word >> (4 * n), 4)))
}

/// 2<sup>exponent</sup>, for the many power-of-two scale factors in the calibration data.
pub(crate) fn exp2i(exponent: i32) -> f64 {
    num_traits::Float::powi(2.0f64, exponent)
}

/// The fourth root, computed as two square roots.
pub(crate) fn fourth_root(value: f64) -> f64 {
    num_traits::Float::sqrt(num_traits::Float::sqrt(value))
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec::Vec;

    #[test]
    fn is_bit_set() {
        for n in 0..16 {
            let value: u16 = 1 << n;
            assert!(
                super::is_bit_set(value, n),
                "is_bit_set was incorrect for bit {}",
                n
            );
        }
    }

    #[test]
    fn sign_extend() {
        assert_eq!(super::sign_extend(0x00ff, 8), -1);
        assert_eq!(super::sign_extend(0x03ff, 10), -1);
        assert_eq!(super::sign_extend(0x007f, 8), 127);
        // Now check that upper bits get ignored properly
        assert_eq!(super::sign_extend(0xf0ff, 8), -1);
        assert_eq!(super::sign_extend(0xf3ff, 10), -1);
        assert_eq!(super::sign_extend(0xffbb, 16), -69);
        assert_eq!(super::sign_extend(0x0020, 6), -32);
    }

    #[test]
    fn signed_nibbles() {
        let nibbles: Vec<i16> = super::signed_nibbles(&[0xf202, 0x0081]).collect();
        assert_eq!(nibbles, [2, 0, 2, -1, 1, -8, 0, 0]);
    }

    #[test]
    fn exp2i() {
        assert_eq!(super::exp2i(0), 1.0);
        assert_eq!(super::exp2i(-3), 0.125);
        assert_eq!(super::exp2i(35), 34359738368.0);
    }

    #[test]
    fn fourth_root() {
        assert_eq!(super::fourth_root(16.0), 2.0);
        assert_eq!(super::fourth_root(0.0), 0.0);
    }
}
