// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The layout of the calibration data in EEPROM.
//!
//! Every coefficient is a bit field within one 16-bit word. Each field here records which word,
//! which bits, whether the bits are a two's complement number (and how wide it is), and a fixed
//! scale. Scales that depend on *other* fields (the per-pixel scale nibbles) are applied by the
//! caller after unpacking the scale field itself.
//!
//! Word indices are relative to the start of the EEPROM (0x2400).

use crate::util::sign_extend;

/// The location and encoding of a single calibration value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldDef {
    /// Word index into the EEPROM dump.
    pub word: usize,

    /// The bits (before shifting) that make up this field.
    pub mask: u16,

    /// How far to shift the masked bits to the right.
    pub shift: u8,

    /// The width of the field if it is signed, `None` if it's unsigned.
    pub signed_bits: Option<u8>,

    /// Multiplier applied after sign extension.
    pub scale: f64,
}

impl FieldDef {
    const fn unsigned(word: usize, mask: u16, shift: u8) -> Self {
        Self {
            word,
            mask,
            shift,
            signed_bits: None,
            scale: 1.0,
        }
    }

    const fn signed(word: usize, mask: u16, shift: u8, bits: u8) -> Self {
        Self {
            word,
            mask,
            shift,
            signed_bits: Some(bits),
            scale: 1.0,
        }
    }

    const fn scaled(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    /// Extract the (sign extended) integer value of this field.
    pub fn raw(&self, eeprom: &[u16]) -> i32 {
        let bits = (eeprom[self.word] & self.mask) >> self.shift;
        match self.signed_bits {
            Some(width) => i32::from(sign_extend(bits, width)),
            None => i32::from(bits),
        }
    }

    /// Extract this field and apply its scale.
    pub fn unpack(&self, eeprom: &[u16]) -> f64 {
        f64::from(self.raw(eeprom)) * self.scale
    }
}

/// Set when the dump is from a device this crate doesn't support.
pub const DEVICE_SELECT: FieldDef = FieldDef::unsigned(10, 0x0040, 6);

/// Set when the device was calibrated in interleaved mode rather than chess mode.
pub const CALIBRATION_MODE: FieldDef = FieldDef::unsigned(10, 0x0800, 11);

// Offset scale nibbles, shared word with α PTAT.
pub const OFFSET_REMAINDER_SCALE: FieldDef = FieldDef::unsigned(16, 0x000F, 0);
pub const OFFSET_COLUMN_SCALE: FieldDef = FieldDef::unsigned(16, 0x00F0, 4);
pub const OFFSET_ROW_SCALE: FieldDef = FieldDef::unsigned(16, 0x0F00, 8);

/// α<sub>PTAT</sub> = EE / 4 + 8.
pub const ALPHA_PTAT: FieldDef = FieldDef::unsigned(16, 0xF000, 12).scaled(0.25);

/// Average offset for all pixels (Offset<sub>average</sub>).
pub const OFFSET_AVERAGE: FieldDef = FieldDef::signed(17, 0xFFFF, 0, 16);

/// Words holding the signed offset corrections for each group of four rows.
pub const OFFSET_ROW_WORDS: core::ops::Range<usize> = 18..24;

/// Words holding the signed offset corrections for each group of four columns.
pub const OFFSET_COLUMN_WORDS: core::ops::Range<usize> = 24..32;

// Sensitivity scale nibbles.
pub const ALPHA_REMAINDER_SCALE: FieldDef = FieldDef::unsigned(32, 0x000F, 0);
pub const ALPHA_COLUMN_SCALE: FieldDef = FieldDef::unsigned(32, 0x00F0, 4);
pub const ALPHA_ROW_SCALE: FieldDef = FieldDef::unsigned(32, 0x0F00, 8);
pub const ALPHA_SCALE: FieldDef = FieldDef::unsigned(32, 0xF000, 12);

/// Average sensitivity for all pixels (α<sub>reference</sub>), unsigned.
pub const ALPHA_REFERENCE: FieldDef = FieldDef::unsigned(33, 0xFFFF, 0);

pub const ALPHA_ROW_WORDS: core::ops::Range<usize> = 34..40;

pub const ALPHA_COLUMN_WORDS: core::ops::Range<usize> = 40..48;

pub const GAIN: FieldDef = FieldDef::signed(48, 0xFFFF, 0, 16);

/// V<sub>PTAT<sub>25</sub></sub>, treated as unsigned.
pub const V_PTAT_25: FieldDef = FieldDef::unsigned(49, 0xFFFF, 0);

/// K<sub>V<sub>PTAT</sub></sub> = EE / 2<sup>12</sup>.
pub const K_V_PTAT: FieldDef = FieldDef::signed(50, 0xFC00, 10, 6).scaled(1.0 / 4096.0);

/// K<sub>T<sub>PTAT</sub></sub> = EE / 2<sup>3</sup>.
pub const K_T_PTAT: FieldDef = FieldDef::signed(50, 0x03FF, 0, 10).scaled(1.0 / 8.0);

/// K<sub>V<sub>DD</sub></sub> = EE × 2<sup>5</sup>.
pub const K_V_DD: FieldDef = FieldDef::signed(51, 0xFF00, 8, 8).scaled(32.0);

/// The raw V<sub>DD<sub>25</sub></sub> byte.
///
/// The value used is (EE - 256) × 2<sup>5</sup> - 2<sup>13</sup>.
pub const V_DD_25: FieldDef = FieldDef::unsigned(51, 0x00FF, 0);

/// Per-quadrant K<sub>V</sub> nibbles. The index is the row/column parity combination, see
/// [`pixel_quadrant`].
pub const K_V_QUADRANTS: [FieldDef; 4] = [
    FieldDef::signed(52, 0xF000, 12, 4),
    FieldDef::signed(52, 0x00F0, 4, 4),
    FieldDef::signed(52, 0x0F00, 8, 4),
    FieldDef::signed(52, 0x000F, 0, 4),
];

/// Interleaved/chess mode correction coefficients, each already divided down.
pub const IL_CHESS: [FieldDef; 3] = [
    FieldDef::signed(53, 0x003F, 0, 6).scaled(1.0 / 16.0),
    FieldDef::signed(53, 0x07C0, 6, 5).scaled(1.0 / 2.0),
    FieldDef::signed(53, 0xF800, 11, 5).scaled(1.0 / 8.0),
];

/// Per-quadrant K<sub>T<sub>a</sub></sub> averages. Same indexing as [`K_V_QUADRANTS`].
pub const K_TA_QUADRANTS: [FieldDef; 4] = [
    FieldDef::signed(54, 0xFF00, 8, 8),
    FieldDef::signed(55, 0xFF00, 8, 8),
    FieldDef::signed(54, 0x00FF, 0, 8),
    FieldDef::signed(55, 0x00FF, 0, 8),
];

pub const K_TA_SCALE_2: FieldDef = FieldDef::unsigned(56, 0x000F, 0);

/// K<sub>T<sub>a</sub></sub> scale 1, stored with an offset of 8 removed.
pub const K_TA_SCALE_1: FieldDef = FieldDef::unsigned(56, 0x00F0, 4);

pub const K_V_SCALE: FieldDef = FieldDef::unsigned(56, 0x0F00, 8);

/// The ADC resolution the device was calibrated at.
pub const RESOLUTION: FieldDef = FieldDef::unsigned(56, 0x3000, 12);

pub const ALPHA_CP_0: FieldDef = FieldDef::signed(57, 0x03FF, 0, 10);

/// Ratio between the compensation pixel sensitivities, α<sub>CP</sub>(1) = α<sub>CP</sub>(0) ×
/// (1 + EE / 2<sup>7</sup>).
pub const ALPHA_CP_RATIO: FieldDef = FieldDef::signed(57, 0xFC00, 10, 6).scaled(1.0 / 128.0);

pub const OFFSET_CP_0: FieldDef = FieldDef::signed(58, 0x03FF, 0, 10);

/// Difference between the compensation pixel offsets.
pub const OFFSET_CP_DELTA: FieldDef = FieldDef::signed(58, 0xFC00, 10, 6);

pub const K_TA_CP: FieldDef = FieldDef::signed(59, 0x00FF, 0, 8);

pub const K_V_CP: FieldDef = FieldDef::signed(59, 0xFF00, 8, 8);

/// Temperature gradient coefficient = EE / 2<sup>5</sup>.
pub const TGC: FieldDef = FieldDef::signed(60, 0x00FF, 0, 8).scaled(1.0 / 32.0);

/// K<sub>S<sub>T<sub>a</sub></sub></sub> = EE / 2<sup>13</sup>.
pub const K_S_TA: FieldDef = FieldDef::signed(60, 0xFF00, 8, 8).scaled(1.0 / 8192.0);

/// Unscaled K<sub>S<sub>T<sub>o</sub></sub></sub> for each of the four temperature ranges.
pub const K_S_TO: [FieldDef; 4] = [
    FieldDef::signed(61, 0x00FF, 0, 8),
    FieldDef::signed(61, 0xFF00, 8, 8),
    FieldDef::signed(62, 0x00FF, 0, 8),
    FieldDef::signed(62, 0xFF00, 8, 8),
];

/// K<sub>S<sub>T<sub>o</sub></sub></sub> scale, stored with an offset of 8 removed.
pub const K_S_TO_SCALE: FieldDef = FieldDef::unsigned(63, 0x000F, 0);

/// Corner temperature 3, in steps.
pub const CT_3_STEPS: FieldDef = FieldDef::unsigned(63, 0x00F0, 4);

/// Corner temperature 4, in steps above corner temperature 3.
pub const CT_4_STEPS: FieldDef = FieldDef::unsigned(63, 0x0F00, 8);

/// The corner temperature step size, in tens of degrees.
pub const CT_STEP: FieldDef = FieldDef::unsigned(63, 0x3000, 12).scaled(10.0);

/// Per-pixel words start here, one per pixel.
pub const PIXEL_WORD_OFFSET: usize = 64;

// Fields within each pixel's word.
pub const PIXEL_OUTLIER: FieldDef = FieldDef::unsigned(0, 0x0001, 0);
pub const PIXEL_K_TA: FieldDef = FieldDef::signed(0, 0x000E, 1, 3);
pub const PIXEL_ALPHA: FieldDef = FieldDef::signed(0, 0x03F0, 4, 6);
pub const PIXEL_OFFSET: FieldDef = FieldDef::signed(0, 0xFC00, 10, 6);

impl FieldDef {
    /// Point a per-pixel field at the given pixel's word.
    pub const fn for_pixel(self, pixel: usize) -> Self {
        Self {
            word: PIXEL_WORD_OFFSET + pixel + self.word,
            ..self
        }
    }
}

/// The K<sub>V</sub>/K<sub>T<sub>a</sub></sub> quadrant a pixel falls in.
///
/// The quadrant is determined by the parity of the pixel's row and column, with rows counted in
/// the doubled form the datasheet uses (2 × row parity + column parity).
pub fn pixel_quadrant(pixel: usize) -> usize {
    2 * (pixel / 32 - (pixel / 64) * 2) + pixel % 2
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;

    use mlx90640_relay_test_data::mlx90640_datasheet_eeprom;

    use super::*;

    #[test]
    fn datasheet_scalars() {
        let eeprom = mlx90640_datasheet_eeprom();
        assert_eq!(K_V_DD.unpack(&eeprom), -3168.0);
        assert_eq!(K_V_PTAT.unpack(&eeprom), 22.0 / 4096.0);
        assert_eq!(K_T_PTAT.unpack(&eeprom), 42.25);
        assert_eq!(V_PTAT_25.raw(&eeprom), 12273);
        assert_eq!(ALPHA_PTAT.unpack(&eeprom) + 8.0, 9.0);
        assert_eq!(GAIN.raw(&eeprom), 6383);
        assert_eq!(TGC.unpack(&eeprom), 1.0);
        assert_eq!(K_S_TA.unpack(&eeprom), -0.001953125);
        assert_eq!(RESOLUTION.raw(&eeprom), 2);
        assert_eq!(OFFSET_AVERAGE.raw(&eeprom), -69);
    }

    #[test]
    fn datasheet_il_chess() {
        let eeprom = mlx90640_datasheet_eeprom();
        assert_approx_eq!(f64, IL_CHESS[0].unpack(&eeprom), 1.25);
        assert_approx_eq!(f64, IL_CHESS[1].unpack(&eeprom), 3.0);
        assert_approx_eq!(f64, IL_CHESS[2].unpack(&eeprom), 0.125);
    }

    #[test]
    fn pixel_fields() {
        let eeprom = mlx90640_datasheet_eeprom();
        // 0x08a0 for every pixel
        assert_eq!(PIXEL_OFFSET.for_pixel(367).raw(&eeprom), 2);
        assert_eq!(PIXEL_ALPHA.for_pixel(367).raw(&eeprom), 10);
        assert_eq!(PIXEL_K_TA.for_pixel(367).raw(&eeprom), 0);
        assert_eq!(PIXEL_OUTLIER.for_pixel(0).raw(&eeprom), 0);
    }

    #[test]
    fn quadrants() {
        assert_eq!(pixel_quadrant(0), 0);
        assert_eq!(pixel_quadrant(1), 1);
        assert_eq!(pixel_quadrant(32), 2);
        assert_eq!(pixel_quadrant(33), 3);
        assert_eq!(pixel_quadrant(64), 0);
        // Row 11, column 15
        assert_eq!(pixel_quadrant(367), 3);
    }
}
