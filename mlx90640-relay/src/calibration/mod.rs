// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Factory calibration data.
//!
//! Every MLX90640 is individually calibrated at the factory, and the results are stored in the
//! camera's EEPROM. [`CalibrationSet::from_eeprom`] turns a full dump of that EEPROM into the
//! coefficients used when converting raw readings into temperatures. Decoding also validates the
//! list of pixels the factory has marked as broken or as outliers.
use arrayvec::ArrayVec;
use bitvec::array::BitArray;
use bitvec::slice::BitSlice;
use log::{debug, warn};

use crate::common::{FRAME_WORDS, HEIGHT, NUM_PIXELS, WIDTH};
use crate::error::LibraryError;
use crate::register::{AccessPattern, Resolution};
use crate::util::{exp2i, is_bit_set, signed_nibbles};

pub mod field;

use field::pixel_quadrant;

/// The most broken and outlier pixels (combined) a camera may have.
pub const MAX_FLAGGED_PIXELS: usize = 4;

/// Scanning stops as soon as one more than the allowed number of a kind of pixel is found.
const FLAG_CAPACITY: usize = MAX_FLAGGED_PIXELS + 1;

type FlagArray = BitArray<[usize; NUM_PIXELS / usize::BITS as usize]>;

/// The list of broken or outlier pixels in a calibration set.
pub type FlaggedPixels = ArrayVec<u16, FLAG_CAPACITY>;

/// The numeric calibration coefficients.
///
/// This is plain data; the fields are named after the values in the datasheet. Values that are
/// integers on the camera (like the offsets) are still stored as `f64` as they are only ever used
/// in floating point calculations.
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficients {
    pub k_v_dd: f64,

    pub v_dd_25: f64,

    pub k_v_ptat: f64,

    pub k_t_ptat: f64,

    pub v_ptat_25: f64,

    pub alpha_ptat: f64,

    /// The gain from EEPROM (Gain<sub>EE</sub>), later divided by the measured gain.
    pub gain: f64,

    /// Temperature gradient coefficient.
    pub tgc: f64,

    pub k_s_ta: f64,

    /// The ADC resolution the camera was calibrated at.
    pub resolution: Resolution,

    /// The access pattern the camera was calibrated in.
    pub calibration_mode: AccessPattern,

    pub k_s_to: [f64; 4],

    /// The boundaries of the temperature ranges that `k_s_to` applies to, in ℃.
    pub corner_temperatures: [f64; 4],

    pub alpha: [f64; NUM_PIXELS],

    pub offset: [f64; NUM_PIXELS],

    pub k_ta: [f64; NUM_PIXELS],

    pub k_v: [f64; NUM_PIXELS],

    pub alpha_cp: [f64; 2],

    pub offset_cp: [f64; 2],

    pub k_ta_cp: f64,

    pub k_v_cp: f64,

    /// Corrections applied when the camera is running in a different mode than it was
    /// calibrated in.
    pub il_chess: [f64; 3],
}

/// A validated set of calibration data for one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSet {
    coefficients: Coefficients,

    broken_pixels: FlaggedPixels,

    outlier_pixels: FlaggedPixels,

    flagged: FlagArray,
}

impl CalibrationSet {
    /// Decode and validate a full EEPROM dump (832 words, starting at 0x2400).
    pub fn from_eeprom(eeprom: &[u16]) -> Result<Self, LibraryError> {
        if eeprom.len() != FRAME_WORDS {
            return Err(LibraryError::InvalidData(
                "EEPROM dumps must be exactly 832 words long",
            ));
        }
        if field::DEVICE_SELECT.raw(eeprom) != 0 {
            return Err(LibraryError::InvalidDevice);
        }
        let coefficients = decode_coefficients(eeprom)?;
        let pixel_words =
            &eeprom[field::PIXEL_WORD_OFFSET..(field::PIXEL_WORD_OFFSET + NUM_PIXELS)];
        let (broken_pixels, outlier_pixels) = scan_pixel_words(pixel_words);
        let calibration = Self::from_parts(coefficients, &broken_pixels, &outlier_pixels)?;
        debug!(
            "Decoded calibration data (resolution: {:?}, mode: {:?}, {} flagged pixels)",
            calibration.coefficients.resolution,
            calibration.coefficients.calibration_mode,
            broken_pixels.len() + outlier_pixels.len()
        );
        Ok(calibration)
    }

    /// Assemble a calibration set from previously decoded coefficients.
    ///
    /// The broken and outlier pixel lists are validated the same way as when decoding from EEPROM.
    pub fn from_parts(
        coefficients: Coefficients,
        broken_pixels: &[u16],
        outlier_pixels: &[u16],
    ) -> Result<Self, LibraryError> {
        validate_flagged_pixels(broken_pixels, outlier_pixels)?;
        let mut flagged = FlagArray::default();
        for pixel in broken_pixels.iter() {
            warn!("Pixel {} is marked as broken", pixel);
            flagged.set(usize::from(*pixel), true);
        }
        for pixel in outlier_pixels.iter() {
            warn!("Pixel {} is marked as an outlier", pixel);
            flagged.set(usize::from(*pixel), true);
        }
        Ok(Self {
            coefficients,
            // Validation has already capped the lengths
            broken_pixels: broken_pixels.iter().copied().collect(),
            outlier_pixels: outlier_pixels.iter().copied().collect(),
            flagged,
        })
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Pixels the factory marked as broken.
    pub fn broken_pixels(&self) -> &[u16] {
        &self.broken_pixels
    }

    /// Pixels the factory marked as outliers.
    pub fn outlier_pixels(&self) -> &[u16] {
        &self.outlier_pixels
    }

    /// A bit per pixel, set when the pixel is either broken or an outlier.
    ///
    /// This is informational only, conversion treats flagged pixels like any other.
    pub fn flagged_pixels(&self) -> &BitSlice<usize> {
        &self.flagged[..NUM_PIXELS]
    }

    /// The factor raw readings are scaled by when the camera is running at a different ADC
    /// resolution than it was calibrated at.
    pub fn resolution_correction(&self, current: Resolution) -> f64 {
        let calibrated = i32::from(self.coefficients.resolution.as_raw());
        exp2i(calibrated - i32::from(current.as_raw()))
    }

    /// Sensitivity correction for each of the four temperature ranges.
    pub fn alpha_correction(&self) -> [f64; 4] {
        let k_s_to = &self.coefficients.k_s_to;
        let ct = &self.coefficients.corner_temperatures;
        let range_0 = 1.0 / (1.0 + k_s_to[0] * (ct[1] - ct[0]));
        let range_2 = 1.0 + k_s_to[2] * (ct[2] - ct[1]);
        let range_3 = range_2 * (1.0 + k_s_to[3] * (ct[3] - ct[2]));
        [range_0, 1.0, range_2, range_3]
    }
}

/// Expand a row or column correction table, shifting each value by the given scale.
fn scaled_nibbles<const N: usize>(words: &[u16], scale: i32) -> [i32; N] {
    let mut values = [0i32; N];
    values
        .iter_mut()
        .zip(signed_nibbles(words))
        .for_each(|(value, nibble)| *value = i32::from(nibble) << scale);
    values
}

fn decode_coefficients(eeprom: &[u16]) -> Result<Coefficients, LibraryError> {
    let resolution_raw = field::RESOLUTION.raw(eeprom) as u16;
    let calibration_mode = if field::CALIBRATION_MODE.raw(eeprom) == 0 {
        AccessPattern::Chess
    } else {
        AccessPattern::Interleave
    };

    let k_s_to_scale = exp2i(field::K_S_TO_SCALE.raw(eeprom) + 8);
    let k_s_to = field::K_S_TO.map(|k| f64::from(k.raw(eeprom)) / k_s_to_scale);
    let step = field::CT_STEP.unpack(eeprom);
    let ct_2 = f64::from(field::CT_3_STEPS.raw(eeprom)) * step;
    let ct_3 = f64::from(field::CT_4_STEPS.raw(eeprom)) * step + ct_2;

    // Sensitivity
    let alpha_scale = exp2i(field::ALPHA_SCALE.raw(eeprom) + 30);
    let alpha_reference = field::ALPHA_REFERENCE.raw(eeprom);
    let alpha_remainder_scale = field::ALPHA_REMAINDER_SCALE.raw(eeprom);
    let alpha_rows: [i32; HEIGHT] = scaled_nibbles(
        &eeprom[field::ALPHA_ROW_WORDS],
        field::ALPHA_ROW_SCALE.raw(eeprom),
    );
    let alpha_columns: [i32; WIDTH] = scaled_nibbles(
        &eeprom[field::ALPHA_COLUMN_WORDS],
        field::ALPHA_COLUMN_SCALE.raw(eeprom),
    );

    // Offset
    let offset_average = field::OFFSET_AVERAGE.raw(eeprom);
    let offset_remainder_scale = field::OFFSET_REMAINDER_SCALE.raw(eeprom);
    let offset_rows: [i32; HEIGHT] = scaled_nibbles(
        &eeprom[field::OFFSET_ROW_WORDS],
        field::OFFSET_ROW_SCALE.raw(eeprom),
    );
    let offset_columns: [i32; WIDTH] = scaled_nibbles(
        &eeprom[field::OFFSET_COLUMN_WORDS],
        field::OFFSET_COLUMN_SCALE.raw(eeprom),
    );

    // K_Ta and K_V are split up by quadrant, then (for K_Ta) adjusted per pixel.
    let k_ta_scale_1 = exp2i(field::K_TA_SCALE_1.raw(eeprom) + 8);
    let k_ta_scale_2 = field::K_TA_SCALE_2.raw(eeprom);
    let k_ta_quadrants = field::K_TA_QUADRANTS.map(|k| k.raw(eeprom));
    let k_v_scale = exp2i(field::K_V_SCALE.raw(eeprom));
    let k_v_quadrants = field::K_V_QUADRANTS.map(|k| f64::from(k.raw(eeprom)) / k_v_scale);

    let mut alpha = [0f64; NUM_PIXELS];
    let mut offset = [0f64; NUM_PIXELS];
    let mut k_ta = [0f64; NUM_PIXELS];
    let mut k_v = [0f64; NUM_PIXELS];
    for pixel in 0..NUM_PIXELS {
        let (row, column) = (pixel / WIDTH, pixel % WIDTH);
        let quadrant = pixel_quadrant(pixel);
        let alpha_remainder =
            field::PIXEL_ALPHA.for_pixel(pixel).raw(eeprom) << alpha_remainder_scale;
        alpha[pixel] = f64::from(
            alpha_reference + alpha_rows[row] + alpha_columns[column] + alpha_remainder,
        ) / alpha_scale;
        let offset_remainder =
            field::PIXEL_OFFSET.for_pixel(pixel).raw(eeprom) << offset_remainder_scale;
        offset[pixel] = f64::from(
            offset_average + offset_rows[row] + offset_columns[column] + offset_remainder,
        );
        let k_ta_remainder = field::PIXEL_K_TA.for_pixel(pixel).raw(eeprom) << k_ta_scale_2;
        k_ta[pixel] = f64::from(k_ta_quadrants[quadrant] + k_ta_remainder) / k_ta_scale_1;
        k_v[pixel] = k_v_quadrants[quadrant];
    }

    // Compensation pixels. Their sensitivity scale is 3 less than the other pixels.
    let alpha_cp_scale = exp2i(field::ALPHA_SCALE.raw(eeprom) + 27);
    let alpha_cp_0 = f64::from(field::ALPHA_CP_0.raw(eeprom)) / alpha_cp_scale;
    let alpha_cp_1 = (1.0 + field::ALPHA_CP_RATIO.unpack(eeprom)) * alpha_cp_0;
    let offset_cp_0 = field::OFFSET_CP_0.raw(eeprom);
    let offset_cp_1 = offset_cp_0 + field::OFFSET_CP_DELTA.raw(eeprom);

    Ok(Coefficients {
        k_v_dd: field::K_V_DD.unpack(eeprom),
        v_dd_25: f64::from(((field::V_DD_25.raw(eeprom) - 256) << 5) - 8192),
        k_v_ptat: field::K_V_PTAT.unpack(eeprom),
        k_t_ptat: field::K_T_PTAT.unpack(eeprom),
        v_ptat_25: field::V_PTAT_25.unpack(eeprom),
        alpha_ptat: field::ALPHA_PTAT.unpack(eeprom) + 8.0,
        gain: field::GAIN.unpack(eeprom),
        tgc: field::TGC.unpack(eeprom),
        k_s_ta: field::K_S_TA.unpack(eeprom),
        resolution: Resolution::from_raw(resolution_raw)?,
        calibration_mode,
        k_s_to,
        corner_temperatures: [-40.0, 0.0, ct_2, ct_3],
        alpha,
        offset,
        k_ta,
        k_v,
        alpha_cp: [alpha_cp_0, alpha_cp_1],
        offset_cp: [f64::from(offset_cp_0), f64::from(offset_cp_1)],
        k_ta_cp: f64::from(field::K_TA_CP.raw(eeprom)) / k_ta_scale_1,
        k_v_cp: f64::from(field::K_V_CP.raw(eeprom)) / k_v_scale,
        il_chess: field::IL_CHESS.map(|il| il.unpack(eeprom)),
    })
}

/// Collect the broken (all zero) and outlier (lowest bit set) pixels.
///
/// Scanning stops once either list is full, as at that point the data is already invalid.
fn scan_pixel_words(pixel_words: &[u16]) -> (FlaggedPixels, FlaggedPixels) {
    let mut broken = FlaggedPixels::new();
    let mut outliers = FlaggedPixels::new();
    for (pixel, word) in pixel_words.iter().copied().enumerate() {
        if broken.is_full() || outliers.is_full() {
            break;
        }
        if word == 0 {
            broken.push(pixel as u16);
        } else if is_bit_set(word, 0) {
            outliers.push(pixel as u16);
        }
    }
    (broken, outliers)
}

/// Whether two pixels are the same pixel or touching (including diagonally).
///
/// The comparison is on the linear index only, so the last pixel of a row counts as adjacent to
/// the first pixel of the next row.
fn are_adjacent(first: u16, second: u16) -> bool {
    let difference = i32::from(first) - i32::from(second);
    matches!(difference.abs(), 0 | 1 | 31 | 32 | 33)
}

fn check_adjacent_pairs<'a, I>(pairs: I) -> Result<(), LibraryError>
where
    I: Iterator<Item = (&'a u16, &'a u16)>,
{
    for (first, second) in pairs {
        if are_adjacent(*first, *second) {
            return Err(LibraryError::AdjacentFlaggedPixels(*first, *second));
        }
    }
    Ok(())
}

/// Every pair of distinct entries in `pixels`.
fn unique_pairs(pixels: &[u16]) -> impl Iterator<Item = (&u16, &u16)> {
    pixels.iter().enumerate().flat_map(move |(n, first)| {
        pixels[(n + 1)..]
            .iter()
            .map(move |second| (first, second))
    })
}

fn validate_flagged_pixels(broken: &[u16], outliers: &[u16]) -> Result<(), LibraryError> {
    if broken.len() > MAX_FLAGGED_PIXELS {
        return Err(LibraryError::TooManyBrokenPixels(broken.len()));
    }
    if outliers.len() > MAX_FLAGGED_PIXELS {
        return Err(LibraryError::TooManyOutlierPixels(outliers.len()));
    }
    if broken.len() + outliers.len() > MAX_FLAGGED_PIXELS {
        return Err(LibraryError::TooManyFlaggedPixels(
            broken.len() + outliers.len(),
        ));
    }
    if broken
        .iter()
        .chain(outliers.iter())
        .any(|pixel| usize::from(*pixel) >= NUM_PIXELS)
    {
        return Err(LibraryError::InvalidData("Flagged pixel index out of range"));
    }
    check_adjacent_pairs(unique_pairs(broken))?;
    check_adjacent_pairs(unique_pairs(outliers))?;
    check_adjacent_pairs(
        broken
            .iter()
            .flat_map(|first| outliers.iter().map(move |second| (first, second))),
    )
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec::Vec;

    use float_cmp::{approx_eq, assert_approx_eq};

    use mlx90640_relay_test_data::{
        mlx90640_datasheet_eeprom, with_device_select_bit, with_pixel_words,
    };

    use crate::error::LibraryError;
    use crate::register::{AccessPattern, Resolution};

    use super::CalibrationSet;

    const OUTLIER_WORD: u16 = 0x08a1;

    fn datasheet_calibration() -> CalibrationSet {
        CalibrationSet::from_eeprom(&mlx90640_datasheet_eeprom())
            .expect("The datasheet EEPROM should be valid")
    }

    #[test]
    fn datasheet_scalars() {
        let calibration = datasheet_calibration();
        let coefficients = calibration.coefficients();
        assert_eq!(coefficients.k_v_dd, -3168.0);
        assert_eq!(coefficients.v_dd_25, -13056.0);
        assert_eq!(coefficients.k_v_ptat, 0.00537109375);
        assert_eq!(coefficients.k_t_ptat, 42.25);
        assert_eq!(coefficients.v_ptat_25, 12273.0);
        assert_eq!(coefficients.alpha_ptat, 9.0);
        assert_eq!(coefficients.gain, 6383.0);
        assert_eq!(coefficients.tgc, 1.0);
        assert_eq!(coefficients.k_s_ta, -0.001953125);
        assert_eq!(coefficients.resolution, Resolution::Eighteen);
        assert_eq!(coefficients.calibration_mode, AccessPattern::Chess);
        assert_eq!(coefficients.corner_temperatures, [-40.0, 0.0, 160.0, 320.0]);
        for k_s_to in coefficients.k_s_to {
            assert_eq!(k_s_to, -0.00080108642578125);
        }
        assert_eq!(coefficients.il_chess, [1.25, 3.0, 0.125]);
    }

    #[test]
    fn datasheet_pixels() {
        let calibration = datasheet_calibration();
        let coefficients = calibration.coefficients();
        assert_eq!(coefficients.alpha.len(), 768);
        assert_eq!(coefficients.offset[367], -75.0);
        assert_eq!(coefficients.k_ta[367], 0.005126953125);
        assert_eq!(coefficients.k_v[367], 0.5);
        assert_approx_eq!(f64, coefficients.alpha[367], 1.2622331269085407e-07);
        assert_eq!(coefficients.offset[400], -57.0);
        assert_eq!(coefficients.k_ta[400], 0.00640869140625);
        assert_eq!(coefficients.k_v[400], 0.625);
        assert_approx_eq!(f64, coefficients.alpha[400], 1.2622331269085407e-07);
    }

    #[test]
    fn datasheet_compensation_pixels() {
        let calibration = datasheet_calibration();
        let coefficients = calibration.coefficients();
        assert_eq!(coefficients.offset_cp, [-75.0, -77.0]);
        assert_approx_eq!(f64, coefficients.alpha_cp[0], 4.0745362639427185e-09);
        assert_approx_eq!(f64, coefficients.alpha_cp[1], 3.851710062008351e-09);
        assert_eq!(coefficients.k_ta_cp, 0.00457763671875);
        assert_eq!(coefficients.k_v_cp, 0.5);
    }

    #[test]
    fn alpha_correction() {
        let k_s_to = -0.00080108642578125;
        let expected = [
            1.0 / (1.0 + k_s_to * 40.0),
            1.0,
            1.0 + k_s_to * 160.0,
            (1.0 + k_s_to * 160.0) * (1.0 + k_s_to * 160.0),
        ];
        let actual = datasheet_calibration().alpha_correction();
        for (actual, expected) in actual.iter().zip(expected.iter()) {
            assert!(
                approx_eq!(f64, *actual, *expected),
                "{} != {}",
                actual,
                expected
            );
        }
    }

    #[test]
    fn resolution_correction() {
        let calibration = datasheet_calibration();
        assert_eq!(calibration.resolution_correction(Resolution::Eighteen), 1.0);
        assert_eq!(calibration.resolution_correction(Resolution::Sixteen), 4.0);
        assert_eq!(calibration.resolution_correction(Resolution::Nineteen), 0.5);
    }

    #[test]
    fn wrong_length() {
        let eeprom = mlx90640_datasheet_eeprom();
        assert!(matches!(
            CalibrationSet::from_eeprom(&eeprom[..831]),
            Err(LibraryError::InvalidData(_))
        ));
    }

    #[test]
    fn invalid_device() {
        let eeprom = with_device_select_bit(mlx90640_datasheet_eeprom());
        let result = CalibrationSet::from_eeprom(&eeprom);
        assert_eq!(result, Err(LibraryError::InvalidDevice));
        assert_eq!(result.unwrap_err().code(), -7);
    }

    #[test]
    fn no_flagged_pixels() {
        let calibration = datasheet_calibration();
        assert!(calibration.broken_pixels().is_empty());
        assert!(calibration.outlier_pixels().is_empty());
        assert!(calibration.flagged_pixels().not_any());
    }

    #[test]
    fn separated_broken_pixels() {
        let pixels = [100, 200, 300, 500];
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &pixels, 0);
        let calibration =
            CalibrationSet::from_eeprom(&eeprom).expect("Four broken pixels are allowed");
        assert_eq!(calibration.broken_pixels(), [100, 200, 300, 500]);
        assert_eq!(calibration.flagged_pixels().count_ones(), 4);
        assert!(calibration.flagged_pixels()[300]);
        assert!(!calibration.flagged_pixels()[301]);
    }

    #[test]
    fn broken_and_outlier_pixels() {
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[10, 700], 0);
        let eeprom = with_pixel_words(eeprom, &[400], OUTLIER_WORD);
        let calibration = CalibrationSet::from_eeprom(&eeprom).unwrap();
        assert_eq!(calibration.broken_pixels(), [10, 700]);
        assert_eq!(calibration.outlier_pixels(), [400]);
        let flagged: Vec<usize> = calibration.flagged_pixels().iter_ones().collect();
        assert_eq!(flagged, [10, 400, 700]);
    }

    #[test]
    fn too_many_broken_pixels() {
        let eeprom = with_pixel_words(
            mlx90640_datasheet_eeprom(),
            &[0, 100, 200, 300, 400, 500],
            0,
        );
        let result = CalibrationSet::from_eeprom(&eeprom);
        // Scanning stops at the fifth pixel
        assert_eq!(result, Err(LibraryError::TooManyBrokenPixels(5)));
        assert_eq!(result.unwrap_err().code(), -3);
    }

    #[test]
    fn too_many_outlier_pixels() {
        let eeprom = with_pixel_words(
            mlx90640_datasheet_eeprom(),
            &[0, 100, 200, 300, 400],
            OUTLIER_WORD,
        );
        let result = CalibrationSet::from_eeprom(&eeprom);
        assert_eq!(result, Err(LibraryError::TooManyOutlierPixels(5)));
        assert_eq!(result.unwrap_err().code(), -4);
    }

    #[test]
    fn too_many_flagged_pixels() {
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[0, 100, 200], 0);
        let eeprom = with_pixel_words(eeprom, &[300, 400], OUTLIER_WORD);
        let result = CalibrationSet::from_eeprom(&eeprom);
        assert_eq!(result, Err(LibraryError::TooManyFlaggedPixels(5)));
        assert_eq!(result.unwrap_err().code(), -5);
    }

    #[test]
    fn adjacent_broken_pixels() {
        for offset in [1, 31, 32, 33] {
            let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[100, 100 + offset], 0);
            let result = CalibrationSet::from_eeprom(&eeprom);
            assert_eq!(
                result,
                Err(LibraryError::AdjacentFlaggedPixels(100, 100 + offset as u16)),
                "Pixels {} apart should be adjacent",
                offset
            );
            assert_eq!(result.unwrap_err().code(), -6);
        }
        // Two apart is fine
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[100, 102], 0);
        assert!(CalibrationSet::from_eeprom(&eeprom).is_ok());
    }

    #[test]
    fn adjacent_outlier_pixels() {
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[50, 82], OUTLIER_WORD);
        assert_eq!(
            CalibrationSet::from_eeprom(&eeprom),
            Err(LibraryError::AdjacentFlaggedPixels(50, 82))
        );
    }

    #[test]
    fn adjacent_broken_and_outlier_pixels() {
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[133], 0);
        let eeprom = with_pixel_words(eeprom, &[100], OUTLIER_WORD);
        assert_eq!(
            CalibrationSet::from_eeprom(&eeprom),
            Err(LibraryError::AdjacentFlaggedPixels(133, 100))
        );
    }

    #[test]
    fn adjacency_wraps_rows() {
        // The last pixel in a row and the first in the next are not neighbours on the sensor,
        // but they are only 1 apart.
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[31, 32], 0);
        assert_eq!(
            CalibrationSet::from_eeprom(&eeprom),
            Err(LibraryError::AdjacentFlaggedPixels(31, 32))
        );
    }

    #[test]
    fn from_parts() {
        let eeprom = with_pixel_words(mlx90640_datasheet_eeprom(), &[10], 0);
        let decoded = CalibrationSet::from_eeprom(&eeprom).unwrap();
        let rebuilt = CalibrationSet::from_parts(
            decoded.coefficients().clone(),
            decoded.broken_pixels(),
            decoded.outlier_pixels(),
        )
        .unwrap();
        assert_eq!(decoded, rebuilt);
    }

    #[test]
    fn from_parts_validates() {
        let coefficients = datasheet_calibration().coefficients().clone();
        assert_eq!(
            CalibrationSet::from_parts(coefficients.clone(), &[768], &[]),
            Err(LibraryError::InvalidData("Flagged pixel index out of range"))
        );
        assert_eq!(
            CalibrationSet::from_parts(coefficients, &[5], &[5]),
            Err(LibraryError::AdjacentFlaggedPixels(5, 5))
        );
    }
}
