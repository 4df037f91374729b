// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Turning raw readings into temperatures.
//!
//! The process is described in section 11 of the datasheet. Everything here is a pure function of
//! the raw frame, the calibration data and the current register state, so the same inputs will
//! always produce bit-identical output.
use crate::calibration::{CalibrationSet, Coefficients};
use crate::common::{KELVINS_TO_CELSIUS, NUM_PIXELS, T_A_0, V_DD_0, WIDTH};
use crate::frame::RawFrame;
use crate::register::{AccessPattern, ControlRegister, Subpage};
use crate::util::fourth_root;

#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

/// How the reflected temperature (T<sub>r</sub>) is determined.
///
/// The reflected temperature is the temperature of the surroundings as seen reflected in the
/// object being measured. When it isn't measured separately it is usually estimated from the
/// ambient temperature of the sensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReflectedTemperature {
    /// A fixed temperature, in ℃.
    Fixed(f64),

    /// The ambient temperature plus the given offset, in ℃.
    AmbientOffset(f64),
}

impl ReflectedTemperature {
    pub fn resolve(&self, t_a: f64) -> f64 {
        match self {
            Self::Fixed(t_r) => *t_r,
            Self::AmbientOffset(offset) => t_a + offset,
        }
    }
}

impl Default for ReflectedTemperature {
    /// The sensor sits 8 ℃ above its surroundings when running.
    fn default() -> Self {
        Self::AmbientOffset(-8.0)
    }
}

/// The temperatures calculated from one subpage.
#[derive(Clone, Debug, PartialEq)]
pub struct SubpageTemperatures {
    /// The subpage these temperatures were calculated for.
    pub subpage: Subpage,

    /// The pixel supply voltage at the time of measurement.
    pub v_dd: f64,

    /// The ambient temperature of the sensor.
    pub t_a: f64,

    /// Temperatures in ℃, row-major. Pixels outside of the subpage are 0.
    pub values: [f64; NUM_PIXELS],
}

/// Which subpage a pixel is measured in.
pub fn pixel_pattern(pixel: usize, access_pattern: AccessPattern) -> Subpage {
    let interleave = interleave_pattern(pixel);
    let pattern = match access_pattern {
        AccessPattern::Interleave => interleave,
        AccessPattern::Chess => interleave ^ (pixel % 2),
    };
    if pattern == 0 {
        Subpage::Zero
    } else {
        Subpage::One
    }
}

/// The indices of the pixels that are measured in the given subpage.
pub fn pixels_in_subpage(
    subpage: Subpage,
    access_pattern: AccessPattern,
) -> impl Iterator<Item = usize> {
    (0..NUM_PIXELS).filter(move |pixel| pixel_pattern(*pixel, access_pattern) == subpage)
}

/// The row parity of a pixel.
fn interleave_pattern(pixel: usize) -> usize {
    (pixel / WIDTH) % 2
}

/// The sign of the column-pair correction applied when the access pattern is not the one the
/// camera was calibrated in.
fn conversion_pattern(pixel: usize) -> f64 {
    let pixel = pixel as i32;
    let column_pair = (pixel + 2) / 4 - (pixel + 3) / 4 + (pixel + 1) / 4 - pixel / 4;
    let row_sign = 1 - 2 * interleave_pattern(pixel as usize) as i32;
    f64::from(column_pair * row_sign)
}

/// Calculate the pixel supply voltage (V<sub>DD</sub>).
pub fn supply_voltage(
    frame: &RawFrame,
    coefficients: &Coefficients,
    resolution_correction: f64,
) -> f64 {
    let v_dd_pixel = f64::from(frame.v_dd_pixel());
    (resolution_correction * v_dd_pixel - coefficients.v_dd_25) / coefficients.k_v_dd + V_DD_0
}

/// Calculate the ambient temperature (T<sub>a</sub>) of the sensor.
pub fn ambient_temperature(frame: &RawFrame, coefficients: &Coefficients, v_dd: f64) -> f64 {
    let v_ptat = f64::from(frame.t_a_ptat());
    let v_be = f64::from(frame.t_a_v_be());
    let v_ptat_art = v_ptat / (v_ptat * coefficients.alpha_ptat + v_be) * 262144.0;
    let numerator =
        v_ptat_art / (1.0 + coefficients.k_v_ptat * (v_dd - V_DD_0)) - coefficients.v_ptat_25;
    numerator / coefficients.k_t_ptat + T_A_0
}

/// T<sub>a-r</sub>, the radiated power from the surroundings adjusted for emissivity.
fn t_ar(t_a: f64, t_r: f64, emissivity: f64) -> f64 {
    let t_a_k4 = (t_a + KELVINS_TO_CELSIUS).powi(4);
    let t_r_k4 = (t_r + KELVINS_TO_CELSIUS).powi(4);
    t_r_k4 - (t_r_k4 - t_a_k4) / emissivity
}

/// The common factors for converting a pixel.
struct PixelContext<'a> {
    coefficients: &'a Coefficients,
    alpha_correction: [f64; 4],
    t_ar: f64,
}

impl<'a> PixelContext<'a> {
    /// Invert the radiometric relationship, first to find which temperature range the pixel is
    /// in, then again with that range's correction.
    fn temperature(&self, v_ir: f64, alpha: f64) -> f64 {
        let k_s_to = &self.coefficients.k_s_to;
        let ct = &self.coefficients.corner_temperatures;
        let s_x = fourth_root(alpha.powi(3) * (v_ir + alpha * self.t_ar)) * k_s_to[1];
        let estimate = fourth_root(
            v_ir / (alpha * (1.0 - k_s_to[1] * KELVINS_TO_CELSIUS) + s_x) + self.t_ar,
        ) - KELVINS_TO_CELSIUS;
        let range = if estimate < ct[1] {
            0
        } else if estimate < ct[2] {
            1
        } else if estimate < ct[3] {
            2
        } else {
            3
        };
        let range_alpha = alpha
            * self.alpha_correction[range]
            * (1.0 + k_s_to[range] * (estimate - ct[range]));
        fourth_root(v_ir / range_alpha + self.t_ar) - KELVINS_TO_CELSIUS
    }
}

/// Calculate the temperatures for the pixels of one subpage.
///
/// `control` is the control register as it was when the frame was measured; the resolution and
/// access pattern are taken from it. `emissivity` must be in (0, 1].
pub fn convert_subpage(
    frame: &RawFrame,
    calibration: &CalibrationSet,
    control: ControlRegister,
    subpage: Subpage,
    emissivity: f64,
    reflected: ReflectedTemperature,
) -> SubpageTemperatures {
    let coefficients = calibration.coefficients();
    let resolution_correction = calibration.resolution_correction(control.resolution());
    let v_dd = supply_voltage(frame, coefficients, resolution_correction);
    let t_a = ambient_temperature(frame, coefficients, v_dd);
    let delta_t_a = t_a - T_A_0;
    let delta_v = v_dd - V_DD_0;
    let gain = coefficients.gain / f64::from(frame.gain());
    let access_pattern = control.access_pattern();
    let mode_mismatch = access_pattern != coefficients.calibration_mode;
    let subpage_index: usize = subpage.into();

    // Compensation pixels
    let cp_factor =
        (1.0 + coefficients.k_ta_cp * delta_t_a) * (1.0 + coefficients.k_v_cp * delta_v);
    let cp_offsets = if mode_mismatch {
        [
            coefficients.offset_cp[0],
            coefficients.offset_cp[1] + coefficients.il_chess[0],
        ]
    } else {
        coefficients.offset_cp
    };
    let cp_raw = f64::from(frame.compensation_pixel(subpage));
    let compensation = cp_raw * gain - cp_offsets[subpage_index] * cp_factor;
    let tgc_compensation = coefficients.tgc * compensation;
    let alpha_cp = coefficients.tgc * coefficients.alpha_cp[subpage_index];
    let alpha_coefficient = 1.0 + coefficients.k_s_ta * delta_t_a;

    let context = PixelContext {
        coefficients,
        alpha_correction: calibration.alpha_correction(),
        t_ar: t_ar(t_a, reflected.resolve(t_a), emissivity),
    };
    let mut values = [0f64; NUM_PIXELS];
    for pixel in pixels_in_subpage(subpage, access_pattern) {
        let mut v_ir = f64::from(frame.pixel(pixel)) * gain;
        v_ir -= coefficients.offset[pixel]
            * (1.0 + coefficients.k_ta[pixel] * delta_t_a)
            * (1.0 + coefficients.k_v[pixel] * delta_v);
        if mode_mismatch {
            let il_sign = 2.0 * interleave_pattern(pixel) as f64 - 1.0;
            v_ir += coefficients.il_chess[2] * il_sign
                - coefficients.il_chess[1] * conversion_pattern(pixel);
        }
        v_ir /= emissivity;
        v_ir -= tgc_compensation;
        let alpha = (coefficients.alpha[pixel] - alpha_cp) * alpha_coefficient;
        values[pixel] = context.temperature(v_ir, alpha);
    }
    SubpageTemperatures {
        subpage,
        v_dd,
        t_a,
        values,
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;

    use mlx90640_relay_test_data::{datasheet_frame, mlx90640_datasheet_eeprom};

    use crate::calibration::CalibrationSet;
    use crate::frame::RawFrame;
    use crate::register::{AccessPattern, ControlRegister, Subpage};

    use super::*;

    const EPSILON: f64 = 1e-9;

    fn datasheet_inputs() -> (RawFrame, CalibrationSet) {
        let calibration = CalibrationSet::from_eeprom(&mlx90640_datasheet_eeprom()).unwrap();
        (RawFrame::new(datasheet_frame()), calibration)
    }

    fn chess_control() -> ControlRegister {
        ControlRegister::from(0x1901)
    }

    #[test]
    fn pattern_matches_datasheet_arithmetic() {
        for pixel in 0..NUM_PIXELS {
            let il_pattern = pixel / 32 - (pixel / 64) * 2;
            let chess_pattern = il_pattern ^ (pixel % 2);
            assert_eq!(
                usize::from(pixel_pattern(pixel, AccessPattern::Interleave)),
                il_pattern
            );
            assert_eq!(
                usize::from(pixel_pattern(pixel, AccessPattern::Chess)),
                chess_pattern
            );
        }
    }

    #[test]
    fn patterns_partition_pixels() {
        for access_pattern in [AccessPattern::Chess, AccessPattern::Interleave] {
            let zero = pixels_in_subpage(Subpage::Zero, access_pattern);
            let one = pixels_in_subpage(Subpage::One, access_pattern);
            assert_eq!(zero.count(), 384);
            assert_eq!(one.count(), 384);
        }
        assert_eq!(pixel_pattern(367, AccessPattern::Chess), Subpage::Zero);
        assert_eq!(pixel_pattern(400, AccessPattern::Chess), Subpage::Zero);
        assert_eq!(pixel_pattern(367, AccessPattern::Interleave), Subpage::One);
        assert_eq!(pixel_pattern(1, AccessPattern::Chess), Subpage::One);
    }

    #[test]
    fn conversion_pattern_values() {
        // Columns repeat in groups of four, negated on odd rows.
        let even_row: [f64; 4] = [0, 1, 2, 3].map(conversion_pattern);
        assert_eq!(even_row, [0.0, -1.0, 0.0, 1.0]);
        let odd_row: [f64; 4] = [32, 33, 34, 35].map(conversion_pattern);
        assert_eq!(odd_row, [0.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn supply_voltage_and_ambient() {
        let (frame, calibration) = datasheet_inputs();
        let v_dd = supply_voltage(&frame, calibration.coefficients(), 1.0);
        assert_approx_eq!(f64, v_dd, 3.3186237373737373, epsilon = EPSILON);
        let t_a = ambient_temperature(&frame, calibration.coefficients(), v_dd);
        assert_approx_eq!(f64, t_a, 39.18442378914584, epsilon = EPSILON);
    }

    #[test]
    fn reflected_temperature() {
        assert_eq!(ReflectedTemperature::default().resolve(30.0), 22.0);
        assert_eq!(ReflectedTemperature::Fixed(12.5).resolve(30.0), 12.5);
        assert_eq!(ReflectedTemperature::AmbientOffset(2.0).resolve(30.0), 32.0);
    }

    #[test]
    fn datasheet_black_body() {
        let (frame, calibration) = datasheet_inputs();
        let temperatures = convert_subpage(
            &frame,
            &calibration,
            chess_control(),
            Subpage::Zero,
            1.0,
            ReflectedTemperature::default(),
        );
        assert_eq!(temperatures.subpage, Subpage::Zero);
        assert_approx_eq!(f64, temperatures.t_a, 39.18442378914584, epsilon = EPSILON);
        assert_approx_eq!(f64, temperatures.values[367], 80.21637180738782, epsilon = EPSILON);
        assert_approx_eq!(f64, temperatures.values[400], 79.25206947832203, epsilon = EPSILON);
        assert_approx_eq!(f64, temperatures.values[0], 126.03332625899253, epsilon = EPSILON);
        // Pixel 1 is in the other subpage
        assert_eq!(temperatures.values[1], 0.0);
    }

    #[test]
    fn datasheet_emissivity() {
        let (frame, calibration) = datasheet_inputs();
        let subpage_0 = convert_subpage(
            &frame,
            &calibration,
            chess_control(),
            Subpage::Zero,
            0.95,
            ReflectedTemperature::default(),
        );
        assert_approx_eq!(f64, subpage_0.values[367], 82.42446781401839, epsilon = EPSILON);
        assert_approx_eq!(f64, subpage_0.values[400], 81.42505335399505, epsilon = EPSILON);
        assert_approx_eq!(f64, subpage_0.values[0], 129.80488428455573, epsilon = EPSILON);
        let subpage_1 = convert_subpage(
            &frame,
            &calibration,
            chess_control(),
            Subpage::One,
            0.95,
            ReflectedTemperature::default(),
        );
        assert_approx_eq!(f64, subpage_1.values[1], 119.7578633858447, epsilon = EPSILON);
        assert_approx_eq!(f64, subpage_1.values[32], 130.24390435122564, epsilon = EPSILON);
        assert_eq!(subpage_1.values[367], 0.0);
    }

    #[test]
    fn interleaved_mode_correction() {
        let (frame, calibration) = datasheet_inputs();
        let temperatures = convert_subpage(
            &frame,
            &calibration,
            ControlRegister::from(0x0901),
            Subpage::Zero,
            0.95,
            ReflectedTemperature::default(),
        );
        assert_approx_eq!(f64, temperatures.values[400], 81.41820209236272, epsilon = EPSILON);
        // Row 11 is in subpage 1 when interleaved
        assert_eq!(temperatures.values[367], 0.0);
    }

    #[test]
    fn only_subpage_pixels_are_set() {
        let (frame, calibration) = datasheet_inputs();
        for subpage in [Subpage::Zero, Subpage::One] {
            let temperatures = convert_subpage(
                &frame,
                &calibration,
                chess_control(),
                subpage,
                0.95,
                ReflectedTemperature::default(),
            );
            let set = temperatures.values.iter().filter(|t| **t != 0.0).count();
            assert_eq!(set, 384);
        }
    }

    #[test]
    fn deterministic() {
        let (frame, calibration) = datasheet_inputs();
        let convert = || {
            convert_subpage(
                &frame,
                &calibration,
                chess_control(),
                Subpage::Zero,
                0.95,
                ReflectedTemperature::default(),
            )
        };
        let first = convert();
        let second = convert();
        assert!(first
            .values
            .iter()
            .zip(second.values.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }
}
