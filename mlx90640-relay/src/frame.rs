// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Raw frames as read from the camera, and the merged temperature image.
use core::fmt;

use crate::common::{FRAME_WORDS, HEIGHT, NUM_PIXELS, WIDTH};
use crate::error::LibraryError;
use crate::register::Subpage;

/// Indices of the auxiliary values in a RAM dump.
///
/// Each of these is a signed 16-bit value.
mod ram_index {
    pub(super) const T_A_V_BE: usize = 768;
    pub(super) const COMPENSATION_PIXEL_0: usize = 776;
    pub(super) const GAIN: usize = 778;
    pub(super) const T_A_PTAT: usize = 800;
    pub(super) const COMPENSATION_PIXEL_1: usize = 808;
    pub(super) const V_DD_PIXEL: usize = 810;
}

/// A full dump of the camera's RAM (832 words starting at 0x0400).
///
/// Only the pixels belonging to the most recently measured subpage are fresh, the others hold
/// whatever was measured for the previous subpage.
#[derive(Clone, PartialEq)]
pub struct RawFrame([u16; FRAME_WORDS]);

impl RawFrame {
    pub fn new(words: [u16; FRAME_WORDS]) -> Self {
        Self(words)
    }

    /// Copy a RAM dump from a slice, which must be exactly 832 words long.
    pub fn from_words(words: &[u16]) -> Result<Self, LibraryError> {
        if words.len() != FRAME_WORDS {
            return Err(LibraryError::InvalidData(
                "RAM dumps must be exactly 832 words long",
            ));
        }
        let mut frame = Self::default();
        frame.0.copy_from_slice(words);
        Ok(frame)
    }

    pub fn words(&self) -> &[u16] {
        &self.0
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u16] {
        &mut self.0
    }

    /// The raw (signed) reading for a pixel.
    pub fn pixel(&self, index: usize) -> i16 {
        self.signed(index)
    }

    /// V<sub>BE</sub>, used with V<sub>PTAT</sub> to find the ambient temperature.
    pub fn t_a_v_be(&self) -> i16 {
        self.signed(ram_index::T_A_V_BE)
    }

    pub fn t_a_ptat(&self) -> i16 {
        self.signed(ram_index::T_A_PTAT)
    }

    /// The measured gain, Gain<sub>EE</sub> is divided by this.
    pub fn gain(&self) -> i16 {
        self.signed(ram_index::GAIN)
    }

    /// The reading for the pixel supply voltage.
    pub fn v_dd_pixel(&self) -> i16 {
        self.signed(ram_index::V_DD_PIXEL)
    }

    pub fn compensation_pixel(&self, subpage: Subpage) -> i16 {
        match subpage {
            Subpage::Zero => self.signed(ram_index::COMPENSATION_PIXEL_0),
            Subpage::One => self.signed(ram_index::COMPENSATION_PIXEL_1),
        }
    }

    fn signed(&self, index: usize) -> i16 {
        self.0[index] as i16
    }
}

impl Default for RawFrame {
    fn default() -> Self {
        Self([0; FRAME_WORDS])
    }
}

// The full dump is a bit much for debug output.
impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("t_a_v_be", &self.t_a_v_be())
            .field("t_a_ptat", &self.t_a_ptat())
            .field("gain", &self.gain())
            .field("v_dd_pixel", &self.v_dd_pixel())
            .finish()
    }
}

/// A full 32×24 image of temperatures in ℃, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureMatrix([f64; NUM_PIXELS]);

impl TemperatureMatrix {
    /// The rows and columns averaged by [`centre_average`][TemperatureMatrix::centre_average].
    pub const CENTRE_ROWS: core::ops::RangeInclusive<usize> = (HEIGHT / 2 - 1)..=(HEIGHT / 2 + 1);
    pub const CENTRE_COLUMNS: core::ops::RangeInclusive<usize> = (WIDTH / 2 - 1)..=(WIDTH / 2 + 1);

    /// A matrix with every temperature set to 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a matrix from a slice of exactly 768 values.
    pub fn from_values(values: &[f64]) -> Result<Self, LibraryError> {
        if values.len() != NUM_PIXELS {
            return Err(LibraryError::InvalidData(
                "Temperature matrices must have exactly 768 values",
            ));
        }
        let mut matrix = Self::default();
        matrix.0.copy_from_slice(values);
        Ok(matrix)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// The temperature at the given position, or `None` if it's outside of the image.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row < HEIGHT && column < WIDTH {
            Some(self.0[row * WIDTH + column])
        } else {
            None
        }
    }

    /// Iterate over each row of the image, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.0.chunks_exact(WIDTH)
    }

    /// Fold one subpage's worth of temperatures into this matrix.
    ///
    /// Only values strictly greater than 0 ℃ replace the existing value. The pixels that were not
    /// measured in the subpage are 0, so this picks out the measured half. Measured temperatures
    /// at or below freezing are dropped as well, and the previous value is kept in their place.
    pub fn merge_subpage(&mut self, subpage_values: &[f64]) {
        self.0
            .iter_mut()
            .zip(subpage_values.iter())
            .filter(|(_, new)| **new > 0.0)
            .for_each(|(old, new)| *old = *new);
    }

    /// The lowest and highest temperatures in the image.
    pub fn min_max(&self) -> (f64, f64) {
        self.0
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
                (min.min(*value), max.max(*value))
            })
    }

    /// The mean of the 3×3 block of pixels in the middle of the image.
    pub fn centre_average(&self) -> f64 {
        let sum: f64 = self
            .rows()
            .skip(*Self::CENTRE_ROWS.start())
            .take(Self::CENTRE_ROWS.count())
            .flat_map(|row| row[Self::CENTRE_COLUMNS].iter())
            .sum();
        sum / (Self::CENTRE_ROWS.count() * Self::CENTRE_COLUMNS.count()) as f64
    }
}

impl Default for TemperatureMatrix {
    fn default() -> Self {
        Self([0f64; NUM_PIXELS])
    }
}
