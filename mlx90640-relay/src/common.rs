// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Dimensions, memory map locations and reference constants for the MLX90640.
//!
//! Most of the datasheet's formulas are sign conversions and shifts written out longhand. The
//! [field table][crate::calibration::field] records each calibration value by position and width
//! instead, so the arithmetic here and in [`calculations`][crate::calculations] only has the
//! physics left in it.
//!
//! Symbols used throughout the crate:
//!
//! * α: pixel sensitivity.
//! * CP: compensation pixel, a shielded pixel that tracks common-mode drift.
//! * ε: emissivity of the measured surface.
//! * K<sub>x</sub>: a correction coefficient for x.
//! * PTAT: the proportional-to-absolute-temperature sensor used for T<sub>a</sub>.
//! * T<sub>a</sub>, T<sub>o</sub>, T<sub>r</sub>: ambient, object and reflected temperatures.
//! * V<sub>DD</sub>: supply voltage.
use core::fmt;

/// The width of the thermal image, in pixels.
pub const WIDTH: usize = 32;

/// The height of the thermal image, in pixels.
pub const HEIGHT: usize = 24;

/// The total number of pixels.
pub const NUM_PIXELS: usize = WIDTH * HEIGHT;

/// The number of words in both an EEPROM dump and a RAM frame.
///
/// For the RAM that is 768 pixels followed by 64 auxiliary words (half of which are reserved).
pub const FRAME_WORDS: usize = 832;

/// The first EEPROM address.
pub const EEPROM_BASE: Address = Address::new(0x2400);

/// The first RAM address.
pub const RAM_BASE: Address = Address::new(0x0400);

/// The default I²C address for MLX90640 cameras.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x33;

/// Supply voltage the camera is calibrated against (V<sub>DD<sub>0</sub></sub>).
pub const V_DD_0: f64 = 3.3;

/// Reference ambient temperature (T<sub>a<sub>0</sub></sub>) in ℃.
pub const T_A_0: f64 = 25.0;

/// Constant needed a few times for the final pixel temperature calculations.
pub const KELVINS_TO_CELSIUS: f64 = 273.15;

/// Marker newtype for register addresses on the camera.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Address(u16);

impl Address {
    /// Wrap the given address in an `Address`.
    ///
    /// This function is intended to be used in const contexts, in other cases the
    /// [`From`][core::convert::From] implementation is probably easier to use.
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    /// The address as it's sent on the wire, big-endian.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// The address `words` words after this one.
    pub const fn offset(&self, words: u16) -> Self {
        Self(self.0 + words)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#X})", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self::new(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0 as usize
    }
}
