// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The two registers an acquisition session touches: status (0x8000) and control (0x800D).
//!
//! Both are decoded into plain structs, modified in memory, and written back with
//! [`masked_update`] so that the bits the camera reserves are never changed.
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::Address;
use crate::error::LibraryError;
use crate::util::is_bit_set;

/// Bit positions and field masks.
mod bits {
    pub(super) const STATUS_SUBPAGE: usize = 0;
    pub(super) const STATUS_NEW_DATA: usize = 3;
    pub(super) const STATUS_OVERWRITE: usize = 4;
    pub(super) const STATUS_START: usize = 5;
    /// Bits 0–2 are read-only, everything above bit 5 is reserved.
    pub(super) const STATUS_WRITABLE: u16 = 0x0038;

    pub(super) const CONTROL_SUBPAGES: usize = 0;
    pub(super) const CONTROL_STEP_MODE: usize = 1;
    pub(super) const CONTROL_DATA_HOLD: usize = 2;
    pub(super) const CONTROL_SUBPAGE_REPEAT: usize = 3;
    pub(super) const CONTROL_SELECTED_SUBPAGE: usize = 4;
    pub(super) const CONTROL_FRAME_RATE_SHIFT: u16 = 7;
    pub(super) const CONTROL_FRAME_RATE_MASK: u16 = 0x0380;
    pub(super) const CONTROL_RESOLUTION_SHIFT: u16 = 10;
    pub(super) const CONTROL_RESOLUTION_MASK: u16 = 0x0C00;
    pub(super) const CONTROL_ACCESS_PATTERN: usize = 12;
    /// The top three bits are reserved.
    pub(super) const CONTROL_WRITABLE: u16 = 0x1FFF;
}

/// A register that can be decoded from, and encoded back into, its raw value.
pub trait Register: Into<u16> + From<u16> + Copy {
    /// The bits the controller is allowed to change.
    fn write_mask() -> u16;

    /// Where the register lives in the camera's memory map.
    fn address() -> Address;
}

/// Merge `register` into the raw value currently on the camera.
///
/// Bits outside of the register's write mask are taken from `current_raw`.
pub(crate) fn masked_update<R: Register>(current_raw: u16, register: R) -> u16 {
    let mask = R::write_mask();
    (current_raw & !mask) | (register.into() & mask)
}

fn subpage_bit(raw: u16, index: usize) -> Subpage {
    if is_bit_set(raw, index) {
        Subpage::One
    } else {
        Subpage::Zero
    }
}

fn flag(value: bool, index: usize) -> u16 {
    u16::from(value) << index
}

/// The status register (0x8000).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusRegister {
    last_updated_subpage: Subpage,
    new_data: bool,
    overwrite_enabled: bool,
    start_measurement: bool,
}

impl StatusRegister {
    /// The subpage that was most recently written to RAM. Read-only.
    pub fn last_updated_subpage(&self) -> Subpage {
        self.last_updated_subpage
    }

    /// Set by the camera when a measurement has been written to RAM. Only the controller clears
    /// it.
    pub fn new_data(&self) -> bool {
        self.new_data
    }

    /// Whether RAM may be overwritten by the next measurement.
    pub fn overwrite_enabled(&self) -> bool {
        self.overwrite_enabled
    }

    /// Set by the controller to request a measurement, cleared by the camera when it's done.
    pub fn start_measurement(&self) -> bool {
        self.start_measurement
    }

    /// Turn this register value into the measurement trigger.
    ///
    /// The new data flag is cleared, overwriting is enabled and a measurement is requested. On
    /// the wire this is 0x0030 plus whatever read-only bits the camera reported.
    pub fn trigger_measurement(&mut self) {
        self.new_data = false;
        self.overwrite_enabled = true;
        self.start_measurement = true;
    }
}

impl Register for StatusRegister {
    fn write_mask() -> u16 {
        bits::STATUS_WRITABLE
    }

    fn address() -> Address {
        Address::new(0x8000)
    }
}

impl From<u16> for StatusRegister {
    fn from(raw: u16) -> Self {
        Self {
            last_updated_subpage: subpage_bit(raw, bits::STATUS_SUBPAGE),
            new_data: is_bit_set(raw, bits::STATUS_NEW_DATA),
            overwrite_enabled: is_bit_set(raw, bits::STATUS_OVERWRITE),
            start_measurement: is_bit_set(raw, bits::STATUS_START),
        }
    }
}

impl From<StatusRegister> for u16 {
    fn from(status: StatusRegister) -> Self {
        flag(
            status.last_updated_subpage == Subpage::One,
            bits::STATUS_SUBPAGE,
        ) | flag(status.new_data, bits::STATUS_NEW_DATA)
            | flag(status.overwrite_enabled, bits::STATUS_OVERWRITE)
            | flag(status.start_measurement, bits::STATUS_START)
    }
}

/// Control register 1 (0x800D).
///
/// Only the frame rate, resolution and access pattern can be changed through this type. The
/// other fields are carried along so that writing the register back leaves them as they were.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlRegister {
    use_subpages: bool,

    /// Documented in older datasheets only: the camera idles until a measurement is requested.
    step_mode: bool,

    /// RAM is only written when the status register's overwrite flag is set.
    data_hold: bool,

    subpage_repeat: bool,

    /// The subpage measured when `subpage_repeat` is set.
    selected_subpage: Subpage,

    frame_rate: FrameRate,

    resolution: Resolution,

    access_pattern: AccessPattern,
}

impl ControlRegister {
    /// Whether the image is split into two subpages. Enabled by default.
    pub fn use_subpages(&self) -> bool {
        self.use_subpages
    }

    /// Whether the same subpage is measured every time instead of alternating.
    pub fn subpage_repeat(&self) -> bool {
        self.subpage_repeat
    }

    pub fn selected_subpage(&self) -> Subpage {
        self.selected_subpage
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: FrameRate) {
        self.frame_rate = frame_rate;
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn access_pattern(&self) -> AccessPattern {
        self.access_pattern
    }

    pub fn set_access_pattern(&mut self, access_pattern: AccessPattern) {
        self.access_pattern = access_pattern;
    }
}

impl Default for ControlRegister {
    /// The power-on value, 0x1901.
    fn default() -> Self {
        Self {
            use_subpages: true,
            step_mode: false,
            data_hold: false,
            subpage_repeat: false,
            selected_subpage: Subpage::Zero,
            frame_rate: FrameRate::default(),
            resolution: Resolution::default(),
            access_pattern: AccessPattern::Chess,
        }
    }
}

impl Register for ControlRegister {
    fn write_mask() -> u16 {
        bits::CONTROL_WRITABLE
    }

    fn address() -> Address {
        Address::new(0x800D)
    }
}

impl From<u16> for ControlRegister {
    fn from(raw: u16) -> Self {
        let frame_rate_bits =
            (raw & bits::CONTROL_FRAME_RATE_MASK) >> bits::CONTROL_FRAME_RATE_SHIFT;
        let resolution_bits =
            (raw & bits::CONTROL_RESOLUTION_MASK) >> bits::CONTROL_RESOLUTION_SHIFT;
        let access_pattern = if is_bit_set(raw, bits::CONTROL_ACCESS_PATTERN) {
            AccessPattern::Chess
        } else {
            AccessPattern::Interleave
        };
        Self {
            use_subpages: is_bit_set(raw, bits::CONTROL_SUBPAGES),
            step_mode: is_bit_set(raw, bits::CONTROL_STEP_MODE),
            data_hold: is_bit_set(raw, bits::CONTROL_DATA_HOLD),
            subpage_repeat: is_bit_set(raw, bits::CONTROL_SUBPAGE_REPEAT),
            selected_subpage: subpage_bit(raw, bits::CONTROL_SELECTED_SUBPAGE),
            // The masks leave only valid values for both of these
            frame_rate: FrameRate::from_masked(frame_rate_bits),
            resolution: Resolution::from_masked(resolution_bits),
            access_pattern,
        }
    }
}

impl From<ControlRegister> for u16 {
    fn from(control: ControlRegister) -> Self {
        flag(control.use_subpages, bits::CONTROL_SUBPAGES)
            | flag(control.step_mode, bits::CONTROL_STEP_MODE)
            | flag(control.data_hold, bits::CONTROL_DATA_HOLD)
            | flag(control.subpage_repeat, bits::CONTROL_SUBPAGE_REPEAT)
            | flag(
                control.selected_subpage == Subpage::One,
                bits::CONTROL_SELECTED_SUBPAGE,
            )
            | (control.frame_rate.as_raw() << bits::CONTROL_FRAME_RATE_SHIFT)
            | (control.resolution.as_raw() << bits::CONTROL_RESOLUTION_SHIFT)
            | flag(
                control.access_pattern == AccessPattern::Chess,
                bits::CONTROL_ACCESS_PATTERN,
            )
    }
}

/// One of the two halves of the image.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Subpage {
    Zero = 0,
    One = 1,
}

/// How often the camera measures a subpage.
///
/// The bus has to keep up with the frame rate. Roughly, 100kHz I²C is good for
/// [4Hz][FrameRate::Four], 400kHz for [16Hz][FrameRate::Sixteen] and 1MHz for
/// [32Hz][FrameRate::ThirtyTwo]. [64Hz][FrameRate::SixtyFour] needs a fast bus and a host that
/// keeps polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum FrameRate {
    Half = 0,
    One = 1,
    /// The power-on default.
    Two = 2,
    Four = 3,
    Eight = 4,
    Sixteen = 5,
    ThirtyTwo = 6,
    SixtyFour = 7,
}

impl FrameRate {
    fn from_masked(raw_value: u16) -> Self {
        Self::try_from(raw_value & 0x7).unwrap_or(Self::Two)
    }

    /// The three-bit value used by the camera.
    pub fn as_raw(&self) -> u16 {
        u16::from(*self)
    }

    pub fn hertz(&self) -> f64 {
        match self {
            Self::Half => 0.5,
            _ => f64::from(1u16 << (self.as_raw() - 1)),
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::Two
    }
}

/// The resolution of the camera's ADC.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Resolution {
    Sixteen = 0,
    Seventeen = 1,
    /// The power-on default, and what cameras are normally calibrated at.
    Eighteen = 2,
    Nineteen = 3,
}

impl Resolution {
    fn from_masked(raw_value: u16) -> Self {
        Self::try_from(raw_value & 0x3).unwrap_or(Self::Eighteen)
    }

    /// Decode the two-bit value used by the camera (and in the calibration data).
    pub fn from_raw(raw_value: u16) -> Result<Self, LibraryError> {
        Self::try_from(raw_value)
            .map_err(|_| LibraryError::InvalidData("Invalid raw resolution value given"))
    }

    /// The two-bit value used by the camera.
    pub fn as_raw(&self) -> u16 {
        u16::from(*self)
    }

    /// The number of bits of resolution.
    pub fn bits(&self) -> u8 {
        16 + self.as_raw() as u8
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Eighteen
    }
}

/// Which pixels belong to which subpage.
///
/// See the [crate documentation][crate] for the layouts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessPattern {
    /// Rows alternate subpages.
    Interleave = 0,

    /// Pixels alternate subpages along both rows and columns. The default, and what cameras are
    /// normally calibrated in.
    Chess = 1,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_register_fields() {
        let cases = [
            (0x0000, Subpage::Zero, false, false, false),
            (0x0001, Subpage::One, false, false, false),
            (0x0008, Subpage::Zero, true, false, false),
            (0x0010, Subpage::Zero, false, true, false),
            (0x0020, Subpage::Zero, false, false, true),
            (0x0039, Subpage::One, true, true, true),
        ];
        for (raw, subpage, new_data, overwrite, start) in cases {
            let status = StatusRegister::from(raw);
            assert_eq!(status.last_updated_subpage(), subpage, "{:#06X}", raw);
            assert_eq!(status.new_data(), new_data, "{:#06X}", raw);
            assert_eq!(status.overwrite_enabled(), overwrite, "{:#06X}", raw);
            assert_eq!(status.start_measurement(), start, "{:#06X}", raw);
            assert_eq!(u16::from(status), raw);
        }
    }

    #[test]
    fn status_reserved_bits_are_dropped() {
        // Bits 1 and 2 are read-only and reserved
        assert_eq!(u16::from(StatusRegister::from(0x0007)), 0x0001);
    }

    #[test]
    fn trigger_measurement() {
        let mut status = StatusRegister::from(0x0008);
        status.trigger_measurement();
        assert_eq!(u16::from(status), 0x0030);
        // The read-only subpage bit survives
        let mut status = StatusRegister::from(0x0009);
        status.trigger_measurement();
        assert_eq!(u16::from(status), 0x0031);
        assert_eq!(masked_update(0x0009, status), 0x0031);
    }

    #[test]
    fn masked_update_keeps_reserved_bits() {
        let mut control = ControlRegister::from(0xE901);
        control.set_frame_rate(FrameRate::SixtyFour);
        assert_eq!(masked_update(0xE901, control), 0xEB81);
        // Same as the camera default with the 64Hz bits ORed in
        assert_eq!(masked_update(0x1901, ControlRegister::from(0x1901 | 0x0380)), 0x1B81);
    }

    #[test]
    fn control_register_flags() {
        let control = ControlRegister::from(0x001F);
        assert!(control.use_subpages());
        assert!(control.subpage_repeat());
        assert_eq!(control.selected_subpage(), Subpage::One);
        assert_eq!(u16::from(control), 0x001F);
        let control = ControlRegister::from(0x0000);
        assert!(!control.use_subpages());
        assert!(!control.subpage_repeat());
        assert_eq!(control.selected_subpage(), Subpage::Zero);
    }

    #[test]
    fn control_register_frame_rate() {
        let rates = [
            FrameRate::Half,
            FrameRate::One,
            FrameRate::Two,
            FrameRate::Four,
            FrameRate::Eight,
            FrameRate::Sixteen,
            FrameRate::ThirtyTwo,
            FrameRate::SixtyFour,
        ];
        for (raw, rate) in (0u16..).zip(rates) {
            let control = ControlRegister::from(raw << 7);
            assert_eq!(control.frame_rate(), rate);
            assert_eq!(u16::from(control), raw << 7);
        }
    }

    #[test]
    fn control_register_resolution() {
        let resolutions = [
            Resolution::Sixteen,
            Resolution::Seventeen,
            Resolution::Eighteen,
            Resolution::Nineteen,
        ];
        for (raw, resolution) in (0u16..).zip(resolutions) {
            let control = ControlRegister::from(raw << 10);
            assert_eq!(control.resolution(), resolution);
            assert_eq!(u16::from(control), raw << 10);
        }
    }

    #[test]
    fn control_register_access_pattern() {
        assert_eq!(
            ControlRegister::from(0x0000).access_pattern(),
            AccessPattern::Interleave
        );
        assert_eq!(
            ControlRegister::from(0x1000).access_pattern(),
            AccessPattern::Chess
        );
        let mut control = ControlRegister::from(0x1901);
        control.set_access_pattern(AccessPattern::Interleave);
        assert_eq!(u16::from(control), 0x0901);
    }

    #[test]
    fn datasheet_control_register() {
        let control = ControlRegister::from(0x1901);
        assert_eq!(control.access_pattern(), AccessPattern::Chess);
        assert_eq!(control.resolution(), Resolution::Eighteen);
        assert_eq!(control.frame_rate(), FrameRate::Two);
        assert_eq!(u16::from(ControlRegister::default()), 0x1901);
    }

    #[test]
    fn frame_rate_hertz() {
        assert_eq!(FrameRate::Half.hertz(), 0.5);
        assert_eq!(FrameRate::One.hertz(), 1.0);
        assert_eq!(FrameRate::Four.hertz(), 4.0);
        assert_eq!(FrameRate::SixtyFour.hertz(), 64.0);
    }

    #[test]
    fn resolution_from_raw() {
        assert_eq!(Resolution::from_raw(0), Ok(Resolution::Sixteen));
        assert_eq!(Resolution::from_raw(3), Ok(Resolution::Nineteen));
        assert!(Resolution::from_raw(4).is_err());
        assert_eq!(Resolution::Sixteen.bits(), 16);
        assert_eq!(Resolution::Nineteen.bits(), 19);
    }
}
