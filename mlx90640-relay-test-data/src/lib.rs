// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Canned MLX90640 memory images and a mock I²C bus for testing `mlx90640-relay`.
//!
//! The data is the worked example from the MLX90640 datasheet. This crate deliberately only
//! depends on `embedded-hal`, so the mock bus can be handed to the library's own unit tests
//! without pulling in a second copy of the library.
mod eeprom_data;
mod i2c_mock;
mod ram_data;

pub use eeprom_data::{
    mlx90640_datasheet_eeprom, with_device_select_bit, with_pixel_words, EEPROM_LENGTH,
};
pub use i2c_mock::{datasheet_mlx90640_at_address, I2cOperation, MockCameraBus, MockError};
pub use ram_data::{
    datasheet_frame, CONTROL_REGISTER_CHESS, CONTROL_REGISTER_INTERLEAVE, RAM_LENGTH,
    STATUS_SUBPAGE_0_READY, STATUS_SUBPAGE_1_READY,
};

/// Number of pixels on the sensor.
pub const NUM_PIXELS: usize = 768;

/// Word index of the first per-pixel calibration word in the EEPROM dump.
pub const PIXEL_WORD_OFFSET: usize = 64;
