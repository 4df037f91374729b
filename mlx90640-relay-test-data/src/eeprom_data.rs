// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use crate::{NUM_PIXELS, PIXEL_WORD_OFFSET};

/// The size of the MLX90640 EEPROM in 16-bit words (0x2400 through 0x273F).
pub const EEPROM_LENGTH: usize = 0x2740 - 0x2400;

/// Example MLX90640 EEPROM data from the datasheet (from the worked example).
// Each line is 8 words. The first two lines are empty, as that data is ignored for calibration
// purposes. The next six lines are the shared calibration data.
#[rustfmt::skip]
const MLX90640_EEPROM_HEADER: [u16; 64] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x4210, 0xffbb, 0x0202, 0xf202, 0xf2f2, 0xe2e2, 0xd1e1, 0xb1d1,
    0xf10f, 0xf00f, 0xe0ef, 0xe0ef, 0xe1e1, 0xf3f2, 0xf404, 0xe504,
    0x79a6, 0x2f44, 0xffdd, 0x2210, 0x3333, 0x2233, 0xef01, 0x9acc,
    0xeedc, 0x10ff, 0x2221, 0x3333, 0x2333, 0x0112, 0xeeff, 0xbbdd,
    0x18ef, 0x2ff1, 0x5952, 0x9d68, 0x5454, 0x0994, 0x6956, 0x5354,
    0x2363, 0xe446, 0xfbb5, 0x044b, 0xf020, 0x9797, 0x9797, 0x2889,
];

/// The per-pixel word used for every pixel in the worked example.
const DATASHEET_PIXEL_WORD: u16 = 0x08a0;

/// Create a buffer with the example MLX90640 EEPROM data.
pub fn mlx90640_datasheet_eeprom() -> [u16; EEPROM_LENGTH] {
    let mut eeprom_data = [DATASHEET_PIXEL_WORD; EEPROM_LENGTH];
    eeprom_data[..MLX90640_EEPROM_HEADER.len()].copy_from_slice(&MLX90640_EEPROM_HEADER);
    eeprom_data
}

/// Set the device-select bit (bit 6 of word 10), which marks a dump as not coming from a
/// supported device.
pub fn with_device_select_bit(mut eeprom: [u16; EEPROM_LENGTH]) -> [u16; EEPROM_LENGTH] {
    eeprom[10] |= 0x0040;
    eeprom
}

/// Overwrite the calibration words of the given pixels.
///
/// A word of `0x0000` marks a broken pixel, and any word with the lowest bit set marks an outlier.
pub fn with_pixel_words(
    mut eeprom: [u16; EEPROM_LENGTH],
    pixels: &[usize],
    word: u16,
) -> [u16; EEPROM_LENGTH] {
    for pixel in pixels.iter().copied().filter(|p| *p < NUM_PIXELS) {
        eeprom[PIXEL_WORD_OFFSET + pixel] = word;
    }
    eeprom
}
