// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use crate::NUM_PIXELS;

/// The number of 16-bit words read per frame, 768 pixels followed by 64 auxiliary words.
pub const RAM_LENGTH: usize = 0x0740 - 0x0400;

/// Control register value from the worked example: chess pattern, 18-bit ADC, 2Hz.
pub const CONTROL_REGISTER_CHESS: u16 = 0x1901;

/// The same settings as [`CONTROL_REGISTER_CHESS`], but with the interleaved pattern.
pub const CONTROL_REGISTER_INTERLEAVE: u16 = 0x0901;

/// Status register with new data available for subpage 0.
pub const STATUS_SUBPAGE_0_READY: u16 = 0x0008;

/// Status register with new data available for subpage 1.
pub const STATUS_SUBPAGE_1_READY: u16 = 0x0009;

/// Create the RAM contents from the datasheet worked example.
///
/// Every pixel reads 0x0261, and the auxiliary words are filled in from the example. Reserved
/// words are left at 0.
pub fn datasheet_frame() -> [u16; RAM_LENGTH] {
    let mut frame = [0u16; RAM_LENGTH];
    frame[..NUM_PIXELS].iter_mut().for_each(|word| *word = 0x0261);
    // Ta_Vbe
    frame[768] = 0x4bf2;
    // CP(0)
    frame[776] = 0xffca;
    // Gain
    frame[778] = 0x1881;
    // Ta_PTAT
    frame[800] = 0x06af;
    // CP(1)
    frame[808] = 0xffc8;
    // VDD_pix
    frame[810] = 0xccc5;
    frame
}
