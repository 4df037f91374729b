// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A pure-Rust library for reading an MLX90640 thermal camera and relaying its temperature frames
//! to another node.
//!
//! The camera has a large amount of calibration data that must be pre-processed before use, and
//! the output data also requires a somewhat complex process to turn it into temperature data. This
//! crate covers that whole path:
//!
//! 1. [`calibration`] decodes the factory calibration out of an EEPROM dump into a
//!    [`CalibrationSet`], rejecting dumps from unknown devices or with too many (or touching) bad
//!    pixels.
//! 2. [`driver`] runs the acquisition cycle over a [`RegisterTransport`]: poll for new data,
//!    trigger the next measurement, read the frame and the registers describing it.
//! 3. [`calculations`] turns a raw frame into temperatures for the subpage it covers, and
//!    [`frame`] merges subpages into the [`TemperatureMatrix`] callers see.
//! 4. `stream` and `session` (both need the `std` feature) move matrices between an acquisition
//!    node and a display node over a length-prefixed binary stream.
//!
//! Any [`embedded-hal`][embedded-hal] I²C bus can be used through [`I2cTransport`], and the core
//! of the library is `no_std` compatible (enable the `libm` feature instead of `std`).
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
//!
//! # Example
//! ```no_run
//! use linux_embedded_hal::I2cdev;
//! use mlx90640_relay::{FrameAcquirer, I2cTransport, SessionConfig};
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! let config = SessionConfig::default();
//! // Default address for these cameras is 0x33
//! let transport = I2cTransport::new(i2c_bus, config.address);
//! let mut camera = FrameAcquirer::new(transport, config)?;
//! // Both subpages are captured before `acquire` returns.
//! let temperatures = camera.acquire()?;
//! println!("Centre: {:.2}℃", temperatures.centre_average());
//! # Ok::<(), mlx90640_relay::Error<I2cTransport<I2cdev>>>(())
//! ```
//!
//! # Subpages and Access Patterns
//! Not all of the image is updated at once. The imaging area is divided into two
//! [subpages][Subpage], each being updated in turn. The pixels are split into subpages depending
//! on the current [access pattern][AccessPattern]. In chess board mode (the default), the pixels
//! alternate subpages in both the X and Y axes:
//! ```text
//! 0 1 0 1 0 1 0 1
//! 1 0 1 0 1 0 1 0
//! 0 1 0 1 0 1 0 1
//! 1 0 1 0 1 0 1 0
//! ```
//! The other access mode interleaves each row, so pixels will alternate subpages only on the Y
//! axis:
//! ```text
//! 0 0 0 0 0 0 0 0
//! 1 1 1 1 1 1 1 1
//! 0 0 0 0 0 0 0 0
//! 1 1 1 1 1 1 1 1
//! ```

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

#[cfg(feature = "std")]
extern crate std;

pub mod calculations;
pub mod calibration;
pub mod common;
pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod register;
#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod stream;
pub mod transport;
mod util;

pub use calculations::{
    convert_subpage, pixel_pattern, pixels_in_subpage, ReflectedTemperature, SubpageTemperatures,
};
pub use calibration::{CalibrationSet, Coefficients};
pub use common::Address;
pub use config::{BoundsError, SessionConfig, TemperatureBounds};
pub use driver::{AcquisitionState, FrameAcquirer};
pub use error::{Error, LibraryError};
pub use frame::{RawFrame, TemperatureMatrix};
pub use register::*;
#[cfg(feature = "std")]
pub use session::{
    observer_fn, spawn_acquisition, spawn_receiver, AcquisitionExit, FrameObserver, FrameSender,
};
#[cfg(feature = "std")]
pub use stream::{read_matrix, write_matrix, StreamError};
pub use transport::{I2cError, I2cTransport, RegisterTransport};
