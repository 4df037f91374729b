// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Word-level access to the camera's memory map.
//!
//! Everything above this module only deals in 16-bit words at 16-bit addresses. How those reach
//! the camera is up to the [`RegisterTransport`] implementation. [`I2cTransport`] covers the usual
//! case of an [`embedded-hal`][embedded_hal] I²C bus.
use core::fmt;

use embedded_hal::blocking::i2c;
use log::trace;

use crate::common::{Address, FRAME_WORDS};

/// Read and write 16-bit words on the camera.
pub trait RegisterTransport {
    type Error: fmt::Debug;

    /// Fill `destination` with consecutive words starting at `address`.
    ///
    /// The number of words read is the length of `destination`.
    fn read_words(&mut self, address: Address, destination: &mut [u16]) -> Result<(), Self::Error>;

    /// Write a single word to `address`.
    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Self::Error>;

    /// Read a single word from `address`.
    fn read_word(&mut self, address: Address) -> Result<u16, Self::Error> {
        let mut word = [0u16; 1];
        self.read_words(address, &mut word)?;
        Ok(word[0])
    }
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    type Error = T::Error;

    fn read_words(&mut self, address: Address, destination: &mut [u16]) -> Result<(), Self::Error> {
        (**self).read_words(address, destination)
    }

    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Self::Error> {
        (**self).write_word(address, value)
    }
}

/// Errors from the I²C bus, kept apart by the kind of transaction that failed.
pub enum I2cError<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
{
    Write(<I2C as i2c::Write>::Error),
    WriteRead(<I2C as i2c::WriteRead>::Error),
}

// Same reasoning as the Debug implementation on `Error`, the bus itself may not be Debug.
impl<I2C> fmt::Debug for I2cError<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
    <I2C as i2c::Write>::Error: fmt::Debug,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Write(err) => f.debug_tuple("I2cError::Write").field(err).finish(),
            I2cError::WriteRead(err) => f.debug_tuple("I2cError::WriteRead").field(err).finish(),
        }
    }
}

impl<I2C> fmt::Display for I2cError<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
    <I2C as i2c::Write>::Error: fmt::Debug,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Write(err) => write!(f, "I2C write failed: {:?}", err),
            I2cError::WriteRead(err) => write!(f, "I2C write-read failed: {:?}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for I2cError<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
    <I2C as i2c::Write>::Error: std::error::Error + 'static,
    <I2C as i2c::WriteRead>::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            I2cError::Write(err) => Some(err),
            I2cError::WriteRead(err) => Some(err),
        }
    }
}

/// The largest read done as a single I²C transaction, one full EEPROM or RAM dump.
const READ_BUFFER_BYTES: usize = FRAME_WORDS * 2;

/// A camera on an I²C bus.
///
/// Reads are a combined write-read (the bus is not released between sending the address and
/// reading the data), with a big-endian address and big-endian data. A whole frame is read in one
/// transaction so the camera cannot update RAM partway through. Writes send the two address bytes
/// followed by the two data bytes.
#[derive(Clone)]
pub struct I2cTransport<I2C> {
    bus: I2C,
    i2c_address: u8,
    read_buffer: [u8; READ_BUFFER_BYTES],
}

impl<I2C: fmt::Debug> fmt::Debug for I2cTransport<I2C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cTransport")
            .field("bus", &self.bus)
            .field("i2c_address", &self.i2c_address)
            .finish_non_exhaustive()
    }
}

impl<I2C> I2cTransport<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
{
    /// Create a transport for the camera at the given I²C address.
    ///
    /// MLX90640s can be configured to use any I²C address (except 0x00), but the default address
    /// is 0x33.
    pub fn new(bus: I2C, i2c_address: u8) -> Self {
        Self {
            bus,
            i2c_address,
            read_buffer: [0u8; READ_BUFFER_BYTES],
        }
    }

    pub fn i2c_address(&self) -> u8 {
        self.i2c_address
    }

    /// Give back the underlying bus.
    pub fn release(self) -> I2C {
        self.bus
    }
}

impl<I2C> RegisterTransport for I2cTransport<I2C>
where
    I2C: i2c::Write + i2c::WriteRead,
    <I2C as i2c::Write>::Error: fmt::Debug,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
{
    type Error = I2cError<I2C>;

    fn read_words(&mut self, address: Address, destination: &mut [u16]) -> Result<(), Self::Error> {
        trace!("Reading {} words from {:?}", destination.len(), address);
        // Only reads longer than a frame are split up
        let mut chunk_address = address;
        for chunk in destination.chunks_mut(READ_BUFFER_BYTES / 2) {
            let bytes = &mut self.read_buffer[..(chunk.len() * 2)];
            self.bus
                .write_read(self.i2c_address, &chunk_address.as_bytes(), bytes)
                .map_err(I2cError::WriteRead)?;
            chunk
                .iter_mut()
                .zip(bytes.chunks_exact(2))
                .for_each(|(word, pair)| *word = u16::from_be_bytes([pair[0], pair[1]]));
            chunk_address = chunk_address.offset(chunk.len() as u16);
        }
        Ok(())
    }

    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Self::Error> {
        trace!("Writing {:#06X} to {:?}", value, address);
        let address_bytes = address.as_bytes();
        let value_bytes = value.to_be_bytes();
        let combined: [u8; 4] = [
            address_bytes[0],
            address_bytes[1],
            value_bytes[0],
            value_bytes[1],
        ];
        self.bus
            .write(self.i2c_address, &combined)
            .map_err(I2cError::Write)
    }
}
