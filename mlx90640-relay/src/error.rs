// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use core::fmt;

use crate::transport::RegisterTransport;

/// Errors that don't involve the register transport.
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryError {
    /// When a value from the camera is malformed in some way.
    InvalidData(&'static str),

    /// The EEPROM dump does not come from a supported device (the device-select bit is set).
    InvalidDevice,

    /// More than four pixels are marked as broken. The value is the number found before scanning
    /// stopped.
    TooManyBrokenPixels(usize),

    /// More than four pixels are marked as outliers.
    TooManyOutlierPixels(usize),

    /// Broken and outlier pixels together number more than four.
    TooManyFlaggedPixels(usize),

    /// Two flagged pixels are the same pixel or neighbours (including diagonally).
    AdjacentFlaggedPixels(u16, u16),

    /// The camera did not report new data within the configured number of polls.
    NotReady(usize),

    Other(&'static str),
}

impl LibraryError {
    /// The numeric code the Melexis reference library uses for this condition.
    ///
    /// Conditions the reference library has no code for map to -1.
    pub fn code(&self) -> i32 {
        match self {
            LibraryError::TooManyBrokenPixels(_) => -3,
            LibraryError::TooManyOutlierPixels(_) => -4,
            LibraryError::TooManyFlaggedPixels(_) => -5,
            LibraryError::AdjacentFlaggedPixels(_, _) => -6,
            LibraryError::InvalidDevice => -7,
            _ => -1,
        }
    }
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::InvalidData(msg) => write!(f, "{}", msg),
            LibraryError::InvalidDevice => write!(f, "EEPROM data is not from an MLX90640"),
            LibraryError::TooManyBrokenPixels(count) => {
                write!(f, "Too many broken pixels ({})", count)
            }
            LibraryError::TooManyOutlierPixels(count) => {
                write!(f, "Too many outlier pixels ({})", count)
            }
            LibraryError::TooManyFlaggedPixels(count) => {
                write!(f, "Too many broken and outlier pixels ({})", count)
            }
            LibraryError::AdjacentFlaggedPixels(first, second) => {
                write!(f, "Flagged pixels {} and {} are adjacent", first, second)
            }
            LibraryError::NotReady(polls) => {
                write!(f, "No new data after {} status register polls", polls)
            }
            LibraryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

pub enum Error<T>
where
    T: RegisterTransport,
{
    /// Errors originating from the register transport.
    TransportError(T::Error),

    /// Errors originating from within this library.
    LibraryError(LibraryError),
}

impl<T> Error<T>
where
    T: RegisterTransport,
{
    /// Whether the session can keep going after this error.
    ///
    /// Transport failures only abort the current cycle. Library errors (bad calibration data)
    /// mean the session cannot start.
    pub fn is_cycle_recoverable(&self) -> bool {
        matches!(
            self,
            Error::TransportError(_) | Error::LibraryError(LibraryError::NotReady(_))
        )
    }
}

// Custom Debug implementation so that the transport doesn't need to implement Debug (like the
// I2C bus from linux-embedded-hal).
impl<T> fmt::Debug for Error<T>
where
    T: RegisterTransport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransportError(err) => {
                f.debug_tuple("Error::TransportError").field(err).finish()
            }
            Error::LibraryError(err) => f.debug_tuple("Error::LibraryError").field(err).finish(),
        }
    }
}

impl<T> fmt::Display for Error<T>
where
    T: RegisterTransport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransportError(err) => write!(f, "Transport Error: {:?}", err),
            Error::LibraryError(err) => write!(f, "Library Error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<T> std::error::Error for Error<T>
where
    T: RegisterTransport,
    T::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TransportError(err) => Some(err),
            Error::LibraryError(lib_err) => Some(lib_err),
        }
    }
}

impl<T> From<LibraryError> for Error<T>
where
    T: RegisterTransport,
{
    fn from(lib_err: LibraryError) -> Self {
        Self::LibraryError(lib_err)
    }
}
