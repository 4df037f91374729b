// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Settings for an acquisition session.
use core::fmt;

use crate::calculations::ReflectedTemperature;
use crate::common::DEFAULT_I2C_ADDRESS;
use crate::error::LibraryError;
use crate::register::FrameRate;

/// Everything needed to start acquiring frames from a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    /// The I²C address of the camera.
    pub address: u8,

    /// The frame rate configured when the session starts.
    pub frame_rate: FrameRate,

    /// The emissivity of the objects being measured, in (0, 1].
    pub emissivity: f64,

    pub reflected_temperature: ReflectedTemperature,

    /// How many times the status register is polled for new data before giving up on a cycle.
    ///
    /// `None` polls forever.
    pub max_ready_polls: Option<usize>,

    /// The range of temperatures that display collaborators should map to their colour scale.
    pub bounds: TemperatureBounds,
}

impl SessionConfig {
    pub fn with_address(self, address: u8) -> Self {
        Self { address, ..self }
    }

    pub fn with_frame_rate(self, frame_rate: FrameRate) -> Self {
        Self { frame_rate, ..self }
    }

    pub fn with_emissivity(self, emissivity: f64) -> Self {
        Self { emissivity, ..self }
    }

    pub fn with_reflected_temperature(self, reflected_temperature: ReflectedTemperature) -> Self {
        Self {
            reflected_temperature,
            ..self
        }
    }

    pub fn with_max_ready_polls(self, max_ready_polls: Option<usize>) -> Self {
        Self {
            max_ready_polls,
            ..self
        }
    }

    pub fn with_bounds(self, bounds: TemperatureBounds) -> Self {
        Self { bounds, ..self }
    }

    /// Check the values that can't be enforced by their types.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if !(self.emissivity > 0.0 && self.emissivity <= 1.0) {
            return Err(LibraryError::InvalidData(
                "Emissivity must be greater than 0 and at most 1",
            ));
        }
        if self.address == 0 || self.address > 0x7F {
            return Err(LibraryError::InvalidData(
                "The I2C address must be a non-zero 7-bit address",
            ));
        }
        if self.max_ready_polls == Some(0) {
            return Err(LibraryError::InvalidData(
                "The status register must be polled at least once",
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            frame_rate: FrameRate::SixtyFour,
            emissivity: 0.95,
            reflected_temperature: ReflectedTemperature::default(),
            max_ready_polls: None,
            bounds: TemperatureBounds::default(),
        }
    }
}

/// The bounds could not be changed, as the lower bound would no longer be below the upper bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsError {
    pub lower: f64,
    pub upper: f64,
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lower bound {} must be less than upper bound {}",
            self.lower, self.upper
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BoundsError {}

/// The temperatures at either end of a display's colour scale, in ℃.
///
/// The lower bound is always strictly less than the upper bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureBounds {
    lower: f64,
    upper: f64,
}

impl TemperatureBounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, BoundsError> {
        // Written so that NaN fails as well
        if lower < upper {
            Ok(Self { lower, upper })
        } else {
            Err(BoundsError { lower, upper })
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn set_lower(&mut self, lower: f64) -> Result<(), BoundsError> {
        *self = Self::new(lower, self.upper)?;
        Ok(())
    }

    pub fn set_upper(&mut self, upper: f64) -> Result<(), BoundsError> {
        *self = Self::new(self.lower, upper)?;
        Ok(())
    }

    /// Map a temperature onto 0–1, clamping values outside of the bounds.
    pub fn normalise(&self, temperature: f64) -> f64 {
        let scaled = (temperature - self.lower) / (self.upper - self.lower);
        scaled.max(0.0).min(1.0)
    }
}

impl Default for TemperatureBounds {
    fn default() -> Self {
        Self {
            lower: 20.0,
            upper: 33.0,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::calculations::ReflectedTemperature;
    use crate::register::FrameRate;

    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.address, 0x33);
        assert_eq!(config.frame_rate, FrameRate::SixtyFour);
        assert_eq!(config.emissivity, 0.95);
        assert_eq!(
            config.reflected_temperature,
            ReflectedTemperature::AmbientOffset(-8.0)
        );
        assert_eq!(config.max_ready_polls, None);
        assert_eq!(config.bounds.lower(), 20.0);
        assert_eq!(config.bounds.upper(), 33.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders() {
        let config = SessionConfig::default()
            .with_address(0x30)
            .with_frame_rate(FrameRate::Eight)
            .with_emissivity(1.0)
            .with_max_ready_polls(Some(100));
        assert_eq!(config.address, 0x30);
        assert_eq!(config.frame_rate, FrameRate::Eight);
        assert_eq!(config.emissivity, 1.0);
        assert_eq!(config.max_ready_polls, Some(100));
    }

    #[test]
    fn invalid_config() {
        let base = SessionConfig::default();
        assert!(base.with_emissivity(0.0).validate().is_err());
        assert!(base.with_emissivity(1.01).validate().is_err());
        assert!(base.with_emissivity(f64::NAN).validate().is_err());
        assert!(base.with_address(0).validate().is_err());
        assert!(base.with_address(0x80).validate().is_err());
        assert!(base.with_max_ready_polls(Some(0)).validate().is_err());
    }

    #[test]
    fn bounds_ordering() {
        let mut bounds = TemperatureBounds::default();
        assert_eq!(
            bounds.set_lower(33.0),
            Err(BoundsError {
                lower: 33.0,
                upper: 33.0
            })
        );
        assert_eq!(bounds.lower(), 20.0);
        assert!(bounds.set_upper(15.0).is_err());
        assert_eq!(bounds.upper(), 33.0);
        bounds.set_lower(-10.0).unwrap();
        bounds.set_upper(50.0).unwrap();
        assert_eq!(bounds, TemperatureBounds::new(-10.0, 50.0).unwrap());
        assert!(TemperatureBounds::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn normalise() {
        let bounds = TemperatureBounds::new(20.0, 30.0).unwrap();
        assert_eq!(bounds.normalise(20.0), 0.0);
        assert_eq!(bounds.normalise(25.0), 0.5);
        assert_eq!(bounds.normalise(30.0), 1.0);
        assert_eq!(bounds.normalise(-40.0), 0.0);
        assert_eq!(bounds.normalise(100.0), 1.0);
    }
}
