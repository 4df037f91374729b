// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use log::{debug, trace, warn};
use paste::paste;

use crate::calculations::{convert_subpage, SubpageTemperatures};
use crate::calibration::CalibrationSet;
use crate::common::{EEPROM_BASE, FRAME_WORDS, RAM_BASE};
use crate::config::SessionConfig;
use crate::error::{Error, LibraryError};
use crate::frame::{RawFrame, TemperatureMatrix};
use crate::register::*;
use crate::transport::RegisterTransport;

/// DRY macro for the set_* methods in `FrameAcquirer` that modify a control register field.
macro_rules! set_register_field {
    { $field:ident, $typ:ty, $doc:literal } => {
    paste! {
        #[doc = $doc]
        pub fn [< set_ $field >](&mut self, new_value: $typ) -> Result<(), Error<T>> {
            let mut current = self.control_register()?;
            if current.$field() != new_value {
                current.[< set_ $field >](new_value);
                self.set_control_register(current)
            } else {
                Ok(())
            }
        }
    }};
}

/// Where a [`FrameAcquirer`] is in a measurement cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AcquisitionState {
    /// Nothing in progress. This is also where a cycle ends up if it fails.
    Idle,

    /// Waiting for the camera to report new data.
    PollingReady,

    /// The next measurement has been requested.
    Triggered,

    /// Reading the frame and register state off of the camera.
    Reading,

    /// The subpage has been converted and merged.
    Converted,
}

/// Drives a camera through measurement cycles and keeps the merged temperature image.
///
/// Each cycle measures one subpage (half of the pixels), so two cycles are needed before a full
/// image is available. [`acquire`][FrameAcquirer::acquire] runs both.
///
/// There are no timeouts by default; if the camera never reports new data, acquisition will wait
/// forever. [`SessionConfig::max_ready_polls`] bounds the wait.
#[derive(Clone, Debug)]
pub struct FrameAcquirer<T: RegisterTransport> {
    transport: T,

    calibration: CalibrationSet,

    config: SessionConfig,

    /// The control register as of the last frame read.
    control: ControlRegister,

    /// The status register as of the last frame read.
    status: StatusRegister,

    /// Buffer for reading frames off of the camera.
    frame: RawFrame,

    matrix: TemperatureMatrix,

    ambient_temperature: Option<f64>,

    state: AcquisitionState,
}

impl<T> FrameAcquirer<T>
where
    T: RegisterTransport,
{
    /// Start a session with a camera, loading its calibration data.
    ///
    /// The configured frame rate is applied before the EEPROM is read.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self, Error<T>> {
        config.validate()?;
        let mut transport = transport;
        let control_raw = transport
            .read_word(ControlRegister::address())
            .map_err(Error::TransportError)?;
        let mut control = ControlRegister::from(control_raw);
        control.set_frame_rate(config.frame_rate);
        let new_control = masked_update(control_raw, control);
        debug!(
            "Setting the control register from {:#06X} to {:#06X} ({}Hz)",
            control_raw,
            new_control,
            config.frame_rate.hertz()
        );
        transport
            .write_word(ControlRegister::address(), new_control)
            .map_err(Error::TransportError)?;
        let mut eeprom = [0u16; FRAME_WORDS];
        transport
            .read_words(EEPROM_BASE, &mut eeprom)
            .map_err(Error::TransportError)?;
        let calibration = CalibrationSet::from_eeprom(&eeprom)?;
        Self::with_calibration(transport, calibration, config)
    }

    /// Start a session with previously loaded calibration data.
    pub fn with_calibration(
        transport: T,
        calibration: CalibrationSet,
        config: SessionConfig,
    ) -> Result<Self, Error<T>> {
        config.validate()?;
        let mut transport = transport;
        let control = transport
            .read_word(ControlRegister::address())
            .map_err(Error::TransportError)?
            .into();
        Ok(Self {
            transport,
            calibration,
            config,
            control,
            status: StatusRegister::from(0),
            frame: RawFrame::default(),
            matrix: TemperatureMatrix::default(),
            ambient_temperature: None,
            state: AcquisitionState::Idle,
        })
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// The merged image, as of the last successful cycle.
    pub fn matrix(&self) -> &TemperatureMatrix {
        &self.matrix
    }

    /// The most recently calculated ambient temperature.
    ///
    /// `None` until a cycle has completed.
    pub fn ambient_temperature(&self) -> Option<f64> {
        self.ambient_temperature
    }

    /// Replace the emissivity used for the following cycles.
    pub fn set_emissivity(&mut self, emissivity: f64) -> Result<(), LibraryError> {
        let config = self.config.with_emissivity(emissivity);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Give back the transport, ending the session.
    pub fn release(self) -> T {
        self.transport
    }

    fn control_register(&mut self) -> Result<ControlRegister, Error<T>> {
        let raw = self
            .transport
            .read_word(ControlRegister::address())
            .map_err(Error::TransportError)?;
        self.control = raw.into();
        Ok(self.control)
    }

    fn set_control_register(&mut self, register: ControlRegister) -> Result<(), Error<T>> {
        let current = self
            .transport
            .read_word(ControlRegister::address())
            .map_err(Error::TransportError)?;
        self.transport
            .write_word(ControlRegister::address(), masked_update(current, register))
            .map_err(Error::TransportError)?;
        self.control = register;
        Ok(())
    }

    /// Read the frame rate from the camera.
    pub fn frame_rate(&mut self) -> Result<FrameRate, Error<T>> {
        Ok(self.control_register()?.frame_rate())
    }

    set_register_field! {
        frame_rate,
        FrameRate,
        "Set camera's frame rate."
    }

    /// Get the current resolution of the ADC in the camera.
    ///
    /// The default resolution is [18 bits][Resolution::Eighteen].
    pub fn resolution(&mut self) -> Result<Resolution, Error<T>> {
        Ok(self.control_register()?.resolution())
    }

    set_register_field! {
        resolution,
        Resolution,
        "Set ADC resolution within the camera."
    }

    /// Get the current access pattern used by the camera when updating subpages.
    pub fn access_pattern(&mut self) -> Result<AccessPattern, Error<T>> {
        Ok(self.control_register()?.access_pattern())
    }

    set_register_field! {
        access_pattern,
        AccessPattern,
        "Set the access pattern used by the camera."
    }

    /// Busy-poll the status register until the camera reports new data.
    ///
    /// The raw register value is returned so the read-only bits can be written back unchanged.
    fn poll_ready(&mut self) -> Result<u16, Error<T>> {
        let mut polls = 0usize;
        loop {
            let raw = self
                .transport
                .read_word(StatusRegister::address())
                .map_err(Error::TransportError)?;
            polls += 1;
            if StatusRegister::from(raw).new_data() {
                trace!("New data available after {} polls", polls);
                return Ok(raw);
            }
            if let Some(max_polls) = self.config.max_ready_polls {
                if polls >= max_polls {
                    return Err(LibraryError::NotReady(polls).into());
                }
            }
            core::hint::spin_loop();
        }
    }

    fn run_cycle(&mut self) -> Result<SubpageTemperatures, Error<T>> {
        self.state = AcquisitionState::PollingReady;
        let status_raw = self.poll_ready()?;

        self.state = AcquisitionState::Triggered;
        let mut trigger = StatusRegister::from(status_raw);
        trigger.trigger_measurement();
        self.transport
            .write_word(
                StatusRegister::address(),
                masked_update(status_raw, trigger),
            )
            .map_err(Error::TransportError)?;

        self.state = AcquisitionState::Reading;
        self.transport
            .read_words(RAM_BASE, self.frame.words_mut())
            .map_err(Error::TransportError)?;
        // The subpage the frame belongs to, and the settings it was measured with.
        let status = self
            .transport
            .read_word(StatusRegister::address())
            .map_err(Error::TransportError)?
            .into();
        let control = self.control_register()?;
        self.status = status;

        let subpage = self.status.last_updated_subpage();
        let temperatures = convert_subpage(
            &self.frame,
            &self.calibration,
            control,
            subpage,
            self.config.emissivity,
            self.config.reflected_temperature,
        );
        self.matrix.merge_subpage(&temperatures.values);
        self.ambient_temperature = Some(temperatures.t_a);
        self.state = AcquisitionState::Converted;
        trace!(
            "Converted subpage {:?} (T_a = {:.2}, V_dd = {:.3})",
            subpage,
            temperatures.t_a,
            temperatures.v_dd
        );
        Ok(temperatures)
    }

    /// Measure one subpage and merge it into the image.
    ///
    /// On failure the image and calibration data are unchanged and the acquirer is back in the
    /// [`Idle`][AcquisitionState::Idle] state, ready for another attempt.
    pub fn acquire_subpage(&mut self) -> Result<SubpageTemperatures, Error<T>> {
        let result = self.run_cycle();
        if let Err(err) = &result {
            warn!("Acquisition cycle failed: {}", err);
            self.state = AcquisitionState::Idle;
        }
        result
    }

    /// Measure both subpages and return the merged image.
    pub fn acquire(&mut self) -> Result<&TemperatureMatrix, Error<T>> {
        self.acquire_subpage()?;
        self.acquire_subpage()?;
        Ok(&self.matrix)
    }
}
