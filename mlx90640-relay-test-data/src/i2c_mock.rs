// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::blocking::i2c;

use crate::eeprom_data::{mlx90640_datasheet_eeprom, EEPROM_LENGTH};
use crate::ram_data::{
    datasheet_frame, CONTROL_REGISTER_CHESS, RAM_LENGTH, STATUS_SUBPAGE_0_READY,
};

const STATUS_REGISTER_ADDRESS: u16 = 0x8000;

// The three least significant bits are read-only, and only bits 3 through 5 are documented as
// writable.
const STATUS_REGISTER_WRITE_MASK: u16 = 0x0038;

const STATUS_NEW_DATA: u16 = 0x0008;

const STATUS_START_MEASUREMENT: u16 = 0x0020;

const CONTROL_REGISTER_ADDRESS: u16 = 0x800D;

// Only the top three bits of control register 1 are reserved.
const CONTROL_REGISTER_WRITE_MASK: u16 = 0x1FFF;

const RECENT_OPERATIONS_QUEUE_LENGTH: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// The given address shouldn't be accessed.
    IllegalAccess(u16),

    /// The given address should not be written to.
    IllegalWriteAddress(u16),

    /// The given value is illegal for the given location.
    IllegalWriteValue(u16, u16),

    /// The given address isn't valid for the device.
    UnknownMemoryAddress(u16),

    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The requested operation is not allowed.
    ///
    /// This covers things situations such as:
    /// * A combined write-read transaction with a write amount other than 2 bytes.
    /// * A write-read transaction with a 0-length read.
    /// * Operations that aren't transferring a full number of words (each word is two bytes).
    IllegalOperation,

    /// A failure requested by the test through [`MockCameraBus::inject_failure`].
    InjectedFailure(u16),
}

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for MockError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cOperation {
    Write { address: u16, length: usize },
    Read { address: u16, length: usize },
}

#[derive(Debug)]
struct MockState {
    eeprom: [u16; EEPROM_LENGTH],
    ram: [u16; RAM_LENGTH],
    status: u16,
    control: u16,
    /// Frames (RAM contents and the subpage they belong to) to load when the next measurement
    /// completes.
    queued_frames: VecDeque<([u16; RAM_LENGTH], u16)>,
    measurement_pending: bool,
    status_reads_until_ready: usize,
    measurement_latency: usize,
    inject_failure_at: Option<u16>,
    recent_operations: VecDeque<I2cOperation>,
}

/// A simulated MLX90640 on an I²C bus.
///
/// Clones share the same device state, so a test can keep a handle to the bus after handing a
/// clone to the code under test. Triggering a measurement (setting the start bit in the status
/// register) makes the "device" finish that measurement after a configurable number of status
/// register reads. When it finishes, the next queued frame is loaded, or if there are none the
/// current RAM is kept and the subpage alternates.
#[derive(Clone, Debug)]
pub struct MockCameraBus {
    i2c_address: u8,
    ram_range: RangeInclusive<u16>,
    eeprom_range: RangeInclusive<u16>,
    state: Arc<Mutex<MockState>>,
}

impl MockCameraBus {
    pub fn new(
        i2c_address: u8,
        eeprom: [u16; EEPROM_LENGTH],
        ram: [u16; RAM_LENGTH],
        control_register: u16,
        status_register: u16,
    ) -> Self {
        Self {
            i2c_address,
            ram_range: 0x0400..=0x073F,
            eeprom_range: 0x2400..=0x273F,
            state: Arc::new(Mutex::new(MockState {
                eeprom,
                ram,
                status: status_register,
                control: control_register,
                queued_frames: VecDeque::new(),
                measurement_pending: false,
                status_reads_until_ready: 0,
                measurement_latency: 1,
                inject_failure_at: None,
                recent_operations: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock means another test thread already panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_injected_failure(
        state: &mut MockState,
        address: u16,
        words: usize,
    ) -> Result<(), MockError> {
        if let Some(target) = state.inject_failure_at {
            if (address..address + words as u16).contains(&target) {
                state.inject_failure_at = None;
                return Err(MockError::InjectedFailure(target));
            }
        }
        Ok(())
    }

    fn read_status(state: &mut MockState) -> u16 {
        if state.measurement_pending {
            if state.status_reads_until_ready == 0 {
                let next_subpage = match state.queued_frames.pop_front() {
                    Some((frame, subpage)) => {
                        state.ram = frame;
                        subpage & 0x0001
                    }
                    None => (state.status & 0x0001) ^ 0x0001,
                };
                state.status = (state.status & !(0x0007 | STATUS_START_MEASUREMENT))
                    | next_subpage
                    | STATUS_NEW_DATA;
                state.measurement_pending = false;
            } else {
                state.status_reads_until_ready -= 1;
            }
        }
        state.status
    }

    fn get(
        &self,
        state: &mut MockState,
        address: u16,
        destination: &mut [u16],
    ) -> Result<(), MockError> {
        let count = destination.len() as u16;
        let end_address = address + count - 1;
        if self.ram_range.contains(&address) {
            if !self.ram_range.contains(&end_address) {
                return Err(MockError::IllegalAccess(end_address));
            }
            let start = (address - self.ram_range.start()) as usize;
            destination.copy_from_slice(&state.ram[start..(start + destination.len())]);
            Ok(())
        } else if self.eeprom_range.contains(&address) {
            if !self.eeprom_range.contains(&end_address) {
                return Err(MockError::IllegalAccess(end_address));
            }
            let start = (address - self.eeprom_range.start()) as usize;
            destination.copy_from_slice(&state.eeprom[start..(start + destination.len())]);
            Ok(())
        } else if count != 1 {
            // The registers are non-contiguous, so only 1 word can be read at a time.
            Err(MockError::IllegalAccess(address))
        } else {
            destination[0] = match address {
                STATUS_REGISTER_ADDRESS => Self::read_status(state),
                CONTROL_REGISTER_ADDRESS => state.control,
                _ => return Err(MockError::UnknownMemoryAddress(address)),
            };
            Ok(())
        }
    }

    fn set(&self, state: &mut MockState, address: u16, value: u16) -> Result<(), MockError> {
        match address {
            STATUS_REGISTER_ADDRESS => {
                if !check_new_against_mask(state.status, STATUS_REGISTER_WRITE_MASK, value) {
                    return Err(MockError::IllegalWriteValue(address, value));
                }
                state.status = (state.status & !STATUS_REGISTER_WRITE_MASK)
                    | (value & STATUS_REGISTER_WRITE_MASK);
                if value & STATUS_START_MEASUREMENT != 0 {
                    state.measurement_pending = true;
                    state.status_reads_until_ready = state.measurement_latency;
                }
                Ok(())
            }
            CONTROL_REGISTER_ADDRESS => {
                if !check_new_against_mask(state.control, CONTROL_REGISTER_WRITE_MASK, value) {
                    return Err(MockError::IllegalWriteValue(address, value));
                }
                state.control = value;
                Ok(())
            }
            // Only the camera writes its RAM, and the EEPROM is treated as read-only here.
            _ if self.ram_range.contains(&address) || self.eeprom_range.contains(&address) => {
                Err(MockError::IllegalWriteAddress(address))
            }
            _ => Err(MockError::UnknownMemoryAddress(address)),
        }
    }

    /// Replace the current RAM and status register.
    ///
    /// This function does *not* explicitly set the "new data available" flag. The given status
    /// register value is used as-is.
    pub fn update_frame(&self, ram: [u16; RAM_LENGTH], status_register: u16) {
        let mut state = self.lock();
        state.ram = ram;
        state.status = status_register;
    }

    /// Queue a frame to be loaded when the next triggered measurement completes.
    pub fn queue_frame(&self, ram: [u16; RAM_LENGTH], subpage: u16) {
        self.lock().queued_frames.push_back((ram, subpage));
    }

    /// Set the "new data available" flag in the status register to a new value.
    pub fn set_data_available(&self, available: bool) {
        let mut state = self.lock();
        if available {
            state.status |= STATUS_NEW_DATA;
        } else {
            state.status &= !STATUS_NEW_DATA;
        }
    }

    /// Set how many status register reads a triggered measurement stays pending for.
    pub fn set_measurement_latency(&self, status_reads: usize) {
        self.lock().measurement_latency = status_reads;
    }

    /// Fail the next operation that touches the given address.
    pub fn inject_failure(&self, address: u16) {
        self.lock().inject_failure_at = Some(address);
    }

    pub fn status_register(&self) -> u16 {
        self.lock().status
    }

    pub fn control_register(&self) -> u16 {
        self.lock().control
    }

    /// The most recent operations, newest first.
    pub fn recent_operations(&self) -> Vec<I2cOperation> {
        self.lock().recent_operations.iter().copied().collect()
    }

    pub fn clear_recent_operations(&self) {
        self.lock().recent_operations.clear()
    }

    fn add_operation(state: &mut MockState, operation: I2cOperation) {
        state.recent_operations.push_front(operation);
        state.recent_operations.truncate(RECENT_OPERATIONS_QUEUE_LENGTH);
    }
}

impl i2c::Write for MockCameraBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Plain writes are always a single register: two address bytes and two data bytes.
        if bytes.len() != 4 {
            return Err(MockError::IllegalOperation);
        }
        let address = u16::from_be_bytes([bytes[0], bytes[1]]);
        let value = u16::from_be_bytes([bytes[2], bytes[3]]);
        let mut state = self.lock();
        Self::check_injected_failure(&mut state, address, 1)?;
        Self::add_operation(&mut state, I2cOperation::Write { address, length: 2 });
        self.set(&mut state, address, value)
    }
}

impl i2c::WriteRead for MockCameraBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Write-reads should only be writing the address, so write_buffer should only be two bytes
        if write_buffer.len() != 2 || out_buffer.is_empty() || out_buffer.len() % 2 != 0 {
            return Err(MockError::IllegalOperation);
        }
        let address = u16::from_be_bytes([write_buffer[0], write_buffer[1]]);
        let word_count = out_buffer.len() / 2;
        let mut state = self.lock();
        Self::check_injected_failure(&mut state, address, word_count)?;
        Self::add_operation(
            &mut state,
            I2cOperation::Read {
                address,
                length: out_buffer.len(),
            },
        );
        let mut words = vec![0u16; word_count];
        self.get(&mut state, address, &mut words)?;
        out_buffer
            .chunks_exact_mut(2)
            .zip(words.iter())
            .for_each(|(bytes, word)| bytes.copy_from_slice(&word.to_be_bytes()));
        Ok(())
    }
}

fn check_new_against_mask(existing: u16, mask: u16, new: u16) -> bool {
    (new & !mask) == (existing & !mask)
}

/// A mock MLX90640 loaded with the datasheet worked example, with subpage 0 ready.
pub fn datasheet_mlx90640_at_address(i2c_address: u8) -> MockCameraBus {
    MockCameraBus::new(
        i2c_address,
        mlx90640_datasheet_eeprom(),
        datasheet_frame(),
        CONTROL_REGISTER_CHESS,
        STATUS_SUBPAGE_0_READY,
    )
}

#[cfg(test)]
mod test {
    use embedded_hal::blocking::i2c::{Write, WriteRead};

    use super::*;

    fn read_word(bus: &mut MockCameraBus, address: u16) -> Result<u16, MockError> {
        let mut bytes = [0u8; 2];
        bus.write_read(0x33, &address.to_be_bytes(), &mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    #[test]
    fn reads_are_big_endian() {
        let mut bus = datasheet_mlx90640_at_address(0x33);
        assert_eq!(read_word(&mut bus, 0x2410).unwrap(), 0x4210);
        assert_eq!(read_word(&mut bus, 0x0400 + 768).unwrap(), 0x4bf2);
    }

    #[test]
    fn read_only_status_bits_are_protected() {
        let mut bus = datasheet_mlx90640_at_address(0x33);
        bus.update_frame(datasheet_frame(), 0x0009);
        assert_eq!(
            bus.write(0x33, &[0x80, 0x00, 0x00, 0x30]),
            Err(MockError::IllegalWriteValue(0x8000, 0x0030))
        );
        assert!(bus.write(0x33, &[0x80, 0x00, 0x00, 0x31]).is_ok());
    }

    #[test]
    fn measurement_completes_after_latency() {
        let mut bus = datasheet_mlx90640_at_address(0x33);
        bus.set_measurement_latency(2);
        bus.write(0x33, &[0x80, 0x00, 0x00, 0x30]).unwrap();
        assert_eq!(read_word(&mut bus, 0x8000).unwrap() & 0x0008, 0);
        assert_eq!(read_word(&mut bus, 0x8000).unwrap() & 0x0008, 0);
        let status = read_word(&mut bus, 0x8000).unwrap();
        assert_eq!(status & 0x0008, 0x0008);
        // No frames were queued, so the subpage flips.
        assert_eq!(status & 0x0001, 1);
    }

    #[test]
    fn injected_failure_is_one_shot() {
        let mut bus = datasheet_mlx90640_at_address(0x33);
        bus.inject_failure(0x8000);
        assert_eq!(
            read_word(&mut bus, 0x8000),
            Err(MockError::InjectedFailure(0x8000))
        );
        assert!(read_word(&mut bus, 0x8000).is_ok());
    }

    #[test]
    fn wrong_i2c_address() {
        let mut bus = datasheet_mlx90640_at_address(0x33);
        let mut bytes = [0u8; 2];
        assert_eq!(
            bus.write_read(0x34, &[0x80, 0x00], &mut bytes),
            Err(MockError::UnknownI2cAddress(0x34))
        );
    }
}
