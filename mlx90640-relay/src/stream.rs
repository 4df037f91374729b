// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The binary format used to move temperature matrices between nodes.
//!
//! Each message is a little-endian `u16` giving the payload length in bytes, followed by the
//! payload: the temperatures as little-endian IEEE 754 doubles, row-major. A full matrix is 768
//! values, so 6144 bytes. The prefix limits a payload to 65535 bytes, which is 8191 values.
use std::fmt;
use std::io::{self, Read, Write};
use std::vec;
use std::vec::Vec;

/// The longest payload that can be sent, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = u16::MAX as usize;

/// The most values that fit in one message.
pub const MAX_VALUES: usize = MAX_PAYLOAD_BYTES / VALUE_BYTES;

const VALUE_BYTES: usize = core::mem::size_of::<f64>();

const PREFIX_BYTES: usize = core::mem::size_of::<u16>();

#[derive(Debug)]
pub enum StreamError {
    /// The payload would be longer than [`MAX_PAYLOAD_BYTES`]. The value is the attempted length.
    PayloadTooLong(usize),

    /// The stream ended partway through a message.
    Truncated,

    /// The payload length is not a whole number of values.
    MisalignedPayload(usize),

    /// The payload decoded, but not into the number of values the receiver expects.
    UnexpectedValueCount(usize),

    /// The stream ended cleanly, between messages.
    Closed,

    Io(io::Error),
}

impl StreamError {
    /// Whether the peer went away, as opposed to sending something malformed.
    pub fn is_disconnect(&self) -> bool {
        match self {
            StreamError::Closed | StreamError::Truncated => true,
            StreamError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::PayloadTooLong(length) => write!(
                f,
                "Payload of {} bytes is longer than the {} byte limit",
                length, MAX_PAYLOAD_BYTES
            ),
            StreamError::Truncated => write!(f, "Stream ended partway through a message"),
            StreamError::MisalignedPayload(length) => write!(
                f,
                "Payload of {} bytes is not a whole number of values",
                length
            ),
            StreamError::UnexpectedValueCount(count) => {
                write!(f, "Received {} values instead of a full matrix", count)
            }
            StreamError::Closed => write!(f, "Stream closed"),
            StreamError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            StreamError::Truncated
        } else {
            StreamError::Io(err)
        }
    }
}

/// Encode a full message (length prefix included) for the given values.
pub fn encode_matrix(values: &[f64]) -> Result<Vec<u8>, StreamError> {
    let payload_length = values.len() * VALUE_BYTES;
    if payload_length > MAX_PAYLOAD_BYTES {
        return Err(StreamError::PayloadTooLong(payload_length));
    }
    let mut message = Vec::with_capacity(PREFIX_BYTES + payload_length);
    message.extend_from_slice(&(payload_length as u16).to_le_bytes());
    values
        .iter()
        .for_each(|value| message.extend_from_slice(&value.to_le_bytes()));
    Ok(message)
}

/// Decode a payload (without the length prefix) into values.
pub fn decode_payload(payload: &[u8]) -> Result<Vec<f64>, StreamError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(StreamError::PayloadTooLong(payload.len()));
    }
    let chunks = payload.chunks_exact(VALUE_BYTES);
    if !chunks.remainder().is_empty() {
        return Err(StreamError::MisalignedPayload(payload.len()));
    }
    Ok(chunks
        .map(|bytes| {
            let mut value = [0u8; VALUE_BYTES];
            value.copy_from_slice(bytes);
            f64::from_le_bytes(value)
        })
        .collect())
}

/// Write one message and flush it.
///
/// The message is written with a single call, so the prefix and payload are never split up by
/// other writers of the same stream.
pub fn write_matrix<W: Write>(writer: &mut W, values: &[f64]) -> Result<(), StreamError> {
    let message = encode_matrix(values)?;
    writer.write_all(&message)?;
    writer.flush()?;
    Ok(())
}

/// Read one message, blocking until all of it has arrived.
///
/// Returns [`StreamError::Closed`] if the stream ends before any of the length prefix is read.
pub fn read_matrix<R: Read>(reader: &mut R) -> Result<Vec<f64>, StreamError> {
    let mut prefix = [0u8; PREFIX_BYTES];
    let first = loop {
        match reader.read(&mut prefix) {
            Ok(0) => return Err(StreamError::Closed),
            Ok(count) => break count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };
    reader.read_exact(&mut prefix[first..])?;
    let payload_length = usize::from(u16::from_le_bytes(prefix));
    let mut payload = vec![0u8; payload_length];
    reader.read_exact(&mut payload)?;
    decode_payload(&payload)
}
