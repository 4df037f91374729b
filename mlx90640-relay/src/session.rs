// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Running acquisition and reception on their own threads.
//!
//! Completed matrices are handed from one thread to another as [`Arc`] snapshots. The snapshot is
//! copied out of the acquirer when it is published, so nothing mutable is shared between threads.
//! Neither loop can be cancelled partway through a blocking call: acquisition checks its shutdown
//! flag between full acquisitions, and a receiver only stops when its stream is closed.
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use log::{debug, info, warn};

use crate::config::TemperatureBounds;
use crate::driver::FrameAcquirer;
use crate::error::Error;
use crate::frame::TemperatureMatrix;
use crate::stream::{read_matrix, write_matrix, StreamError};
use crate::transport::RegisterTransport;

/// Something that wants to know about every completed matrix.
pub trait FrameObserver {
    /// Called with each completed matrix and the bounds it should be displayed with.
    ///
    /// Returning `false` means the observer is done, and no more frames will be given to it.
    fn on_frame(&mut self, frame: Arc<TemperatureMatrix>, bounds: &TemperatureBounds) -> bool;
}

impl FrameObserver for Sender<Arc<TemperatureMatrix>> {
    fn on_frame(&mut self, frame: Arc<TemperatureMatrix>, _bounds: &TemperatureBounds) -> bool {
        self.send(frame).is_ok()
    }
}

/// A [`FrameObserver`] calling a closure, created by [`observer_fn`].
#[derive(Clone, Debug)]
pub struct ObserverFn<F>(F);

/// Wrap a closure as a [`FrameObserver`].
pub fn observer_fn<F>(function: F) -> ObserverFn<F>
where
    F: FnMut(&TemperatureMatrix, &TemperatureBounds) -> bool,
{
    ObserverFn(function)
}

impl<F> FrameObserver for ObserverFn<F>
where
    F: FnMut(&TemperatureMatrix, &TemperatureBounds) -> bool,
{
    fn on_frame(&mut self, frame: Arc<TemperatureMatrix>, bounds: &TemperatureBounds) -> bool {
        (self.0)(&frame, bounds)
    }
}

/// The only writer for a stream of matrices.
///
/// As an observer it stops accepting frames after the first failed send, since the connection
/// is unusable after that.
#[derive(Debug)]
pub struct FrameSender<W> {
    writer: W,
    frames_sent: usize,
}

impl<W: Write> FrameSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_sent: 0,
        }
    }

    pub fn send(&mut self, matrix: &TemperatureMatrix) -> Result<(), StreamError> {
        write_matrix(&mut self.writer, matrix.as_slice())?;
        self.frames_sent += 1;
        Ok(())
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameObserver for FrameSender<W> {
    fn on_frame(&mut self, frame: Arc<TemperatureMatrix>, _bounds: &TemperatureBounds) -> bool {
        match self.send(&frame) {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "Dropping connection after {} frames: {}",
                    self.frames_sent, err
                );
                false
            }
        }
    }
}

/// How an acquisition thread ended, along with the acquirer so another session can be started.
pub struct AcquisitionExit<T: RegisterTransport> {
    pub acquirer: FrameAcquirer<T>,

    /// The number of full matrices published.
    pub frames: usize,

    /// `None` if the thread was shut down or the observer was done.
    pub error: Option<Error<T>>,
}

/// Acquire full matrices on a new thread until told to stop.
///
/// A snapshot of every merged matrix is given to `observer`. The thread stops when `shutdown` is
/// set, when the observer is done, or when a cycle fails. Failed cycles are not retried here, the
/// error is handed back with the acquirer instead.
pub fn spawn_acquisition<T, O>(
    acquirer: FrameAcquirer<T>,
    observer: O,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<AcquisitionExit<T>>
where
    T: RegisterTransport + Send + 'static,
    T::Error: Send + 'static,
    O: FrameObserver + Send + 'static,
{
    let mut acquirer = acquirer;
    let mut observer = observer;
    thread::spawn(move || {
        info!("Acquisition started");
        let bounds = acquirer.config().bounds;
        let mut frames = 0usize;
        let error = loop {
            if shutdown.load(Ordering::Acquire) {
                debug!("Shutdown requested");
                break None;
            }
            let snapshot = match acquirer.acquire() {
                Ok(matrix) => Arc::new(matrix.clone()),
                Err(err) => break Some(err),
            };
            frames += 1;
            if !observer.on_frame(snapshot, &bounds) {
                debug!("Observer stopped accepting frames");
                break None;
            }
        };
        match &error {
            Some(err) => warn!("Acquisition stopped after {} frames: {}", frames, err),
            None => info!("Acquisition stopped after {} frames", frames),
        }
        AcquisitionExit {
            acquirer,
            frames,
            error,
        }
    })
}

/// Decode matrices from `reader` on a new thread, handing each one to `observer`.
///
/// The thread ends with the number of matrices received once the stream is closed or the
/// observer is done, or with the first protocol error. Each message must hold a full matrix.
pub fn spawn_receiver<R, O>(
    reader: R,
    observer: O,
    bounds: TemperatureBounds,
) -> JoinHandle<Result<usize, StreamError>>
where
    R: Read + Send + 'static,
    O: FrameObserver + Send + 'static,
{
    let mut reader = reader;
    let mut observer = observer;
    thread::spawn(move || {
        info!("Receiver started");
        let mut frames = 0usize;
        let result = loop {
            let values = match read_matrix(&mut reader) {
                Ok(values) => values,
                Err(StreamError::Closed) => break Ok(frames),
                Err(err) => break Err(err),
            };
            let matrix = match TemperatureMatrix::from_values(&values) {
                Ok(matrix) => matrix,
                Err(_) => break Err(StreamError::UnexpectedValueCount(values.len())),
            };
            frames += 1;
            if !observer.on_frame(Arc::new(matrix), &bounds) {
                break Ok(frames);
            }
        };
        match &result {
            Ok(count) => info!("Receiver stopped after {} frames", count),
            Err(err) => warn!("Receiver stopped after {} frames: {}", frames, err),
        }
        result
    })
}
