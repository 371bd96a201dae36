//! The controller event pipeline: producers read physical devices, the
//! multiplexer rewrites the batch and consumers write virtual devices.
pub mod cache;
pub mod emitter;
pub mod event;
pub mod mapping;
pub mod multiplexer;
pub mod source;
pub mod target;
pub mod touchpad;

use std::{io, os::fd::RawFd};

use nix::errno::Errno;
use thiserror::Error;

use crate::{hid::RangeError, uhid::UhidError};

use self::event::Event;

/// Possible errors raised by producers and consumers
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A required device could not be found or opened
    #[error("device not ready: {0}")]
    NotReady(String),
    #[error("device i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Uhid(#[from] UhidError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("invariant violated: {0}")]
    Logic(String),
}

impl DeviceError {
    /// Device disappearance is expected during hot-plug and is retried quickly
    pub fn is_not_ready(&self) -> bool {
        match self {
            DeviceError::NotReady(_) => true,
            DeviceError::Io(e) => matches!(
                e.raw_os_error(),
                Some(code) if code == Errno::ENODEV as i32 || code == Errno::ENOENT as i32
            ),
            _ => false,
        }
    }
}

/// A source of events owning one or more OS handles.
pub trait Producer {
    /// Open the device and return the file descriptors to wait on. Calling
    /// open on an opened producer returns the same descriptors. Producers
    /// that cannot wait on a descriptor return none and are polled every
    /// iteration.
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError>;

    /// Drain the pending data of the descriptors in `ready` that belong to
    /// this producer. Never blocks.
    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError>;

    /// True while the producer holds events that are due without new data
    /// on its descriptors, so it gets produced on the next iteration.
    fn has_pending(&self) -> bool {
        false
    }

    /// Release the handles. Returns false if the device was kept alive in
    /// standby, e.g. in the controller cache.
    fn close(&mut self, exit: bool) -> bool;
}

/// A sink of events
pub trait Consumer {
    /// Handle a batch of events. Must tolerate an empty batch.
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError>;
}

/// An emulated controller reads feedback from the host and writes input
/// reports to it.
pub trait VirtualController: Producer + Consumer {}

impl<T: Producer + Consumer> VirtualController for T {}

/// A boxed component of a device graph. Dispatches the producer and
/// consumer calls of the loop to whatever the component supports.
pub enum Component {
    Producer(Box<dyn Producer + Send>),
    Consumer(Box<dyn Consumer + Send>),
    Controller(Box<dyn VirtualController + Send>),
}

impl Component {
    pub fn is_producer(&self) -> bool {
        !matches!(self, Component::Consumer(_))
    }

    pub fn is_consumer(&self) -> bool {
        !matches!(self, Component::Producer(_))
    }

    pub fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        match self {
            Component::Producer(p) => p.open(),
            Component::Controller(c) => c.open(),
            Component::Consumer(_) => Ok(vec![]),
        }
    }

    pub fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        match self {
            Component::Producer(p) => p.produce(ready),
            Component::Controller(c) => c.produce(ready),
            Component::Consumer(_) => Ok(vec![]),
        }
    }

    pub fn has_pending(&self) -> bool {
        match self {
            Component::Producer(p) => p.has_pending(),
            Component::Controller(c) => c.has_pending(),
            Component::Consumer(_) => false,
        }
    }

    pub fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        match self {
            Component::Consumer(q) => q.consume(events),
            Component::Controller(c) => c.consume(events),
            Component::Producer(_) => Ok(()),
        }
    }

    pub fn close(&mut self, exit: bool) -> bool {
        match self {
            Component::Producer(p) => p.close(exit),
            Component::Controller(c) => c.close(exit),
            Component::Consumer(_) => true,
        }
    }
}
