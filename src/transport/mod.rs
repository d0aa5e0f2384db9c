//! Transport layer for the rig's physical link.
//!
//! [`Link`] is an open channel, [`Connector`] opens one. The only real
//! implementation is USB/Serial; tests plug in a simulated device.

pub mod serial;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;

pub use serial::{SerialConfig, SerialConnector, SerialLink};

/// An open physical channel to the device.
///
/// Callers must hold the link slot's lock for every call.
pub trait Link: Send {
    /// Reads whatever bytes are already waiting. Never blocks for more.
    fn read_available(&mut self) -> BoxFuture<'_, Result<Vec<u8>>>;

    /// Writes and flushes `data`.
    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Discards pending input and output in the driver buffers.
    fn reset_buffers(&mut self) -> Result<()>;

    /// Liveness hint. A half-dead adapter may still report open.
    fn is_open(&self) -> bool;

    /// Releases the channel. Idempotent.
    fn close(&mut self);
}

/// Opens links to the device.
pub trait Connector: Send + Sync {
    /// Acquires the physical channel described by `config`.
    fn open<'a>(&'a self, config: &'a SerialConfig) -> BoxFuture<'a, Result<Box<dyn Link>>>;
}
