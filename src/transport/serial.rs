//! Serial/USB transport implementation.
//!
//! This module provides serial port communication for the rig's
//! microcontroller connected via a USB-serial adapter.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::config::duration_ms;
use crate::error::{Error, Result};
use crate::transport::{Connector, Link};

/// Default baud rate for the rig's UART.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default base timeout for port I/O.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for serial transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Base timeout applied to port I/O.
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0")
    }
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the base timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial port.
pub struct SerialLink {
    stream: Option<SerialStream>,
}

impl SerialLink {
    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

impl Link for SerialLink {
    fn read_available(&mut self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            let stream = self.stream()?;
            let pending = SerialPort::bytes_to_read(stream).map_err(Error::Serial)? as usize;
            if pending == 0 {
                return Ok(Vec::new());
            }

            let mut buf = vec![0u8; pending];
            let n = stream.read(&mut buf).await.map_err(Error::Io)?;
            buf.truncate(n);
            tracing::trace!("received {} bytes", n);
            Ok(buf)
        })
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let stream = self.stream()?;
            tracing::trace!("sending {} bytes", data.len());
            stream.write_all(&data).await.map_err(Error::Io)?;
            stream.flush().await.map_err(Error::Io)?;
            Ok(())
        })
    }

    fn reset_buffers(&mut self) -> Result<()> {
        SerialPort::clear(self.stream()?, ClearBuffer::All).map_err(Error::Serial)
    }

    fn is_open(&self) -> bool {
        // An unplugged adapter fails the pending-byte query.
        self.stream
            .as_ref()
            .is_some_and(|stream| SerialPort::bytes_to_read(stream).is_ok())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("serial port closed");
        }
    }
}

/// Opens [`SerialLink`]s with tokio-serial.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open<'a>(&'a self, config: &'a SerialConfig) -> BoxFuture<'a, Result<Box<dyn Link>>> {
        Box::pin(async move {
            tracing::info!(
                "opening serial port {} at {} baud",
                config.port,
                config.baud_rate
            );

            let mut stream = tokio_serial::new(&config.port, config.baud_rate)
                .timeout(config.timeout)
                .open_native_async()
                .map_err(Error::Serial)?;

            // Toggling DTR/RTS resets the microcontroller
            if let Err(e) = SerialPort::write_data_terminal_ready(&mut stream, false) {
                tracing::warn!("failed to clear DTR: {}", e);
            }
            if let Err(e) = SerialPort::write_request_to_send(&mut stream, false) {
                tracing::warn!("failed to clear RTS: {}", e);
            }

            Ok(Box::new(SerialLink {
                stream: Some(stream),
            }) as Box<dyn Link>)
        })
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
