//! Simulated rig for exercising the bridge without hardware.
//!
//! [`SimDevice`] stands in for the microcontroller behind the serial port.
//! Links it hands out record every call and flag any two calls that overlap,
//! so tests can check that nothing touches the wire concurrently.

#![cfg(test)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::config::{BridgeConfig, ClearRitual};
use crate::error::{Error, Result};
use crate::transport::{Connector, Link, SerialConfig};

/// Acknowledgment frame the simulated firmware sends back.
pub const ACK: &str = r#"{"status":"ok"}"#;

/// Bridge configuration with short delays for tests.
pub fn test_config() -> BridgeConfig {
    BridgeConfig::new(SerialConfig::new("/dev/ttySIM0"))
        .settle_delay(Duration::from_millis(20))
        .open_clear(ClearRitual::new(2, Duration::from_millis(5)))
        .send_clear(ClearRitual::new(3, Duration::from_millis(2)))
        .response_poll(Duration::from_millis(10))
        .listener_interval(Duration::from_millis(10))
        .watchdog_interval(Duration::from_millis(200))
}

/// Link operation kinds recorded by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
    Reset,
}

/// How the simulated firmware answers a configuration write.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send `text` after `delay`.
    After { text: String, delay: Duration },
    /// Never answer.
    Silent,
}

#[derive(Debug)]
struct DeviceState {
    inbound: Vec<u8>,
    scheduled: Vec<(Instant, Vec<u8>)>,
    written: Vec<Bytes>,
    reply: Reply,
    fail_opens: bool,
    plugged: bool,
    opens: usize,
    closes: usize,
    calls: Vec<Op>,
    active: usize,
    overlaps: usize,
}

/// Shared handle to the simulated device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl SimDevice {
    /// A plugged-in device that acknowledges every write immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                inbound: Vec::new(),
                scheduled: Vec::new(),
                written: Vec::new(),
                reply: Reply::After {
                    text: ACK.into(),
                    delay: Duration::ZERO,
                },
                fail_opens: false,
                plugged: true,
                opens: 0,
                closes: 0,
                calls: Vec::new(),
                active: 0,
                overlaps: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    /// A connector that opens links to this device.
    pub fn connector(&self) -> SimConnector {
        SimConnector {
            device: self.clone(),
        }
    }

    /// Sets how writes are answered.
    pub fn reply(&self, reply: Reply) {
        self.lock().reply = reply;
    }

    /// Queues bytes for the host to read.
    pub fn emit(&self, bytes: &[u8]) {
        self.lock().inbound.extend_from_slice(bytes);
    }

    /// Makes every open attempt fail while set.
    pub fn fail_opens(&self, fail: bool) {
        self.lock().fail_opens = fail;
    }

    /// Pulls the USB cable: open links die and opens fail.
    pub fn unplug(&self) {
        let mut state = self.lock();
        state.plugged = false;
        state.fail_opens = true;
    }

    /// Plugs the cable back in.
    pub fn replug(&self) {
        let mut state = self.lock();
        state.plugged = true;
        state.fail_opens = false;
    }

    /// Bytes waiting to be read.
    pub fn pending(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Payloads the host has written.
    pub fn written(&self) -> Vec<Bytes> {
        self.lock().written.clone()
    }

    /// Successful opens so far.
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Links closed so far.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|&&call| call == op).count()
    }

    /// Number of calls that started while another was in flight.
    pub fn overlaps(&self) -> usize {
        self.lock().overlaps
    }

    fn enter(&self, op: Op) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(op);
        state.active += 1;
        if state.active > 1 {
            state.overlaps += 1;
        }
        if state.plugged {
            Ok(())
        } else {
            state.active -= 1;
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )))
        }
    }

    fn exit(&self) {
        self.lock().active -= 1;
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens [`SimLink`]s.
pub struct SimConnector {
    device: SimDevice,
}

impl Connector for SimConnector {
    fn open<'a>(&'a self, _config: &'a SerialConfig) -> BoxFuture<'a, Result<Box<dyn Link>>> {
        Box::pin(async move {
            let mut state = self.device.lock();
            if state.fail_opens {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such device",
                )));
            }
            state.opens += 1;
            drop(state);

            Ok(Box::new(SimLink {
                device: self.device.clone(),
                closed: false,
            }) as Box<dyn Link>)
        })
    }
}

/// A link to the simulated device.
pub struct SimLink {
    device: SimDevice,
    closed: bool,
}

impl SimLink {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }
}

impl Link for SimLink {
    fn read_available(&mut self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            self.check_open()?;
            self.device.enter(Op::Read)?;
            tokio::task::yield_now().await;

            let mut state = self.device.lock();
            let now = Instant::now();
            let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut state.scheduled)
                .into_iter()
                .partition(|(at, _)| *at <= now);
            state.scheduled = later;
            for (_, bytes) in due {
                state.inbound.extend(bytes);
            }
            let bytes = std::mem::take(&mut state.inbound);
            drop(state);

            self.device.exit();
            Ok(bytes)
        })
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_open()?;
            self.device.enter(Op::Write)?;
            tokio::task::yield_now().await;

            let mut state = self.device.lock();
            state.written.push(data);
            if let Reply::After { text, delay } = state.reply.clone() {
                let at = Instant::now() + delay;
                state.scheduled.push((at, text.into_bytes()));
            }
            drop(state);

            self.device.exit();
            Ok(())
        })
    }

    fn reset_buffers(&mut self) -> Result<()> {
        self.check_open()?;
        self.device.enter(Op::Reset)?;
        self.device.lock().inbound.clear();
        self.device.exit();
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed && self.device.lock().plugged
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.device.lock().closes += 1;
        }
    }
}
