//! In-memory WHR930 for tests and bench runs without hardware.
//!
//! [`SimulatedDevice`] answers the three requests the bridge sends with
//! well-formed replies (acknowledge pair, checksum, terminator) and applies
//! set-level writes to its fan stage. Clones share state, so a test can hand
//! one clone to the transport and inspect the wire through another.
//!
//! ```rust
//! use whr930_transport::{DeviceTransport, SimulatedDevice};
//!
//! let sim = SimulatedDevice::new();
//! let mut transport = DeviceTransport::new(sim.clone());
//! transport.write(&whr930_frame::SET_LEVEL_FRAMES[2]).unwrap();
//! assert_eq!(sim.stage(), 3);
//! ```

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tracing::trace;
use whr930_frame::{
    encode_frame, ACK, END, FAN_STATUS_REPLY, GET_FAN_STATUS, GET_TEMPERATURES, READ_FAN_STATUS,
    READ_TEMPERATURES, SET_LEVEL_FRAMES, TEMPERATURES_REPLY,
};

use crate::traits::SerialLink;

/// Shared simulated unit.
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
}

struct SimState {
    /// Bytes waiting for the host to read.
    rx: VecDeque<u8>,
    /// Partial request collected from host writes.
    pending_request: Vec<u8>,
    /// Every byte the host ever wrote, in order.
    wire: Vec<u8>,
    /// Commands recognised, in order.
    requests: Vec<u16>,
    temperatures: [u8; 4],
    return_air_level: u8,
    supply_air_level: u8,
    stage: u8,
    silent: bool,
    fail_io: bool,
    write_chunk: usize,
    temperature_reply: Option<Vec<u8>>,
    fan_status_reply: Option<Vec<u8>>,
    closes: usize,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// A unit at 20 °C outside, level 1, answering every request.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                rx: VecDeque::new(),
                pending_request: Vec::new(),
                wire: Vec::new(),
                requests: Vec::new(),
                temperatures: [0x50, 0x52, 0x53, 0x4E],
                return_air_level: 35,
                supply_air_level: 35,
                stage: 2,
                silent: false,
                fail_io: false,
                write_chunk: usize::MAX,
                temperature_reply: None,
                fan_status_reply: None,
                closes: 0,
            })),
        }
    }

    /// Accept at most `n` bytes per `write` call, exposing any interleaving
    /// between concurrent writers.
    pub fn with_write_chunk(self, n: usize) -> Self {
        self.lock().write_chunk = n.max(1);
        self
    }

    /// Raw sensor bytes for outside, supply, return and exhaust air.
    pub fn set_temperatures_raw(&self, raw: [u8; 4]) {
        self.lock().temperatures = raw;
    }

    /// Raw return and supply air level percentages.
    pub fn set_air_levels(&self, return_air: u8, supply_air: u8) {
        let mut state = self.lock();
        state.return_air_level = return_air;
        state.supply_air_level = supply_air;
    }

    /// Set the 1-indexed fan stage byte directly.
    pub fn set_stage(&self, stage: u8) {
        self.lock().stage = stage;
    }

    /// Current 1-indexed fan stage.
    pub fn stage(&self) -> u8 {
        self.lock().stage
    }

    /// Stop answering requests (writes are still recorded).
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Make every read and write fail with an I/O error.
    pub fn set_fail_io(&self, fail: bool) {
        self.lock().fail_io = fail;
    }

    /// Replace the reply to a read request with raw bytes.
    ///
    /// `command` is [`GET_TEMPERATURES`] or [`GET_FAN_STATUS`]; `None`
    /// restores the generated reply.
    pub fn set_reply(&self, command: u16, reply: Option<Vec<u8>>) {
        let mut state = self.lock();
        match command {
            GET_TEMPERATURES => state.temperature_reply = reply,
            GET_FAN_STATUS => state.fan_status_reply = reply,
            _ => {}
        }
    }

    /// Queue bytes as if the unit sent them unprompted.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Everything the host wrote so far.
    pub fn wire(&self) -> Vec<u8> {
        self.lock().wire.clone()
    }

    /// Recognised request commands, in order of arrival.
    pub fn requests(&self) -> Vec<u16> {
        self.lock().requests.clone()
    }

    /// How many times the owning transport closed the link.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimState {
    fn accept(&mut self, bytes: &[u8]) {
        self.wire.extend_from_slice(bytes);
        for &b in bytes {
            self.pending_request.push(b);
            if self.pending_request.ends_with(&END) {
                let request = std::mem::take(&mut self.pending_request);
                self.respond(&request);
            }
        }
    }

    fn respond(&mut self, request: &[u8]) {
        if request == READ_TEMPERATURES {
            self.requests.push(GET_TEMPERATURES);
            let reply = match &self.temperature_reply {
                Some(raw) => raw.clone(),
                None => self.temperature_frame(),
            };
            self.send(&reply);
        } else if request == READ_FAN_STATUS {
            self.requests.push(GET_FAN_STATUS);
            let reply = match &self.fan_status_reply {
                Some(raw) => raw.clone(),
                None => self.fan_status_frame(),
            };
            self.send(&reply);
        } else if let Some(idx) = SET_LEVEL_FRAMES.iter().position(|f| f[..] == *request) {
            self.requests.push(whr930_frame::SET_LEVEL);
            self.stage = idx as u8 + 1;
            self.send(&ACK);
        } else {
            trace!(len = request.len(), "simulated unit ignored unknown request");
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        if !self.silent {
            self.rx.extend(bytes.iter().copied());
        }
    }

    fn temperature_frame(&self) -> Vec<u8> {
        let mut payload = [0u8; 9];
        payload[..4].copy_from_slice(&self.temperatures);
        reply_frame(TEMPERATURES_REPLY, &payload)
    }

    fn fan_status_frame(&self) -> Vec<u8> {
        // Configured exhaust/supply for away, low, medium (6 bytes), then
        // actual exhaust, actual supply, current stage, and padding.
        let mut payload = [15, 15, 35, 35, 50, 50, 0, 0, 0, 0, 0, 0, 0, 0];
        payload[6] = self.return_air_level;
        payload[7] = self.supply_air_level;
        payload[8] = self.stage;
        reply_frame(FAN_STATUS_REPLY, &payload)
    }
}

fn reply_frame(command: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::from(&ACK[..]);
    // Payloads here are far below the one-byte length limit.
    let _ = encode_frame(command, payload, &mut buf);
    buf.to_vec()
}

fn simulated_failure() -> std::io::Error {
    std::io::Error::other("simulated serial failure")
}

impl Read for SimulatedDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.fail_io {
            return Err(simulated_failure());
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.fail_io {
            return Err(simulated_failure());
        }
        let n = buf.len().min(state.write_chunk);
        state.accept(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SerialLink for SimulatedDevice {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let state = self.lock();
        if state.fail_io {
            return Err(simulated_failure());
        }
        Ok(state.rx.len())
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.lock().closes += 1;
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimulatedDevice")
            .field("stage", &state.stage)
            .field("silent", &state.silent)
            .field("pending_rx", &state.rx.len())
            .finish()
    }
}
