use std::io::ErrorKind;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::SerialLink;

const READ_CHUNK_SIZE: usize = 64;

/// Default settle delay between writing a request and reading the reply.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on the bytes drained per exchange.
pub const DEFAULT_MAX_RESPONSE: usize = 256;

/// Configuration for the exchange discipline.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Fixed wait after each write. The unit's reply is considered complete
    /// once this has elapsed.
    pub settle_delay: Duration,
    /// Maximum number of bytes drained per exchange.
    pub max_response: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_response: DEFAULT_MAX_RESPONSE,
        }
    }
}

/// Performs request/response exchanges over an exclusively owned link.
///
/// Not `Sync` by intent: exactly one owner drives the link at a time.
pub struct DeviceTransport<L: SerialLink> {
    link: Option<L>,
    config: TransportConfig,
}

impl<L: SerialLink> DeviceTransport<L> {
    /// Wrap a link with default configuration.
    pub fn new(link: L) -> Self {
        Self::with_config(link, TransportConfig::default())
    }

    /// Wrap a link with explicit configuration.
    pub fn with_config(link: L, config: TransportConfig) -> Self {
        Self {
            link: Some(link),
            config,
        }
    }

    /// Write `request`, wait the settle delay and drain every buffered byte.
    ///
    /// Returns `Ok(None)` when the unit did not answer at all.
    pub fn exchange(&mut self, request: &[u8]) -> Result<Option<Bytes>> {
        let settle_delay = self.config.settle_delay;
        let max_response = self.config.max_response;
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;

        let stale = discard_pending(link, max_response)?;
        if stale > 0 {
            debug!(bytes = stale, "discarded stale input before request");
        }

        write_request(link, request)?;
        std::thread::sleep(settle_delay);

        let response = drain(link, max_response)?;
        if response.is_empty() {
            debug!(request_len = request.len(), "no response from unit");
            return Ok(None);
        }

        trace!(len = response.len(), bytes = ?response.as_ref(), "response captured");
        Ok(Some(response.freeze()))
    }

    /// Fire-and-forget write.
    ///
    /// Still waits the settle delay so the unit's acknowledge is swallowed
    /// here instead of prefixing the next exchange's reply.
    pub fn write(&mut self, frame: &[u8]) -> Result<()> {
        let settle_delay = self.config.settle_delay;
        let max_response = self.config.max_response;
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;

        write_request(link, frame)?;
        std::thread::sleep(settle_delay);

        let residual = discard_pending(link, max_response)?;
        trace!(bytes = residual, "ignored residual bytes after write");
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Borrow the underlying link, if still open.
    pub fn get_ref(&self) -> Option<&L> {
        self.link.as_ref()
    }

    /// Whether the link is still open.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Close the link explicitly.
    pub fn close(mut self) -> Result<()> {
        self.shutdown_link()
    }

    fn shutdown_link(&mut self) -> Result<()> {
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };
        let name = link.describe();
        let result = link.close();
        drop(link);
        match result {
            Ok(()) => {
                info!(link = %name, "serial link closed");
                Ok(())
            }
            Err(err) => {
                warn!(link = %name, error = %err, "serial link closed with error");
                Err(TransportError::Io(err))
            }
        }
    }
}

impl<L: SerialLink> Drop for DeviceTransport<L> {
    fn drop(&mut self) {
        let _ = self.shutdown_link();
    }
}

impl<L: SerialLink> std::fmt::Debug for DeviceTransport<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTransport")
            .field("link", &self.link.as_ref().map(|l| l.describe()))
            .field("config", &self.config)
            .finish()
    }
}

fn write_request<L: SerialLink>(link: &mut L, request: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < request.len() {
        match link.write(&request[offset..]) {
            Ok(0) => return Err(TransportError::Io(std::io::Error::from(ErrorKind::WriteZero))),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match link.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

/// Read until the link reports nothing buffered, or `max` bytes arrived.
fn drain<L: SerialLink>(link: &mut L, max: usize) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while buf.len() < max {
        let pending = link.bytes_available()?;
        if pending == 0 {
            break;
        }

        let want = pending.min(READ_CHUNK_SIZE).min(max - buf.len());
        match link.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::TimedOut => break,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    if buf.len() >= max && link.bytes_available()? > 0 {
        debug!(max, "response cap reached, leaving remaining bytes");
    }

    Ok(buf)
}

fn discard_pending<L: SerialLink>(link: &mut L, max: usize) -> Result<usize> {
    Ok(drain(link, max)?.len())
}
