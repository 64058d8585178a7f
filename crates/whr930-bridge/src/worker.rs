//! Single-owner serial worker.
//!
//! The serial link cannot multiplex requests, so one dedicated thread owns
//! the [`DeviceTransport`] and executes requests strictly one after another.
//! Async callers submit work through a cloneable [`DeviceHandle`].

use std::thread::JoinHandle;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use whr930_transport::{DeviceTransport, SerialLink};

use crate::error::{BridgeError, Result};

/// Default depth of the request queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

type ExchangeReply = oneshot::Sender<whr930_transport::Result<Option<Bytes>>>;
type WriteReply = oneshot::Sender<whr930_transport::Result<()>>;

/// A unit of work for the device worker.
#[derive(Debug)]
pub enum DeviceRequest {
    /// Write a request and return whatever the unit answered.
    Exchange { request: Bytes, reply: ExchangeReply },
    /// Write a frame whose reply is not interesting.
    Write {
        frame: Bytes,
        done: Option<WriteReply>,
    },
}

/// Cloneable submission side of the device worker.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<DeviceRequest>,
}

/// Create a request queue. The receiver goes to a [`DeviceWorker`].
pub fn device_channel(depth: usize) -> (DeviceHandle, mpsc::Receiver<DeviceRequest>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (DeviceHandle { tx }, rx)
}

impl DeviceHandle {
    /// Run one exchange on the worker and wait for its result.
    pub async fn exchange(&self, request: Bytes) -> Result<Option<Bytes>> {
        let (reply, rx) = oneshot::channel();
        self.submit(DeviceRequest::Exchange { request, reply })
            .await?;
        let result = rx.await.map_err(|_| BridgeError::WorkerGone)?;
        Ok(result?)
    }

    /// Queue a fire-and-forget write without waiting for queue space.
    ///
    /// Fails with [`BridgeError::DeviceBusy`] when the queue is full.
    pub fn try_write(&self, frame: Bytes) -> Result<()> {
        self.tx
            .try_send(DeviceRequest::Write { frame, done: None })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => BridgeError::DeviceBusy,
                mpsc::error::TrySendError::Closed(_) => BridgeError::WorkerGone,
            })
    }

    /// Queue a write and wait until it has gone out on the wire.
    pub async fn write_and_wait(&self, frame: Bytes) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.submit(DeviceRequest::Write {
            frame,
            done: Some(done),
        })
        .await?;
        let result = rx.await.map_err(|_| BridgeError::WorkerGone)?;
        Ok(result?)
    }

    /// Whether the worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn submit(&self, request: DeviceRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| BridgeError::WorkerGone)
    }
}

/// Owns the transport and serves requests until every handle is dropped.
pub struct DeviceWorker<L: SerialLink> {
    transport: DeviceTransport<L>,
    requests: mpsc::Receiver<DeviceRequest>,
}

impl<L: SerialLink + 'static> DeviceWorker<L> {
    pub fn new(transport: DeviceTransport<L>, requests: mpsc::Receiver<DeviceRequest>) -> Self {
        Self {
            transport,
            requests,
        }
    }

    /// Serve requests on the current thread (blocking).
    ///
    /// Returns when all [`DeviceHandle`]s are gone, after the last accepted
    /// request has finished. The link is closed on the way out.
    pub fn run(self) {
        let Self {
            mut transport,
            mut requests,
        } = self;

        info!("device worker started");

        while let Some(request) = requests.blocking_recv() {
            match request {
                DeviceRequest::Exchange { request, reply } => {
                    let result = transport.exchange(&request);
                    if let Err(err) = &result {
                        debug!(error = %err, "exchange failed");
                    }
                    if reply.send(result).is_err() {
                        debug!("exchange requester went away");
                    }
                }
                DeviceRequest::Write { frame, done } => {
                    let result = transport.write(&frame);
                    match done {
                        Some(done) => {
                            let _ = done.send(result);
                        }
                        None => {
                            if let Err(err) = result {
                                warn!(error = %err, "serial write failed");
                            }
                        }
                    }
                }
            }
        }

        info!("device worker stopping");
        if let Err(err) = transport.close() {
            warn!(error = %err, "failed to close serial link cleanly");
        }
    }

    /// Run the worker on a dedicated named thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("whr930-serial".to_string())
            .spawn(move || self.run())
    }
}

/// Start a worker thread for `transport` and return its handle.
pub fn spawn_device_worker<L: SerialLink + 'static>(
    transport: DeviceTransport<L>,
    depth: usize,
) -> std::io::Result<(DeviceHandle, JoinHandle<()>)> {
    let (handle, requests) = device_channel(depth);
    let join = DeviceWorker::new(transport, requests).spawn()?;
    Ok((handle, join))
}
