/// Errors that can occur while bridging the unit to the bus.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Serial link error reported by the device worker.
    #[error("transport error: {0}")]
    Transport(#[from] whr930_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] whr930_frame::FrameError),

    /// The device worker has stopped and no longer accepts requests.
    #[error("device worker stopped")]
    WorkerGone,

    /// The device queue is full; the request was dropped.
    #[error("device busy, request dropped")]
    DeviceBusy,

    /// The bus client refused an outbound message.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The bus connection dropped.
    #[error("bus disconnected: {0}")]
    BusDisconnected(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors from handling an inbound level command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The payload is not an integer in `0..=3`.
    #[error("ventilation level out of range: {payload:?}")]
    OutOfRange { payload: String },

    /// The command was valid but could not be handed to the unit.
    #[error(transparent)]
    Device(#[from] BridgeError),
}
