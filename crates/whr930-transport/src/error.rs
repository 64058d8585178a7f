use std::path::PathBuf;

/// Errors that can occur on the serial link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// A read or write on the serial link failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has already been closed.
    #[error("serial link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
