//! Serial link and exchange discipline for the WHR930.
//!
//! The unit's protocol has no length negotiation visible at this layer: a
//! request is written, a fixed settle delay elapses, and whatever bytes are
//! buffered by then are the reply.
//!
//! - [`SerialDevice`] opens a real port at 9600 8N1
//! - [`SimulatedDevice`] is an in-memory unit for tests and bench runs
//! - [`DeviceTransport`] performs one exchange or write at a time

pub mod error;
pub mod exchange;
pub mod serial;
pub mod sim;
pub mod traits;

pub use error::{Result, TransportError};
pub use exchange::{DeviceTransport, TransportConfig, DEFAULT_MAX_RESPONSE, DEFAULT_SETTLE_DELAY};
pub use serial::{SerialConfig, SerialDevice, BAUD_RATE, DEFAULT_DEVICE};
pub use sim::SimulatedDevice;
pub use traits::SerialLink;
