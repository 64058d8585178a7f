//! Bridge a StorkAir WHR930 ventilation unit to an MQTT bus.
//!
//! The unit speaks the ComfoAir serial protocol at 9600 baud. This crate
//! polls its temperatures and fan level, publishes them as individual MQTT
//! messages and turns `set_ventilation_level` commands into device writes.
//!
//! # Crate Structure
//!
//! - [`frame`]: frame literals, checksums and telemetry decoding
//! - [`transport`]: serial link, request/response exchange, simulated unit
//! - [`bridge`]: device worker, telemetry poller, command handler, MQTT adapter

/// Re-export frame types.
pub mod frame {
    pub use whr930_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use whr930_transport::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use whr930_bridge::*;
}
