//! Bridge between a WHR930 on a serial line and an MQTT bus.
//!
//! One OS thread owns the serial link ([`DeviceWorker`]); everything else
//! talks to it through a cloneable [`DeviceHandle`]. The [`TelemetryPoller`]
//! reads the unit on a fixed interval and publishes through a
//! [`TelemetrySink`]; the [`MqttBus`] feeds inbound level commands to the
//! [`CommandHandler`]. A single `CancellationToken` stops both tasks, after
//! which the worker drains its queue and closes the link.

pub mod command;
pub mod error;
pub mod mqtt;
pub mod poller;
pub mod sink;
pub mod topics;
pub mod worker;

pub use command::CommandHandler;
pub use error::{BridgeError, CommandError, Result};
pub use mqtt::{MqttBus, MqttConfig, MqttSink};
pub use poller::{
    CycleReport, FrameCheck, PollerConfig, TelemetryGroup, TelemetryPoller, DEFAULT_POLL_INTERVAL,
};
pub use sink::{MemorySink, Publication, TelemetrySink};
pub use topics::{format_temperature, Topics, DEFAULT_PREFIX};
pub use worker::{
    device_channel, spawn_device_worker, DeviceHandle, DeviceRequest, DeviceWorker,
    DEFAULT_QUEUE_DEPTH,
};
