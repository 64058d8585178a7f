//! Outbound telemetry seam.
//!
//! The poller only needs "publish this payload on this topic". The MQTT
//! client implements it in [`crate::mqtt`]; [`MemorySink`] records
//! publications for one-shot reads and tests.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::Result;

/// Non-blocking publish of one telemetry value.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        (**self).publish(topic, payload)
    }
}

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
}

/// Sink that keeps every publication in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    published: Arc<Mutex<Vec<Publication>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn publications(&self) -> Vec<Publication> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything published so far.
    pub fn take(&self) -> Vec<Publication> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Publication {
                topic: topic.to_string(),
                payload: payload.to_string(),
            });
        Ok(())
    }
}
