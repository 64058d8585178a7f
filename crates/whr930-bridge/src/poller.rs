//! Periodic telemetry polling.
//!
//! Each cycle reads temperatures, then fan status, through the device worker
//! and publishes up to five values. A group that cannot be read or decoded
//! is logged and skipped; the other group is unaffected.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use whr930_frame::{
    command_name, decode_fan_status, decode_temperatures, parse_reply, FanStatus, FrameError,
    Temperatures, FAN_STATUS_REPLY, READ_FAN_STATUS, READ_TEMPERATURES, TEMPERATURES_REPLY,
};

use crate::sink::{Publication, TelemetrySink};
use crate::topics::{format_temperature, Topics};
use crate::worker::DeviceHandle;

/// Default time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How strictly captured replies are checked before decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameCheck {
    /// Decode by offset only.
    #[default]
    Lenient,
    /// Require start marker, length, checksum, terminator and reply ID.
    Strict,
}

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub frame_check: FrameCheck,
    /// Pause between consecutive publishes within a cycle.
    pub publish_pause: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            frame_check: FrameCheck::Lenient,
            publish_pause: Duration::ZERO,
        }
    }
}

/// The two request/reply pairs read each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryGroup {
    Temperatures,
    FanStatus,
}

impl fmt::Display for TelemetryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperatures => write!(f, "temperatures"),
            Self::FanStatus => write!(f, "fan_status"),
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Messages handed to the sink, in order.
    pub published: Vec<Publication>,
    /// Groups that produced no data this cycle.
    pub skipped: Vec<TelemetryGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<Temperatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_status: Option<FanStatus>,
}

/// Reads telemetry from the unit and publishes it.
pub struct TelemetryPoller<S> {
    device: DeviceHandle,
    sink: S,
    topics: Topics,
    config: PollerConfig,
}

impl<S: TelemetrySink> TelemetryPoller<S> {
    pub fn new(device: DeviceHandle, sink: S, topics: Topics, config: PollerConfig) -> Self {
        Self {
            device,
            sink,
            topics,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll every interval until `shutdown` fires.
    ///
    /// The first cycle runs immediately. A cycle in progress is finished
    /// before the loop observes cancellation. Dropping the poller on return
    /// releases its [`DeviceHandle`].
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            strict = self.config.frame_check == FrameCheck::Strict,
            "telemetry poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.poll_once().await;
                    debug!(
                        published = report.published.len(),
                        skipped = report.skipped.len(),
                        "poll cycle finished"
                    );
                }
            }
        }

        info!("telemetry poller stopped");
    }

    /// Run one cycle: temperatures, then fan status.
    pub async fn poll_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.read_group(TelemetryGroup::Temperatures).await {
            Some(capture) => match decode_temperatures(&capture) {
                Ok(temps) => {
                    self.publish_temperatures(&temps, &mut report).await;
                    report.temperatures = Some(temps);
                }
                Err(err) => {
                    skip(&mut report, TelemetryGroup::Temperatures, &err);
                }
            },
            None => report.skipped.push(TelemetryGroup::Temperatures),
        }

        match self.read_group(TelemetryGroup::FanStatus).await {
            Some(capture) => match decode_fan_status(&capture) {
                Ok(status) => {
                    debug!(
                        return_air_level = status.return_air_level,
                        supply_air_level = status.supply_air_level,
                        "air levels"
                    );
                    let level = status.fan_level.to_string();
                    self.publish(self.topics.ventilation_level(), level, &mut report)
                        .await;
                    report.fan_status = Some(status);
                }
                Err(err) => {
                    skip(&mut report, TelemetryGroup::FanStatus, &err);
                }
            },
            None => report.skipped.push(TelemetryGroup::FanStatus),
        }

        report
    }

    /// Exchange one request. `None` means the group is skipped; the reason
    /// has already been logged.
    async fn read_group(&self, group: TelemetryGroup) -> Option<Bytes> {
        let (request, reply_id): (&'static [u8], u16) = match group {
            TelemetryGroup::Temperatures => (&READ_TEMPERATURES, TEMPERATURES_REPLY),
            TelemetryGroup::FanStatus => (&READ_FAN_STATUS, FAN_STATUS_REPLY),
        };

        let capture = match self.device.exchange(Bytes::from_static(request)).await {
            Ok(Some(capture)) => capture,
            Ok(None) => {
                warn!(%group, "device did not respond");
                return None;
            }
            Err(err) => {
                warn!(%group, error = %err, "device exchange failed");
                return None;
            }
        };

        debug!(
            %group,
            expected = command_name(reply_id),
            len = capture.len(),
            "response captured"
        );
        if self.config.frame_check == FrameCheck::Lenient {
            return Some(capture);
        }

        match parse_reply(&capture, reply_id).and_then(|frame| frame.to_capture()) {
            Ok(canonical) => Some(canonical),
            Err(err) => {
                warn!(%group, error = %err, len = capture.len(), "malformed response");
                None
            }
        }
    }

    async fn publish_temperatures(&self, temps: &Temperatures, report: &mut CycleReport) {
        let values = [
            (self.topics.outside_air_temp(), temps.outside),
            (self.topics.supply_air_temp(), temps.supply),
            (self.topics.return_air_temp(), temps.return_air),
            (self.topics.exhaust_air_temp(), temps.exhaust),
        ];
        for (topic, celsius) in values {
            self.publish(topic, format_temperature(celsius), report).await;
        }
    }

    async fn publish(&self, topic: String, payload: String, report: &mut CycleReport) {
        if !report.published.is_empty() && !self.config.publish_pause.is_zero() {
            tokio::time::sleep(self.config.publish_pause).await;
        }

        match self.sink.publish(&topic, &payload) {
            Ok(()) => {
                debug!(%topic, %payload, "published");
                report.published.push(Publication { topic, payload });
            }
            Err(err) => warn!(%topic, error = %err, "publish failed"),
        }
    }
}

fn skip(report: &mut CycleReport, group: TelemetryGroup, err: &FrameError) {
    warn!(%group, error = %err, "discarding response");
    report.skipped.push(group);
}
