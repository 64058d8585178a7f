use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use whr930_bridge::{
    spawn_device_worker, CommandHandler, DeviceHandle, MemorySink, PollerConfig, TelemetryGroup,
    TelemetryPoller, Topics, DEFAULT_QUEUE_DEPTH,
};
use whr930_frame::{
    GET_FAN_STATUS, GET_TEMPERATURES, READ_FAN_STATUS, READ_TEMPERATURES, SET_LEVEL_FRAMES,
};
use whr930_transport::{DeviceTransport, SimulatedDevice, TransportConfig};

fn start_worker(sim: &SimulatedDevice) -> (DeviceHandle, JoinHandle<()>) {
    let transport = DeviceTransport::with_config(
        sim.clone(),
        TransportConfig {
            settle_delay: Duration::from_millis(5),
            ..TransportConfig::default()
        },
    );
    spawn_device_worker(transport, DEFAULT_QUEUE_DEPTH).unwrap()
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test]
async fn one_cycle_publishes_exactly_five_values() {
    let sim = SimulatedDevice::new();
    // 11-byte temperature capture: acknowledge, header, four sensor bytes.
    sim.set_reply(
        GET_TEMPERATURES,
        Some(vec![
            0x07, 0xF3, 0x07, 0xF0, 0x00, 0xD2, 0x09, 0x2B, 0x4F, 0x50, 0x2D,
        ]),
    );
    // 16-byte fan status capture ending in the stage byte.
    sim.set_reply(
        GET_FAN_STATUS,
        Some(vec![
            0x07, 0xF3, 0x07, 0xF0, 0x00, 0xCE, 0x0E, 0x0F, 0x28, 0x46, 0x0F, 0x28, 0x46, 0x2D,
            0x32, 0x04,
        ]),
    );

    let (logs, _guard) = capture_warnings();
    let (device, join) = start_worker(&sim);
    let sink = MemorySink::new();
    let poller = TelemetryPoller::new(device, sink.clone(), Topics::default(), PollerConfig::default());

    let report = poller.poll_once().await;

    let published: Vec<(String, String)> = sink
        .publications()
        .into_iter()
        .map(|p| (p.topic, p.payload))
        .collect();
    assert_eq!(
        published,
        vec![
            ("house/2/attic/wtw/outside_air_temp".into(), "1.5".into()),
            ("house/2/attic/wtw/supply_air_temp".into(), "19.5".into()),
            ("house/2/attic/wtw/return_air_temp".into(), "20.0".into()),
            ("house/2/attic/wtw/exhaust_air_temp".into(), "2.5".into()),
            ("house/2/attic/wtw/ventilation_level".into(), "3".into()),
        ]
    );
    assert!(report.skipped.is_empty());
    let status = report.fan_status.unwrap();
    assert_eq!(status.return_air_level, 0x2D);
    assert_eq!(status.supply_air_level, 0x32);
    assert!(logs.contents().is_empty(), "unexpected warnings: {}", logs.contents());

    drop(poller);
    join.join().unwrap();
}

#[tokio::test]
async fn short_temperature_reply_is_not_published() {
    let sim = SimulatedDevice::new();
    sim.set_reply(
        GET_TEMPERATURES,
        Some(vec![0x07, 0xF3, 0x07, 0xF0, 0x00, 0xD2, 0x09, 0x28, 0x28, 0x28]),
    );

    let (logs, _guard) = capture_warnings();
    let (device, _join) = start_worker(&sim);
    let sink = MemorySink::new();
    let poller = TelemetryPoller::new(device, sink.clone(), Topics::default(), PollerConfig::default());

    let report = poller.poll_once().await;

    assert_eq!(report.skipped, vec![TelemetryGroup::Temperatures]);
    assert!(sink
        .publications()
        .iter()
        .all(|p| p.topic.ends_with("ventilation_level")));
    assert!(logs.contents().contains("short frame"));
}

#[tokio::test]
async fn silent_unit_publishes_nothing() {
    let sim = SimulatedDevice::new();
    sim.set_silent(true);

    let (logs, _guard) = capture_warnings();
    let (device, _join) = start_worker(&sim);
    let sink = MemorySink::new();
    let poller = TelemetryPoller::new(device, sink.clone(), Topics::default(), PollerConfig::default());

    let report = poller.poll_once().await;

    assert_eq!(
        report.skipped,
        vec![TelemetryGroup::Temperatures, TelemetryGroup::FanStatus]
    );
    assert!(sink.publications().is_empty());
    assert_eq!(logs.contents().matches("device did not respond").count(), 2);
}

#[tokio::test]
async fn set_level_then_read_back() {
    let sim = SimulatedDevice::new();
    let (device, join) = start_worker(&sim);
    let handler = CommandHandler::new(device.clone());
    let sink = MemorySink::new();
    let poller = TelemetryPoller::new(device, sink.clone(), Topics::default(), PollerConfig::default());

    for level in 0..=3u8 {
        handler
            .handle_set_level(level.to_string().as_bytes())
            .await
            .unwrap();
        let report = poller.poll_once().await;
        assert_eq!(report.fan_status.unwrap().fan_level.get(), level);
        assert_eq!(sink.take().last().unwrap().payload, level.to_string());
    }

    drop(handler);
    drop(poller);
    join.join().unwrap();
    assert_eq!(sim.closes(), 1);
}

#[tokio::test]
async fn concurrent_requests_never_interleave_on_the_wire() {
    let sim = SimulatedDevice::new().with_write_chunk(1);
    let (device, join) = start_worker(&sim);

    let poll = device.exchange(Bytes::from_static(&READ_TEMPERATURES));
    let command = device.write_and_wait(Bytes::from_static(&SET_LEVEL_FRAMES[3]));
    let (reply, written) = tokio::join!(poll, command);
    reply.unwrap();
    written.unwrap();

    let wire = sim.wire();
    let a_then_b = [&READ_TEMPERATURES[..], &SET_LEVEL_FRAMES[3][..]].concat();
    let b_then_a = [&SET_LEVEL_FRAMES[3][..], &READ_TEMPERATURES[..]].concat();
    assert!(wire == a_then_b || wire == b_then_a, "interleaved wire: {wire:02X?}");

    drop(device);
    join.join().unwrap();
}

#[tokio::test]
async fn invalid_commands_never_reach_the_unit() {
    let sim = SimulatedDevice::new();
    let (device, join) = start_worker(&sim);
    let handler = CommandHandler::new(device.clone());

    for payload in ["4", "-1", "high", "", "2.0"] {
        assert!(handler.handle_set_level(payload.as_bytes()).await.is_err());
    }
    // A read afterwards is the only thing the unit ever saw.
    device
        .exchange(Bytes::from_static(&READ_FAN_STATUS))
        .await
        .unwrap();

    assert_eq!(sim.requests(), vec![GET_FAN_STATUS]);
    assert_eq!(sim.wire(), READ_FAN_STATUS.to_vec());

    drop(handler);
    drop(device);
    join.join().unwrap();
}

#[tokio::test]
async fn shutdown_closes_serial_link_once() {
    let sim = SimulatedDevice::new();
    let (device, join) = start_worker(&sim);
    let handler = CommandHandler::new(device.clone());
    let poller = TelemetryPoller::new(
        device,
        MemorySink::new(),
        Topics::default(),
        PollerConfig {
            interval: Duration::from_millis(20),
            ..PollerConfig::default()
        },
    );

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(poller.run(shutdown.clone()));

    handler.handle_set_level(b"1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.cancel();
    task.await.unwrap();
    drop(handler);

    tokio::task::spawn_blocking(move || join.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sim.closes(), 1);
    assert_eq!(sim.stage(), 2);
    assert!(sim.requests().contains(&GET_TEMPERATURES));
}
