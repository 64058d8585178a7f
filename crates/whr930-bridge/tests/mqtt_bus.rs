use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use whr930_bridge::{
    device_channel, BridgeError, CommandHandler, DeviceRequest, MqttBus, MqttConfig,
    TelemetrySink, Topics,
};
use whr930_frame::SET_LEVEL_FRAMES;

const PREFIX: &str = "test/wtw";
const COMMAND_TOPIC: &str = "test/wtw/set_ventilation_level";
const WAIT: Duration = Duration::from_secs(5);

const CONNECT: u8 = 0x10;
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82;
const DISCONNECT: u8 = 0xE0;

/// Minimal MQTT 3.1.1 broker: one client, QoS 0 only.
struct Broker {
    listener: TcpListener,
}

impl Broker {
    async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    fn config(&self) -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".into(),
            port: self.listener.local_addr().unwrap().port(),
            reconnect_delay: Duration::from_millis(50),
            ..MqttConfig::default()
        }
    }

    /// Accept the next connection and acknowledge its CONNECT.
    async fn accept(&self) -> Session {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .expect("bridge did not connect")
            .unwrap();
        let mut session = Session { stream };
        let (kind, _) = session.next_packet().await;
        assert_eq!(kind, CONNECT);
        session.send(&[0x20, 0x02, 0x00, 0x00]).await;
        session
    }
}

struct Session {
    stream: TcpStream,
}

impl Session {
    async fn next_packet(&mut self) -> (u8, Vec<u8>) {
        tokio::time::timeout(WAIT, async {
            let header = self.stream.read_u8().await?;
            let mut len = 0usize;
            let mut shift = 0;
            loop {
                let byte = self.stream.read_u8().await?;
                len |= usize::from(byte & 0x7F) << shift;
                if byte & 0x80 == 0 {
                    break;
                }
                shift += 7;
            }
            let mut body = vec![0; len];
            self.stream.read_exact(&mut body).await?;
            Ok::<_, std::io::Error>((header, body))
        })
        .await
        .expect("no packet from bridge")
        .unwrap()
    }

    /// Skip packets until `kind` arrives and return its body.
    async fn wait_for(&mut self, kind: u8) -> Vec<u8> {
        loop {
            let (header, body) = self.next_packet().await;
            if header == kind {
                return body;
            }
        }
    }

    /// Wait for a SUBSCRIBE, acknowledge it and return the topic filter.
    async fn expect_subscribe(&mut self) -> String {
        let body = self.wait_for(SUBSCRIBE).await;
        self.send(&[0x90, 0x03, body[0], body[1], 0x00]).await;
        let len = usize::from(u16::from_be_bytes([body[2], body[3]]));
        String::from_utf8(body[4..4 + len].to_vec()).unwrap()
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) {
        let mut body = (topic.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(payload);
        let mut packet = vec![PUBLISH, body.len() as u8];
        packet.extend(body);
        self.send(&packet).await;
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }
}

fn publish_topic(body: &[u8]) -> String {
    let len = usize::from(u16::from_be_bytes([body[0], body[1]]));
    String::from_utf8(body[2..2 + len].to_vec()).unwrap()
}

struct Bridge {
    requests: mpsc::Receiver<DeviceRequest>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

fn start(bus: MqttBus) -> Bridge {
    let (device, requests) = device_channel(4);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(bus.run(CommandHandler::new(device), shutdown.clone()));
    Bridge {
        requests,
        shutdown,
        task,
    }
}

impl Bridge {
    async fn next_write(&mut self) -> Vec<u8> {
        match tokio::time::timeout(WAIT, self.requests.recv()).await {
            Ok(Some(DeviceRequest::Write { frame, done: None })) => frame.to_vec(),
            other => panic!("expected a queued write, got {other:?}"),
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("bus did not stop")
            .unwrap();
    }
}

#[tokio::test]
async fn subscribes_on_connect_and_forwards_level_commands() {
    let broker = Broker::bind().await;
    let mut bridge = start(MqttBus::new(&broker.config(), Topics::new(PREFIX)));

    let mut session = broker.accept().await;
    assert_eq!(session.expect_subscribe().await, COMMAND_TOPIC);

    session.publish("test/wtw/other", b"2").await;
    session.publish(COMMAND_TOPIC, b"9").await;
    session.publish(COMMAND_TOPIC, b"high").await;
    session.publish(COMMAND_TOPIC, b"2").await;

    // Messages are handled in order, so only the valid command reached the unit.
    assert_eq!(bridge.next_write().await, SET_LEVEL_FRAMES[2]);
    assert!(bridge.requests.try_recv().is_err());

    session.publish(COMMAND_TOPIC, b" 0\n").await;
    assert_eq!(bridge.next_write().await, SET_LEVEL_FRAMES[0]);

    bridge.shutdown.cancel();
    session.wait_for(DISCONNECT).await;
    bridge.stop().await;
}

#[tokio::test]
async fn resubscribes_after_broker_drops_connection() {
    let broker = Broker::bind().await;
    let mut bridge = start(MqttBus::new(&broker.config(), Topics::new(PREFIX)));

    let mut first = broker.accept().await;
    assert_eq!(first.expect_subscribe().await, COMMAND_TOPIC);
    drop(first);

    let mut second = broker.accept().await;
    assert_eq!(second.expect_subscribe().await, COMMAND_TOPIC);

    second.publish(COMMAND_TOPIC, b"3").await;
    assert_eq!(bridge.next_write().await, SET_LEVEL_FRAMES[3]);

    bridge.stop().await;
}

#[tokio::test]
async fn telemetry_flows_only_while_connected() {
    let broker = Broker::bind().await;
    let bus = MqttBus::new(&broker.config(), Topics::new(PREFIX));
    let sink = bus.sink();

    let err = sink.publish("test/wtw/outside_air_temp", "20.0").unwrap_err();
    assert!(matches!(err, BridgeError::BusDisconnected(_)));

    let bridge = start(bus);
    let mut session = broker.accept().await;
    session.expect_subscribe().await;

    sink.publish("test/wtw/outside_air_temp", "21.5").unwrap();
    let body = session.wait_for(PUBLISH).await;
    assert_eq!(publish_topic(&body), "test/wtw/outside_air_temp");
    assert!(body.ends_with(b"21.5"));

    bridge.stop().await;
}

#[tokio::test]
async fn busy_device_drops_commands_without_stalling_the_bus() {
    let broker = Broker::bind().await;
    let bus = MqttBus::new(&broker.config(), Topics::new(PREFIX));
    let (device, mut requests) = device_channel(1);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(bus.run(CommandHandler::new(device), shutdown.clone()));

    let mut session = broker.accept().await;
    session.expect_subscribe().await;

    // Nobody drains the queue: the second command finds it full.
    session.publish(COMMAND_TOPIC, b"1").await;
    session.publish(COMMAND_TOPIC, b"2").await;
    session.publish("test/wtw/other", b"x").await;

    // The bus keeps polling and shuts down promptly.
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    session.wait_for(DISCONNECT).await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

    match requests.try_recv() {
        Ok(DeviceRequest::Write { frame, .. }) => assert_eq!(frame.as_ref(), &SET_LEVEL_FRAMES[1]),
        other => panic!("expected level 1 write, got {other:?}"),
    }
    assert!(requests.try_recv().is_err());
}
