use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;
use whr930_bridge::{FrameCheck, MqttConfig, DEFAULT_PREFIX};
use whr930_transport::{
    DeviceTransport, SerialConfig, SerialDevice, SerialLink, SimulatedDevice, TransportConfig,
    DEFAULT_DEVICE,
};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod read;
pub mod run;
pub mod set_level;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge: poll the unit and serve level commands over MQTT.
    Run(RunArgs),
    /// Read telemetry once and print it.
    Read(ReadArgs),
    /// Set the ventilation level once (0-3).
    SetLevel(SetLevelArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Read(args) => read::run(args, format),
        Command::SetLevel(args) => set_level::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device the unit is attached to.
    #[arg(long, env = "WHR930_DEVICE", default_value = DEFAULT_DEVICE)]
    pub device: PathBuf,
    /// Wait between writing a request and reading the reply (e.g. 1s, 500ms).
    #[arg(long, env = "WHR930_SETTLE_DELAY", default_value = "1s")]
    pub settle_delay: String,
    /// Talk to an in-memory simulated unit instead of the serial port.
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Args, Debug)]
pub struct MqttArgs {
    /// Broker host.
    #[arg(long, env = "WHR930_MQTT_HOST", default_value = "localhost")]
    pub mqtt_host: String,
    /// Broker port.
    #[arg(long, env = "WHR930_MQTT_PORT", default_value = "1883")]
    pub mqtt_port: u16,
    /// Client identifier.
    #[arg(long, env = "WHR930_MQTT_CLIENT_ID", default_value = "whr930")]
    pub mqtt_client_id: String,
    /// Username, if the broker requires one.
    #[arg(long, env = "WHR930_MQTT_USERNAME")]
    pub mqtt_username: Option<String>,
    /// Password for --mqtt-username.
    #[arg(long, env = "WHR930_MQTT_PASSWORD", hide_env_values = true, requires = "mqtt_username")]
    pub mqtt_password: Option<String>,
    /// Keep-alive interval (e.g. 45s).
    #[arg(long, default_value = "45s")]
    pub keep_alive: String,
    /// Wait before reconnecting after the broker connection drops.
    #[arg(long, default_value = "10s")]
    pub reconnect_delay: String,
    /// Prefix of every topic.
    #[arg(long, env = "WHR930_TOPIC_PREFIX", default_value = DEFAULT_PREFIX)]
    pub topic_prefix: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[command(flatten)]
    pub mqtt: MqttArgs,
    /// Time between telemetry polls (e.g. 10s).
    #[arg(long, env = "WHR930_POLL_INTERVAL", default_value = "10s")]
    pub poll_interval: String,
    /// Pause between consecutive publishes of one poll.
    #[arg(long, default_value = "100ms")]
    pub publish_pause: String,
    /// Validate start marker, checksum and terminator of every reply.
    #[arg(long)]
    pub strict_frames: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Validate start marker, checksum and terminator of every reply.
    #[arg(long)]
    pub strict_frames: bool,
    /// Topic prefix used for the printed topics.
    #[arg(long, env = "WHR930_TOPIC_PREFIX", default_value = DEFAULT_PREFIX)]
    pub topic_prefix: String,
}

#[derive(Args, Debug)]
pub struct SetLevelArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Ventilation level, 0 (away) to 3 (high).
    pub level: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl DeviceArgs {
    pub fn describe(&self) -> String {
        if self.simulate {
            "simulated".to_string()
        } else {
            self.device.display().to_string()
        }
    }

    /// Open the configured link. Failing to open the port is fatal.
    pub fn open(&self) -> CliResult<DeviceTransport<Box<dyn SerialLink>>> {
        let settle_delay = parse_duration(&self.settle_delay)?;
        let link: Box<dyn SerialLink> = if self.simulate {
            info!("using simulated unit");
            Box::new(SimulatedDevice::new())
        } else {
            let port = SerialDevice::open(&SerialConfig::for_path(&self.device))
                .map_err(|err| transport_error("cannot open serial device", err))?;
            Box::new(port)
        };

        Ok(DeviceTransport::with_config(
            link,
            TransportConfig {
                settle_delay,
                ..TransportConfig::default()
            },
        ))
    }
}

impl MqttArgs {
    pub fn to_config(&self) -> CliResult<MqttConfig> {
        let keep_alive = parse_duration(&self.keep_alive)?;
        if keep_alive < Duration::from_secs(1) {
            return Err(CliError::new(USAGE, "--keep-alive must be at least 1s"));
        }
        let reconnect_delay = parse_duration(&self.reconnect_delay)?;
        Ok(MqttConfig {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            keep_alive,
            reconnect_delay,
            ..MqttConfig::default()
        })
    }
}

pub fn frame_check(strict: bool) -> FrameCheck {
    if strict {
        FrameCheck::Strict
    } else {
        FrameCheck::Lenient
    }
}

/// Parse `10s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn parse_nonzero_duration(name: &str, input: &str) -> CliResult<Duration> {
    let duration = parse_duration(input)?;
    if duration.is_zero() {
        return Err(CliError::new(USAGE, format!("{name} must be greater than zero")));
    }
    Ok(duration)
}
