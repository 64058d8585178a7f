use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use whr930_bridge::{
    spawn_device_worker, CommandHandler, MqttBus, PollerConfig, TelemetryPoller, Topics,
    DEFAULT_QUEUE_DEPTH,
};

use crate::cmd::{frame_check, parse_duration, parse_nonzero_duration, RunArgs};
use crate::exit::{io_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let poller_config = PollerConfig {
        interval: parse_nonzero_duration("--poll-interval", &args.poll_interval)?,
        frame_check: frame_check(args.strict_frames),
        publish_pause: parse_duration(&args.publish_pause)?,
    };
    let mqtt_config = args.mqtt.to_config()?;
    let topics = Topics::new(args.mqtt.topic_prefix.clone());

    let transport = args.device.open()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("whr930-rt")
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let (device, worker) = spawn_device_worker(transport, DEFAULT_QUEUE_DEPTH)
        .map_err(|err| io_error("failed to start serial worker", err))?;

    info!(
        device = %args.device.describe(),
        broker = %format!("{}:{}", mqtt_config.host, mqtt_config.port),
        prefix = %topics.prefix(),
        "bridge starting"
    );

    let signal_result = runtime.block_on(async move {
        let shutdown = CancellationToken::new();
        let bus = MqttBus::new(&mqtt_config, topics.clone());
        let poller = TelemetryPoller::new(device.clone(), bus.sink(), topics, poller_config);
        let commands = CommandHandler::new(device);

        let poll_task = tokio::spawn(poller.run(shutdown.clone()));
        let bus_task = tokio::spawn(bus.run(commands, shutdown.clone()));

        let signal_result = shutdown_signal().await;
        match &signal_result {
            Ok(()) => info!("shutdown requested"),
            Err(err) => error!(error = %err, "signal handling failed, shutting down"),
        }
        shutdown.cancel();

        for (name, task) in [("poller", poll_task), ("bus", bus_task)] {
            if let Err(err) = task.await {
                warn!(task = name, error = %err, "task ended abnormally");
            }
        }
        signal_result
    });

    // Every DeviceHandle is gone now; the worker finishes its queue and
    // closes the port.
    worker
        .join()
        .map_err(|_| CliError::new(INTERNAL, "serial worker panicked"))?;
    drop(runtime);

    signal_result.map_err(|err| io_error("signal handler setup failed", err))?;
    info!("bridge stopped");
    Ok(SUCCESS)
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
