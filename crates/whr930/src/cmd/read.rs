use whr930_bridge::{spawn_device_worker, MemorySink, PollerConfig, TelemetryPoller, Topics};

use crate::cmd::{frame_check, ReadArgs};
use crate::exit::{io_error, CliError, CliResult, INTERNAL};
use crate::output::{print_report, report_exit_code, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let transport = args.device.open()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let (device, worker) = spawn_device_worker(transport, 2)
        .map_err(|err| io_error("failed to start serial worker", err))?;

    let config = PollerConfig {
        frame_check: frame_check(args.strict_frames),
        ..PollerConfig::default()
    };
    let topics = Topics::new(args.topic_prefix.clone());
    let poller = TelemetryPoller::new(device, MemorySink::new(), topics, config);

    let report = runtime.block_on(poller.poll_once());
    drop(poller);
    worker
        .join()
        .map_err(|_| CliError::new(INTERNAL, "serial worker panicked"))?;

    print_report(&report, &args.device.describe(), format);
    Ok(report_exit_code(&report))
}
