use whr930_bridge::{spawn_device_worker, CommandHandler};
use whr930_frame::VentilationLevel;
use whr930_transport::{DeviceTransport, SerialLink};

use crate::cmd::SetLevelArgs;
use crate::exit::{command_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_level, OutputFormat};

pub fn run(args: SetLevelArgs, format: OutputFormat) -> CliResult<i32> {
    // Reject bad input before touching the port.
    CommandHandler::parse_level(args.level.as_bytes())
        .map_err(|err| command_error("invalid level", err))?;

    let transport = args.device.open()?;
    let level = apply(transport, &args.level)?;

    print_level(level, &args.device.describe(), format);
    Ok(SUCCESS)
}

/// Write `level` to the unit and wait for the frame to leave the port.
fn apply<L: SerialLink + 'static>(
    transport: DeviceTransport<L>,
    level: &str,
) -> CliResult<VentilationLevel> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let (device, worker) = spawn_device_worker(transport, 1)
        .map_err(|err| io_error("failed to start serial worker", err))?;

    let handler = CommandHandler::new(device);
    let result = runtime.block_on(handler.handle_set_level(level.as_bytes()));
    drop(handler);

    worker
        .join()
        .map_err(|_| CliError::new(INTERNAL, "serial worker panicked"))?;

    result.map_err(|err| command_error("set-level failed", err))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use whr930_transport::{SimulatedDevice, TransportConfig};

    use super::*;
    use crate::exit::TRANSPORT_ERROR;

    fn transport(sim: &SimulatedDevice) -> DeviceTransport<SimulatedDevice> {
        DeviceTransport::with_config(
            sim.clone(),
            TransportConfig {
                settle_delay: Duration::from_millis(5),
                ..TransportConfig::default()
            },
        )
    }

    #[test]
    fn level_reaches_unit() {
        let sim = SimulatedDevice::new();
        let level = apply(transport(&sim), "2").unwrap();
        assert_eq!(level.get(), 2);
        assert_eq!(sim.stage(), 3);
        assert_eq!(sim.closes(), 1);
    }

    #[test]
    fn failed_write_exits_with_transport_error() {
        let sim = SimulatedDevice::new();
        sim.set_fail_io(true);

        let err = apply(transport(&sim), "3").unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("set-level failed"));
    }
}
