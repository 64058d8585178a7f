use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use whr930_bridge::{CycleReport, TelemetryGroup};
use whr930_frame::VentilationLevel;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// `topic payload` lines, one per message.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReadOutput<'a> {
    device: &'a str,
    #[serde(flatten)]
    report: &'a CycleReport,
}

pub fn print_report(report: &CycleReport, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReadOutput { device, report };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOPIC", "VALUE"]);
            for publication in &report.published {
                table.add_row(vec![publication.topic.clone(), publication.payload.clone()]);
            }
            for group in &report.skipped {
                table.add_row(vec![group.to_string(), "unavailable".to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Unit {device}:");
            match &report.temperatures {
                Some(t) => {
                    println!("  Outside air:   {:.1} °C", t.outside);
                    println!("  Supply air:    {:.1} °C", t.supply);
                    println!("  Return air:    {:.1} °C", t.return_air);
                    println!("  Exhaust air:   {:.1} °C", t.exhaust);
                }
                None => println!("  Temperatures:  unavailable"),
            }
            match &report.fan_status {
                Some(s) => {
                    println!("  Level:         {}", s.fan_level);
                    println!(
                        "  Air levels:    return {}%, supply {}%",
                        s.return_air_level, s.supply_air_level
                    );
                }
                None => println!("  Fan status:    unavailable"),
            }
        }
        OutputFormat::Raw => {
            for publication in &report.published {
                println!("{} {}", publication.topic, publication.payload);
            }
        }
    }
}

#[derive(Serialize)]
struct LevelOutput<'a> {
    device: &'a str,
    level: VentilationLevel,
    written: bool,
}

pub fn print_level(level: VentilationLevel, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LevelOutput {
                device,
                level,
                written: true,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["DEVICE", "LEVEL"])
                .add_row(vec![device.to_string(), level.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("Ventilation level set to {level} on {device}"),
        OutputFormat::Raw => println!("{level}"),
    }
}

/// Exit code for a one-shot read: everything missing is a failure, a
/// partial read is invalid data.
pub fn report_exit_code(report: &CycleReport) -> i32 {
    let all = [TelemetryGroup::Temperatures, TelemetryGroup::FanStatus];
    if report.skipped.is_empty() {
        crate::exit::SUCCESS
    } else if all.iter().all(|g| report.skipped.contains(g)) {
        crate::exit::FAILURE
    } else {
        crate::exit::DATA_INVALID
    }
}
