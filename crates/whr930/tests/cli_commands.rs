#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn whr930(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_whr930"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("WHR930_DEVICE")
        .env_remove("WHR930_TOPIC_PREFIX")
        .output()
        .expect("whr930 should run")
}

#[test]
fn version_prints_package_version() {
    let output = whr930(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("whr930 {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_lists_serial_settings() {
    let output = whr930(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: whr930"));
    assert!(stdout.contains("9600 baud 8N1"));
}

#[test]
fn read_against_simulated_unit_outputs_json() {
    let output = whr930(&[
        "--format",
        "json",
        "read",
        "--simulate",
        "--settle-delay",
        "10ms",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid json");
    assert_eq!(value["device"], "simulated");
    assert_eq!(value["published"].as_array().map(Vec::len), Some(5));
    assert_eq!(value["skipped"].as_array().map(Vec::len), Some(0));
    assert_eq!(
        value["published"][0]["topic"],
        "house/2/attic/wtw/outside_air_temp"
    );
    assert_eq!(value["published"][0]["payload"], "20.0");
    assert_eq!(value["fan_status"]["fan_level"], 1);
}

#[test]
fn read_raw_uses_custom_prefix() {
    let output = whr930(&[
        "--format",
        "raw",
        "read",
        "--simulate",
        "--settle-delay",
        "10ms",
        "--topic-prefix",
        "lab/wtw",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[4], "lab/wtw/ventilation_level 1");
}

#[test]
fn set_level_on_simulated_unit() {
    let output = whr930(&[
        "--format",
        "json",
        "set-level",
        "3",
        "--simulate",
        "--settle-delay",
        "10ms",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"level\":3"));
}

#[test]
fn set_level_out_of_range_returns_64() {
    let output = whr930(&["set-level", "4", "--simulate"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("out of range"));
}

#[test]
fn missing_serial_device_returns_3() {
    let output = whr930(&["read", "--device", "/dev/whr930-cli-missing-port"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot open serial device"));
}

#[test]
fn run_with_zero_poll_interval_returns_64() {
    let output = whr930(&["run", "--simulate", "--poll-interval", "0s"]);
    assert_eq!(output.status.code(), Some(64));
}
