use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use blacktea_bridge::config::load_config;
use blacktea_bridge::logging::init_logging;
use blacktea_bridge::{Adb, CancelToken, DeviceEntry, Fastboot, TraceSink, TracingSink};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Args {
    serial: Option<String>,
    out_dir: Option<PathBuf>,
    json: bool,
    adb_path: Option<String>,
    fastboot_path: Option<String>,
    with_mode_cycle: bool,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    serial: Option<String>,
    adb_program: String,
    fastboot_program: String,
    out_dir: String,
    artifacts: HashMap<String, String>,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|warn|skip
    duration_ms: u128,
    artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct DeviceProperties {
    serial: String,
    product: String,
    model: String,
    manufacturer: String,
    os_version: String,
}

fn parse_args() -> Result<Args, String> {
    let mut serial = std::env::var("ANDROID_SERIAL")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let mut out_dir: Option<PathBuf> = None;
    let mut json = false;
    let mut adb_path: Option<String> = None;
    let mut fastboot_path: Option<String> = None;
    let mut with_mode_cycle = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--serial" => {
                serial = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if serial.is_none() {
                    return Err("--serial requires a value".to_string());
                }
            }
            "--out" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(value));
            }
            "--json" => {
                json = true;
            }
            "--adb" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--adb requires a value".to_string())?;
                adb_path = Some(value);
            }
            "--fastboot" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--fastboot requires a value".to_string())?;
                fastboot_path = Some(value);
            }
            "--with-mode-cycle" => {
                with_mode_cycle = true;
            }
            "-h" | "--help" => {
                return Err(
                    "Usage: cargo run --bin smoke -- [--serial SERIAL] [--out DIR] [--json] [--adb PATH] [--fastboot PATH] [--with-mode-cycle]\n"
                        .to_string(),
                );
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }

    Ok(Args {
        serial,
        out_dir,
        json,
        adb_path,
        fastboot_path,
        with_mode_cycle,
    })
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|err| format!("Failed to create dir {}: {err}", path.display()))
}

fn run_check<F>(checks: &mut Vec<SmokeCheck>, name: &'static str, f: F) -> Result<(), ()>
where
    F: FnOnce() -> Result<Vec<String>, String>,
{
    let start = Instant::now();
    match f() {
        Ok(artifacts) => {
            checks.push(SmokeCheck {
                name,
                status: "pass",
                duration_ms: start.elapsed().as_millis(),
                artifacts,
                error: None,
            });
            Ok(())
        }
        Err(err) => {
            checks.push(SmokeCheck {
                name,
                status: "fail",
                duration_ms: start.elapsed().as_millis(),
                artifacts: vec![],
                error: Some(err),
            });
            Err(())
        }
    }
}

fn skip_check(checks: &mut Vec<SmokeCheck>, name: &'static str) {
    checks.push(SmokeCheck {
        name,
        status: "skip",
        duration_ms: 0,
        artifacts: vec![],
        error: None,
    });
}

fn finish(summary: &SmokeSummary, json: bool) -> ! {
    let output = if json {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
    } else {
        format!(
            "status: {}\ntrace_id: {}\nout: {}",
            summary.status, summary.trace_id, summary.out_dir
        )
    };
    println!("{output}");
    std::process::exit(if summary.status == "pass" { 0 } else { 1 });
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    init_logging();
    let trace_id = Uuid::new_v4().to_string();

    let out_dir = args.out_dir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("blacktea_bridge_smoke_{trace_id}"))
    });
    if let Err(err) = ensure_dir(&out_dir) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let mut config = match load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Failed to load config: {err}");
            std::process::exit(1);
        }
    };
    if let Some(path) = args.adb_path.clone() {
        config.adb.command_path = path;
    }
    if let Some(path) = args.fastboot_path.clone() {
        config.fastboot.command_path = path;
    }

    let sink: Arc<dyn TraceSink> = Arc::new(TracingSink);
    let adb = Adb::with_sink(config.adb_program(), Arc::clone(&sink));
    let fastboot = Fastboot::with_sink(config.fastboot_program(), sink);
    let mut artifacts: HashMap<String, String> = HashMap::new();
    let mut checks: Vec<SmokeCheck> = Vec::new();
    let mut status = "pass";

    if run_check(&mut checks, "check_adb", || {
        adb.check().map_err(|err| err.to_string())?;
        let version = adb.version().map_err(|err| err.to_string())?;
        let path = out_dir.join("adb_version.txt");
        fs::write(&path, &version)
            .map_err(|err| format!("Failed to write adb version: {err}"))?;
        artifacts.insert("adb_version".to_string(), path.to_string_lossy().to_string());
        Ok(vec![path.to_string_lossy().to_string()])
    })
    .is_err()
    {
        status = "fail";
    }

    // A host without fastboot can still exercise everything normal-mode.
    let fastboot_available = match fastboot.check() {
        Ok(()) => {
            checks.push(SmokeCheck {
                name: "check_fastboot",
                status: "pass",
                duration_ms: 0,
                artifacts: vec![],
                error: None,
            });
            true
        }
        Err(err) => {
            checks.push(SmokeCheck {
                name: "check_fastboot",
                status: "warn",
                duration_ms: 0,
                artifacts: vec![],
                error: Some(err.to_string()),
            });
            false
        }
    };

    let mut enumerated: Vec<DeviceEntry> = Vec::new();
    if run_check(&mut checks, "adb_devices", || {
        let devices = adb.devices().map_err(|err| err.to_string())?;
        enumerated = devices.iter().map(|d| d.entry().clone()).collect();
        let path = out_dir.join("adb_devices.json");
        let body = serde_json::to_string_pretty(&enumerated)
            .map_err(|err| format!("Failed to serialize device list: {err}"))?;
        fs::write(&path, body).map_err(|err| format!("Failed to write device list: {err}"))?;
        artifacts.insert("adb_devices".to_string(), path.to_string_lossy().to_string());
        Ok(vec![path.to_string_lossy().to_string()])
    })
    .is_err()
    {
        status = "fail";
    }

    if fastboot_available {
        if run_check(&mut checks, "fastboot_devices", || {
            let devices = fastboot.devices().map_err(|err| err.to_string())?;
            let serials: Vec<String> = devices.iter().map(|d| d.serial().to_string()).collect();
            let path = out_dir.join("fastboot_devices.json");
            let body = serde_json::to_string_pretty(&serials)
                .map_err(|err| format!("Failed to serialize serial list: {err}"))?;
            fs::write(&path, body)
                .map_err(|err| format!("Failed to write serial list: {err}"))?;
            artifacts.insert(
                "fastboot_devices".to_string(),
                path.to_string_lossy().to_string(),
            );
            Ok(vec![path.to_string_lossy().to_string()])
        })
        .is_err()
        {
            status = "fail";
        }
    } else {
        skip_check(&mut checks, "fastboot_devices");
    }

    // Probe properties on the requested device, or on the single attached one.
    let serial = args.serial.clone().or_else(|| match enumerated.as_slice() {
        [only] => Some(only.serial.clone()),
        _ => None,
    });

    if let Some(serial) = serial.clone() {
        if run_check(&mut checks, "device_properties", || {
            let devices = adb.devices().map_err(|err| err.to_string())?;
            let device = devices
                .iter()
                .find(|d| d.serial() == serial)
                .ok_or_else(|| format!("Device {serial} is not attached"))?;
            let properties = DeviceProperties {
                serial: serial.clone(),
                product: device.product().map_err(|err| err.to_string())?,
                model: device.model().map_err(|err| err.to_string())?,
                manufacturer: device.manufacturer().map_err(|err| err.to_string())?,
                os_version: device.os_version().map_err(|err| err.to_string())?,
            };
            let path = out_dir.join("device_properties.json");
            let body = serde_json::to_string_pretty(&properties)
                .map_err(|err| format!("Failed to serialize properties: {err}"))?;
            fs::write(&path, body)
                .map_err(|err| format!("Failed to write properties: {err}"))?;
            artifacts.insert(
                "device_properties".to_string(),
                path.to_string_lossy().to_string(),
            );
            Ok(vec![path.to_string_lossy().to_string()])
        })
        .is_err()
        {
            status = "fail";
        }
    } else {
        skip_check(&mut checks, "device_properties");
    }

    // Opt-in: reboots the device into the bootloader and back. Slow, and it
    // interrupts whatever the device was doing.
    let cycle_serial = serial
        .clone()
        .filter(|_| args.with_mode_cycle && fastboot_available);
    if let Some(serial) = cycle_serial {
        if run_check(&mut checks, "mode_cycle", || {
            let token = CancelToken::with_timeout(Duration::from_secs(180));
            let devices = adb.devices().map_err(|err| err.to_string())?;
            let device = devices
                .iter()
                .find(|d| d.serial() == serial)
                .ok_or_else(|| format!("Device {serial} is not attached"))?;

            let in_bootloader = device
                .switch_to_fastboot(&fastboot, &token)
                .map_err(|err| format!("Switch to fastboot failed: {err}"))?;
            let product = in_bootloader
                .product()
                .map_err(|err| format!("Bootloader getvar failed: {err}"))?;
            let restored = in_bootloader
                .switch_to_adb(&adb, &token)
                .map_err(|err| format!("Switch back to adb failed: {err}"))?;

            let path = out_dir.join("mode_cycle.txt");
            let body = format!(
                "serial: {}\nbootloader product: {product}\nrestored serial: {}\n",
                serial,
                restored.serial()
            );
            fs::write(&path, body)
                .map_err(|err| format!("Failed to write mode cycle report: {err}"))?;
            artifacts.insert("mode_cycle".to_string(), path.to_string_lossy().to_string());
            Ok(vec![path.to_string_lossy().to_string()])
        })
        .is_err()
        {
            status = "fail";
        }
    } else {
        skip_check(&mut checks, "mode_cycle");
    }

    let summary = SmokeSummary {
        tool: "blacktea_bridge_smoke",
        status,
        trace_id,
        serial,
        adb_program: config.adb_program(),
        fastboot_program: config.fastboot_program(),
        out_dir: out_dir.to_string_lossy().to_string(),
        artifacts,
        checks,
    };
    finish(&summary, args.json);
}
