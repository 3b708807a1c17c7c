//! Report metadata: when the analysis ran, which litbench produced it and
//! the host it ran on. Timings taken under emulation or on another machine
//! are not comparable, so the host travels with every report.

use chrono::Utc;
use litbench_report::{ReportMeta, ReportSchema, SystemInfo};

const UNKNOWN_CPU: &str = "Unknown";

/// Metadata for a report produced now
pub fn build_report_meta() -> ReportMeta {
    ReportMeta {
        schema: ReportSchema::default(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: host_info(),
    }
}

fn host_info() -> SystemInfo {
    let cpu = std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|cpuinfo| cpu_model(&cpuinfo))
        .unwrap_or_else(|| UNKNOWN_CPU.to_string());
    let cpu_cores = std::thread::available_parallelism()
        .map_or(1, |n| u32::try_from(n.get()).unwrap_or(u32::MAX));

    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu,
        cpu_cores,
    }
}

/// First CPU name in `/proc/cpuinfo` text. x86 reports `model name`, most
/// ARM kernels only `Hardware` or `Processor`.
fn cpu_model(cpuinfo: &str) -> Option<String> {
    ["model name", "Hardware", "Processor"].iter().find_map(|key| {
        cpuinfo.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            let value = value.trim();
            (name.trim() == *key && !value.is_empty()).then(|| value.to_string())
        })
    })
}
