//! System metadata served on `GET /`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};

/// Name reported in the `service` field
pub const SERVICE_NAME: &str = "CDK Infrastructure Demo";

/// Highest resident set size seen by any snapshot
static PEAK_RSS: AtomicU64 = AtomicU64::new(0);

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub service: String,
    pub hostname: String,
    pub platform: String,
    pub runtime: String,
    /// Seconds since the process started
    pub uptime: f64,
    pub memory: MemoryUsage,
    /// ISO-8601, UTC, millisecond precision
    pub timestamp: String,
}

/// Process memory snapshot in bytes. Fields the OS does not expose stay 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_size: u64,
    pub peak_rss: u64,
}

impl SystemInfo {
    pub fn collect(uptime: Duration) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            hostname: resolve_hostname(),
            platform: std::env::consts::OS.to_string(),
            runtime: runtime_version(),
            uptime: uptime.as_secs_f64(),
            memory: MemoryUsage::snapshot(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

fn runtime_version() -> String {
    format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    )
}

/// OS hostname, then `HOSTNAME`, then `localhost`
fn resolve_hostname() -> String {
    System::host_name()
        .filter(|name| !name.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|name| !name.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

impl MemoryUsage {
    /// Refresh only this process and read its memory counters
    pub fn snapshot() -> Self {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return Self::default();
        };
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid).map_or_else(Self::default, |process| {
            Self::from_sample(process.memory(), process.virtual_memory())
        })
    }

    fn from_sample(rss: u64, virtual_size: u64) -> Self {
        let previous_peak = PEAK_RSS.fetch_max(rss, Ordering::Relaxed);
        Self {
            rss,
            virtual_size,
            peak_rss: previous_peak.max(rss),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_never_below_current() {
        let high = MemoryUsage::from_sample(64 * 1024 * 1024, 128 * 1024 * 1024);
        assert!(high.peak_rss >= high.rss);

        let low = MemoryUsage::from_sample(1024, 4096);
        assert_eq!(low.rss, 1024);
        assert_eq!(low.virtual_size, 4096);
        assert!(low.peak_rss >= 64 * 1024 * 1024);
    }

    #[test]
    fn test_snapshot_of_running_process() {
        let usage = MemoryUsage::snapshot();
        assert!(usage.rss > 0);
        assert!(usage.virtual_size >= usage.rss);
        assert!(usage.peak_rss >= usage.rss);
    }

    #[test]
    fn test_collect_fields() {
        let info = SystemInfo::collect(Duration::from_millis(1500));
        assert_eq!(info.service, SERVICE_NAME);
        assert!(!info.hostname.is_empty());
        assert_eq!(info.platform, std::env::consts::OS);
        assert!((info.uptime - 1.5).abs() < f64::EPSILON);
        assert!(chrono::DateTime::parse_from_rfc3339(&info.timestamp).is_ok());
        assert!(info.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_serialized_field_names() {
        let info = SystemInfo::collect(Duration::ZERO);
        let value = serde_json::to_value(&info).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["hostname", "memory", "platform", "runtime", "service", "timestamp", "uptime"]
        );
        assert!(value["memory"]["virtual"].is_u64());
    }
}
