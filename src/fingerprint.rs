//! Host fingerprint collection.
//!
//! A best-effort snapshot of the machine the engine runs on, written next
//! to the event log at startup. Collection never fails: anything that
//! cannot be read is left out, and a hostname lookup failure is reported
//! in the `error` field.

use std::path::Path;

use serde::Serialize;

use crate::error::FogError;

/// Where Linux exposes network interfaces.
const SYS_NET_DIR: &str = "/sys/class/net";

/// One network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    /// Interface name (`eth0`, `lo`, ...).
    pub name: String,
    /// Hardware address, when the kernel reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

/// Host information snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    /// Host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Operating system family.
    pub platform: String,
    /// Network interfaces, sorted by name.
    pub interfaces: Vec<InterfaceInfo>,
    /// Logical CPU count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<usize>,
    /// What went wrong during collection, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Fingerprint {
    /// Collects a fingerprint of the local host.
    #[must_use]
    pub fn collect() -> Self {
        Self::collect_from(Path::new(SYS_NET_DIR))
    }

    /// Collects a fingerprint reading interfaces from `net_dir`.
    #[must_use]
    pub fn collect_from(net_dir: &Path) -> Self {
        let (hostname, error) = match hostname::get() {
            Ok(name) => (Some(name.to_string_lossy().into_owned()), None),
            Err(e) => (None, Some(format!("hostname lookup failed: {e}"))),
        };

        Self {
            hostname,
            platform: std::env::consts::OS.to_string(),
            interfaces: read_interfaces(net_dir),
            cpu_count: std::thread::available_parallelism().ok().map(usize::from),
            error,
        }
    }

    /// Writes the fingerprint as pretty JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn persist(&self, path: &Path) -> Result<(), FogError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn read_interfaces(net_dir: &Path) -> Vec<InterfaceInfo> {
    let Ok(entries) = std::fs::read_dir(net_dir) else {
        return Vec::new();
    };

    let mut interfaces: Vec<InterfaceInfo> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let mac = std::fs::read_to_string(entry.path().join("address"))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            InterfaceInfo { name, mac }
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}
