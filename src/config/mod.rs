//! Configuration for `PhantomFog`.
//!
//! Engine tuning lives in [`EngineLimits`], whose defaults are the fixed
//! pacing constants. Deployment settings (targets, dry run, dashboard
//! address, extra protected addresses) come from an optional YAML file
//! handled by [`loader`].

pub mod loader;

use std::net::IpAddr;
use std::time::Duration;

pub use loader::{FogConfig, load_config};

/// Floor of the emission rate, in packets per minute per target.
pub const BASE_RATE_PER_MIN: f64 = 6.0;

/// Ceiling of the emission rate, in packets per minute per target.
pub const MAX_RATE_PER_MIN: f64 = 200.0;

/// Upper bound on the attack-score contribution to the rate multiplier.
pub const ADAPT_MULTIPLIER: f64 = 5.0;

/// Candidate destination ports.
pub const DEFAULT_PORTS: [u16; 4] = [53, 80, 443, 8080];

/// Period of the rate controller.
pub const RATE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Addresses that never receive traffic.
pub const PROTECTED_ADDRESSES: [&str; 2] = ["192.168.1.1", "10.0.0.1"];

/// Pause taken by a worker whose target is protected.
pub const PROTECTED_PAUSE: Duration = Duration::from_secs(1);

/// Shortest pause between two sends from one worker.
pub const MIN_PAUSE: Duration = Duration::from_millis(100);

/// Default dashboard bind address.
pub const DEFAULT_DASHBOARD_ADDR: &str = "0.0.0.0:5000";

/// Default directory for the event log and fingerprint.
pub const DEFAULT_OUTPUT_DIR: &str = "./phantomfog_output";

/// Event log file name inside the output directory.
pub const LOG_FILE_NAME: &str = "fog_log.json";

/// Fingerprint file name inside the output directory.
pub const FINGERPRINT_FILE_NAME: &str = "fingerprint.json";

/// Pacing and policy parameters shared by every engine task.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineLimits {
    /// Rate floor (packets per minute).
    pub base_rate: f64,
    /// Rate ceiling (packets per minute).
    pub max_rate: f64,
    /// Cap on the attack-score multiplier term.
    pub adapt_multiplier: f64,
    /// Candidate destination ports.
    pub ports: Vec<u16>,
    /// Rate controller period.
    pub rate_check_interval: Duration,
    /// Deny list; workers bound to these never send.
    pub protected: Vec<String>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            base_rate: BASE_RATE_PER_MIN,
            max_rate: MAX_RATE_PER_MIN,
            adapt_multiplier: ADAPT_MULTIPLIER,
            ports: DEFAULT_PORTS.to_vec(),
            rate_check_interval: RATE_CHECK_INTERVAL,
            protected: PROTECTED_ADDRESSES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl EngineLimits {
    /// Returns the default limits with `extra` appended to the deny list.
    ///
    /// Built-in protected addresses are always kept.
    #[must_use]
    pub fn with_extra_protected<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut limits = Self::default();
        for addr in extra {
            let addr = addr.into();
            if !limits.protected.contains(&addr) {
                limits.protected.push(addr);
            }
        }
        limits
    }

    /// Whether `target` is on the deny list, as written or as the same IP
    /// literal in another canonical form.
    ///
    /// Host names and numeric aliases are only caught after resolution, by
    /// a sender built with [`protected_ips`](Self::protected_ips).
    #[must_use]
    pub fn is_protected(&self, target: &str) -> bool {
        let target = target.trim();
        if self.protected.iter().any(|p| p == target) {
            return true;
        }
        target
            .parse::<IpAddr>()
            .is_ok_and(|ip| self.protected_ips().contains(&ip.to_canonical()))
    }

    /// Deny-list entries that are IP literals, in canonical form.
    #[must_use]
    pub fn protected_ips(&self) -> Vec<IpAddr> {
        self.protected
            .iter()
            .filter_map(|p| p.parse::<IpAddr>().ok())
            .map(|ip| ip.to_canonical())
            .collect()
    }
}
