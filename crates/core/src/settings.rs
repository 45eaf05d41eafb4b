//! Harness settings.
//!
//! Everything has a default matching the stock Vagrant testbed, so a missing
//! settings file is fine. Values can be overridden from a TOML file:
//!
//! ```toml
//! inventory = ".vagrant/provisioners/ansible/inventory/vagrant_ansible_inventory"
//! max_parallel = 8
//!
//! [timings]
//! reboot_settle = 45
//! ```
//!
//! Durations are written in whole seconds.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INVENTORY: &str =
    ".vagrant/provisioners/ansible/inventory/vagrant_ansible_inventory";
pub const DEFAULT_CONFIG: &str = "config.json";
pub const DEFAULT_SSH_CONFIG: &str = "ssh_config";
pub const DEFAULT_EMAIL_PORT: u16 = 1080;
pub const DEFAULT_MOCKSERVER_PORT: u16 = 443;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed waits the harness makes while the fleet converges.
///
/// None of these are readiness checks; they are empirical grace periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// After rebooting VMs, before guest services are usable.
    #[serde(with = "secs")]
    pub reboot_settle: Duration,
    /// After bringing VMs up or down for a test case.
    #[serde(with = "secs")]
    pub vm_state_settle: Duration,
    /// Before clearing captured email, so late login emails land first.
    #[serde(with = "secs")]
    pub email_settle: Duration,
    /// After starting an OpenVPN client service.
    #[serde(with = "secs")]
    pub openvpn_settle: Duration,
    /// Between the neutral clock jump and the target time in a cron run.
    #[serde(with = "secs")]
    pub cron_clock_settle: Duration,
    /// Upper bound on waiting for the watched cron command to appear.
    #[serde(with = "secs")]
    pub cron_start_timeout: Duration,
    /// After a cron run is fully restored.
    #[serde(with = "secs")]
    pub cron_exit_settle: Duration,
}

impl Timings {
    /// All waits zeroed, for tests against scripted hosts.
    pub fn none() -> Self {
        Self {
            reboot_settle: Duration::ZERO,
            vm_state_settle: Duration::ZERO,
            email_settle: Duration::ZERO,
            openvpn_settle: Duration::ZERO,
            cron_clock_settle: Duration::ZERO,
            cron_start_timeout: Duration::ZERO,
            cron_exit_settle: Duration::ZERO,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reboot_settle: Duration::from_secs(60),
            vm_state_settle: Duration::from_secs(30),
            email_settle: Duration::from_secs(5),
            openvpn_settle: Duration::from_secs(20),
            cron_clock_settle: Duration::from_secs(90),
            cron_start_timeout: Duration::from_secs(60),
            cron_exit_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the `Vagrantfile`.
    pub project_dir: PathBuf,
    pub inventory: PathBuf,
    pub config: PathBuf,
    pub ssh_config: PathBuf,
    pub email_port: u16,
    pub mockserver_port: u16,
    #[serde(with = "secs")]
    pub http_timeout: Duration,
    /// Per-command SSH timeout. Unset leaves it to ssh and the remote tool.
    #[serde(with = "opt_secs")]
    pub ssh_timeout: Option<Duration>,
    /// Upper bound on concurrent probes in one network check.
    pub max_parallel: usize,
    pub timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            inventory: PathBuf::from(DEFAULT_INVENTORY),
            config: PathBuf::from(DEFAULT_CONFIG),
            ssh_config: PathBuf::from(DEFAULT_SSH_CONFIG),
            email_port: DEFAULT_EMAIL_PORT,
            mockserver_port: DEFAULT_MOCKSERVER_PORT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            ssh_timeout: None,
            max_parallel: default_max_parallel(),
            timings: Timings::default(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Resolves a relative path setting against `project_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }
}

fn default_max_parallel() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cpus + 4).min(32)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
