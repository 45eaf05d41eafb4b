//! VM lifecycle through Vagrant, with a cached view of which VMs run.
//!
//! Asking Vagrant for state takes seconds, so [`Vagrant`] keeps its own map
//! of VM name to running state. The map is only refreshed by
//! [`Vagrant::rescan_state`]; anything that changes VMs behind its back
//! leaves it stale.

use crate::timer::Timer;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use testbed_core::{Error, Result, VmProvider, VmStatus};
use tokio::process::Command;

/// [`VmProvider`] that shells out to the `vagrant` binary.
pub struct VagrantCli {
    project_dir: PathBuf,
}

impl VagrantCli {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn find_binary() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TESTBED_VAGRANT_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        which::which("vagrant").ok()
    }

    async fn vagrant(&self, args: &[&str]) -> Result<String> {
        let binary = Self::find_binary().ok_or_else(|| Error::ToolNotFound("vagrant".into()))?;
        tracing::debug!(dir = %self.project_dir.display(), "vagrant {}", args.join(" "));

        let mut cmd = Command::new(&binary);
        cmd.args(args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = cmd
            .output()
            .await
            .map_err(|e| Error::Provider(format!("failed to run vagrant: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Provider(format!(
                "vagrant {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim_end()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VmProvider for VagrantCli {
    fn name(&self) -> &'static str {
        "vagrant"
    }

    fn is_available(&self) -> bool {
        Self::find_binary().is_some()
    }

    async fn status(&self) -> Result<Vec<VmStatus>> {
        let output = self.vagrant(&["status", "--machine-readable"]).await?;
        Ok(parse_machine_readable(&output))
    }

    async fn up(&self, vm: &str) -> Result<()> {
        self.vagrant(&["up", vm]).await?;
        Ok(())
    }

    async fn halt(&self, vm: &str) -> Result<()> {
        self.vagrant(&["halt", vm]).await?;
        Ok(())
    }
}

/// Extracts `timestamp,target,state,<state>` records from
/// `vagrant status --machine-readable`.
pub fn parse_machine_readable(output: &str) -> Vec<VmStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.trim_end_matches('\r').splitn(5, ',');
            let _timestamp = fields.next()?;
            let target = fields.next()?;
            let kind = fields.next()?;
            let state = fields.next()?;
            if kind != "state" || target.is_empty() {
                return None;
            }
            Some(VmStatus {
                name: target.to_string(),
                state: state.to_string(),
                running: state == "running",
            })
        })
        .collect()
}

/// Cached VM running state over a [`VmProvider`].
pub struct Vagrant {
    provider: Box<dyn VmProvider>,
    state: Mutex<BTreeMap<String, bool>>,
    reboot_settle: Duration,
}

impl Vagrant {
    /// Wraps `provider` and loads the current state once.
    pub async fn new(provider: Box<dyn VmProvider>, reboot_settle: Duration) -> Result<Self> {
        let vagrant = Self {
            provider,
            state: Mutex::new(BTreeMap::new()),
            reboot_settle,
        };
        vagrant.rescan_state().await?;
        Ok(vagrant)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Replaces the cache with what the provider reports now.
    pub async fn rescan_state(&self) -> Result<()> {
        let mut timer = Timer::start("Vagrant::rescan_state");
        let statuses = self.provider.status().await?;
        let state: BTreeMap<String, bool> = statuses
            .into_iter()
            .map(|status| (status.name, status.running))
            .collect();
        timer.set_result(&state);
        *self.lock() = state;
        Ok(())
    }

    pub fn state(&self) -> BTreeMap<String, bool> {
        self.lock().clone()
    }

    pub fn all_vms(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn running_vms(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, running)| **running)
            .map(|(vm, _)| vm.clone())
            .collect()
    }

    pub fn is_running(&self, vm: &str) -> Result<bool> {
        self.lock()
            .get(vm)
            .copied()
            .ok_or_else(|| Error::UnknownVm(vm.to_string()))
    }

    /// Starts `vm` unless the cache already shows it running.
    pub async fn up(&self, vm: &str) -> Result<()> {
        if self.is_running(vm)? {
            return Ok(());
        }
        let _timer = Timer::start("Vagrant::up").arg(vm);
        tracing::info!(vm, "bringing VM up");
        self.provider.up(vm).await?;
        self.lock().insert(vm.to_string(), true);
        Ok(())
    }

    /// Halts `vm` unless the cache already shows it stopped.
    pub async fn down(&self, vm: &str) -> Result<()> {
        if !self.is_running(vm)? {
            return Ok(());
        }
        let _timer = Timer::start("Vagrant::down").arg(vm);
        tracing::info!(vm, "bringing VM down");
        self.provider.halt(vm).await?;
        self.lock().insert(vm.to_string(), false);
        Ok(())
    }

    /// Downs then ups each VM in turn, then waits for guests to settle.
    pub async fn reboot(&self, vms: &[&str]) -> Result<()> {
        let _timer = Timer::start("Vagrant::reboot").arg(vms.join(", "));
        for vm in vms {
            self.down(vm).await?;
            self.up(vm).await?;
        }
        tokio::time::sleep(self.reboot_settle).await;
        Ok(())
    }

    pub async fn set_state(&self, vm: &str, up: bool) -> Result<()> {
        if up { self.up(vm).await } else { self.down(vm).await }
    }

    /// Brings every known VM up except those in `down`, which are halted.
    ///
    /// Returns whether any VM changed state.
    pub async fn set_states(&self, down: &[&str]) -> Result<bool> {
        let mut timer = Timer::start("Vagrant::set_states").arg(down.join(", "));
        let known = self.state();
        if let Some(vm) = down.iter().find(|vm| !known.contains_key(**vm)) {
            return Err(Error::UnknownVm(vm.to_string()));
        }

        let mut changed = false;
        for (vm, running) in &known {
            let want_up = !down.contains(&vm.as_str());
            if *running != want_up {
                self.set_state(vm, want_up).await?;
                changed = true;
            }
        }
        timer.set_result(changed);
        Ok(changed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, bool>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
