//! The per-process view of the testbed.
//!
//! [`Testbed`] is built once and passed to every test. It owns the parsed
//! inventory and address table, one [`HostSession`] per host and the VM
//! state cache, and hands out the verifiers and test doubles.

use crate::cases::TestCase;
use crate::email::Email;
use crate::host::HostSession;
use crate::inventory::Inventory;
use crate::mockserver::MockServer;
use crate::net::Net;
use crate::openvpn::OpenVpn;
use crate::ssh::SshRunner;
use crate::timer::Timer;
use crate::vagrant::{Vagrant, VagrantCli};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use testbed_core::{
    Addrs, DeploymentConfig, Error, Ipv4Net, Masks, Result, Settings, VmProvider,
};

/// Host that runs the mail-capture and mock HTTP services.
const SERVICES_HOST: &str = "internet";

pub struct Testbed {
    settings: Settings,
    inventory: Inventory,
    hosts: Arc<BTreeMap<String, HostSession>>,
    addrs: Arc<Addrs>,
    masks: Masks,
    vagrant: Arc<Vagrant>,
}

impl Testbed {
    /// Loads the inventory and `config.json`, opens SSH sessions and reads
    /// VM state from Vagrant.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let _timer = Timer::start("Testbed::connect");
        let inventory = Inventory::load(settings.resolve(&settings.inventory))?;
        let config = DeploymentConfig::load(settings.resolve(&settings.config))?;
        let ssh_config = settings.resolve(&settings.ssh_config);

        let mut hosts = BTreeMap::new();
        for name in inventory.hostnames() {
            let runner = SshRunner::new(name.clone(), &ssh_config)?.with_timeout(settings.ssh_timeout);
            let session = HostSession::new(name.clone(), Arc::new(runner));
            hosts.insert(name, session);
        }

        let provider = VagrantCli::new(settings.project_dir.clone());
        if !provider.is_available() {
            return Err(Error::ToolNotFound("vagrant".into()));
        }
        let vagrant = Vagrant::new(Box::new(provider), settings.timings.reboot_settle).await?;
        tracing::info!(
            hosts = hosts.len(),
            addrs = config.addrs.len(),
            running = ?vagrant.running_vms(),
            "connected to testbed"
        );

        Ok(Self::from_parts(settings, inventory, hosts, config, vagrant))
    }

    /// Assembles a testbed from already-built parts.
    ///
    /// Host sessions pick up the timings from `settings`.
    pub fn from_parts(
        settings: Settings,
        inventory: Inventory,
        hosts: BTreeMap<String, HostSession>,
        config: DeploymentConfig,
        vagrant: Vagrant,
    ) -> Self {
        let hosts = hosts
            .into_iter()
            .map(|(name, host)| (name, host.with_timings(settings.timings)))
            .collect();
        Self {
            settings,
            inventory,
            hosts: Arc::new(hosts),
            addrs: Arc::new(config.addrs),
            masks: config.masks,
            vagrant: Arc::new(vagrant),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn host(&self, name: &str) -> Result<&HostSession> {
        self.hosts
            .get(name)
            .ok_or_else(|| Error::UnknownHost(name.to_string()))
    }

    pub fn hosts(&self) -> &BTreeMap<String, HostSession> {
        &self.hosts
    }

    /// Hosts grouped by type, each group sorted by name.
    pub fn hosts_by_type(&self) -> Result<BTreeMap<String, Vec<(String, HostSession)>>> {
        let by_type = crate::cases::hostnames_by_type(self.hosts.keys().map(String::as_str))?;
        by_type
            .into_iter()
            .map(|(host_type, names)| {
                let hosts = names
                    .into_iter()
                    .map(|name| Ok((name.clone(), self.host(&name)?.clone())))
                    .collect::<Result<Vec<_>>>()?;
                Ok((host_type, hosts))
            })
            .collect()
    }

    pub fn addr(&self, name: &str) -> Result<Ipv4Addr> {
        self.addrs.get(name)
    }

    pub fn addrs(&self) -> &Addrs {
        &self.addrs
    }

    pub fn mask(&self, name: &str) -> Result<Ipv4Net> {
        self.masks.get(name)
    }

    pub fn masks(&self) -> &Masks {
        &self.masks
    }

    pub fn vagrant(&self) -> &Vagrant {
        &self.vagrant
    }

    pub fn net(&self) -> Net {
        Net::new(
            Arc::clone(&self.hosts),
            Arc::clone(&self.addrs),
            Arc::clone(&self.vagrant),
            self.settings.max_parallel,
        )
    }

    pub fn openvpn(&self) -> OpenVpn {
        OpenVpn::new(Arc::clone(&self.hosts))
    }

    /// Mail-capture client with its mailbox already emptied.
    pub async fn email(&self) -> Result<Email> {
        let email = Email::new(
            self.addr(SERVICES_HOST)?,
            self.settings.email_port,
            self.settings.http_timeout,
            self.settings.timings.email_settle,
        )?;
        email.clear().await?;
        Ok(email)
    }

    /// Mock server client with all expectations reset.
    pub async fn mockserver(&self) -> Result<MockServer> {
        let mut mockserver = MockServer::new(
            self.addr(SERVICES_HOST)?,
            self.settings.mockserver_port,
            self.settings.http_timeout,
        )?;
        mockserver.clear().await?;
        Ok(mockserver)
    }

    /// Brings every VM up except `vms_down`, waiting for the fleet to
    /// settle if anything changed. Returns whether anything changed.
    pub async fn ensure_vm_state<S: AsRef<str>>(&self, vms_down: &[S]) -> Result<bool> {
        let down: Vec<&str> = vms_down.iter().map(|vm| vm.as_ref()).collect();
        let changed = self.vagrant.set_states(&down).await?;
        if changed {
            tokio::time::sleep(self.settings.timings.vm_state_settle).await;
        }
        Ok(changed)
    }

    /// Gets the fleet into the state `case` needs.
    pub async fn prepare(&self, case: &TestCase) -> Result<()> {
        tracing::info!(case = %case.id(), "preparing test case");
        self.ensure_vm_state(&case.vms_down).await?;
        Ok(())
    }
}
