use crate::guard::Cleanup;
use crate::host::{HostSession, shell_quote, sudo};
use crate::timer::Timer;
use std::collections::BTreeMap;
use std::sync::Arc;
use testbed_core::{Error, Result};

/// Starts OpenVPN client services on testbed hosts.
#[derive(Clone)]
pub struct OpenVpn {
    hosts: Arc<BTreeMap<String, HostSession>>,
}

impl OpenVpn {
    pub fn new(hosts: Arc<BTreeMap<String, HostSession>>) -> Self {
        Self { hosts }
    }

    /// Starts `service` on `host` and waits for the tunnel to come up.
    pub async fn connect(&self, host: &str, service: &str) -> Result<VpnConnection> {
        let host = self
            .hosts
            .get(host)
            .ok_or_else(|| Error::UnknownHost(host.to_string()))?;
        VpnConnection::enter(host, service).await
    }
}

/// A running OpenVPN client service. Exit stops it.
pub struct VpnConnection {
    service: String,
    cleanup: Cleanup,
}

impl VpnConnection {
    async fn enter(host: &HostSession, service: &str) -> Result<Self> {
        let _timer = Timer::start("OpenVpn::connect").arg(host.name()).arg(service);
        let service_arg = shell_quote(service);
        let mut cleanup = Cleanup::new(host.clone());
        // Stop even when start fails half way.
        cleanup.push(sudo(&format!("systemctl stop {service_arg}")));
        host.sudo_check_output(&format!("systemctl start {service_arg}"))
            .await?;
        tokio::time::sleep(host.timings().openvpn_settle).await;
        Ok(Self {
            service: service.to_string(),
            cleanup,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn exit(mut self) -> Result<()> {
        self.cleanup.run().await
    }
}
