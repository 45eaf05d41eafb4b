use crate::host::{HostSession, shell_quote};
use crate::lines::Lines;
use testbed_core::Result;

/// systemd journal on one host.
pub struct Journal {
    host: HostSession,
}

impl Journal {
    pub fn new(host: HostSession) -> Self {
        Self { host }
    }

    /// Drops everything logged so far.
    pub async fn clear(&self) -> Result<()> {
        self.host.sudo_check_output("journalctl --flush").await?;
        self.host
            .sudo_check_output("journalctl --rotate --vacuum-time=1s")
            .await?;
        Ok(())
    }

    /// Messages logged by `service`, without metadata.
    pub async fn entries(&self, service: &str) -> Result<Lines> {
        self.host.sudo_check_output("journalctl --flush").await?;
        let output = self
            .host
            .sudo_check_output(&format!("journalctl -o cat -u {}", shell_quote(service)))
            .await?;
        Ok(Lines::new(&output).named(format!("{} {service}", self.host.name())))
    }
}
