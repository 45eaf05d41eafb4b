use crate::guard::Cleanup;
use crate::host::{HostSession, sudo};
use chrono::{NaiveDate, NaiveTime};
use testbed_core::Result;

/// VirtualBox guest service that keeps resyncing the guest clock.
const GUEST_UTILS: &str = "virtualbox-guest-utils";

/// Holds a host's clock at a chosen time with NTP off.
///
/// Exit turns NTP back on and restarts the guest utilities if they were
/// running before.
pub struct Time {
    cleanup: Cleanup,
}

impl Time {
    pub async fn enter(host: &HostSession, time: NaiveTime, date: NaiveDate) -> Result<Self> {
        let mut cleanup = Cleanup::new(host.clone());
        if host.service_is_running(GUEST_UTILS).await? {
            host.sudo_check_output(&format!("systemctl stop {GUEST_UTILS}"))
                .await?;
            cleanup.push(sudo(&format!("systemctl start {GUEST_UTILS}")));
        }
        cleanup.push_front(sudo("timedatectl set-ntp true"));
        host.sudo_check_output("timedatectl set-ntp false").await?;

        let clock = Self { cleanup };
        clock.set_time(time, date).await?;
        Ok(clock)
    }

    pub async fn set_time(&self, time: NaiveTime, date: NaiveDate) -> Result<()> {
        self.cleanup
            .host()
            .sudo_check_output(&set_time_command(time, date))
            .await?;
        Ok(())
    }

    pub async fn exit(mut self) -> Result<()> {
        self.cleanup.run().await
    }
}

fn set_time_command(time: NaiveTime, date: NaiveDate) -> String {
    format!(
        "timedatectl set-time '{} {}'",
        date.format("%Y-%m-%d"),
        time.format("%H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_time_command_uses_iso_format() {
        let time = NaiveTime::from_hms_opt(2, 24, 50).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            set_time_command(time, date),
            "timedatectl set-time '2024-03-09 02:24:50'"
        );
    }
}
