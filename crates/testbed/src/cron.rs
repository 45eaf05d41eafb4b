use crate::clock::Time;
use crate::guard::Cleanup;
use crate::host::HostSession;
use crate::shadow::ShadowFile;
use chrono::{Local, NaiveDate, NaiveTime};
use std::time::Duration;
use testbed_core::Result;

const SOURCES_LIST: &str = "/etc/apt/sources.list";
const DEFAULT_CMD_TO_WATCH: &str = "/bin/bash /etc/pi-server/cron/cron-runner";

/// What a [`CronRunner`] triggers and watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronOptions {
    pub time: NaiveTime,
    pub cmd_to_watch: String,
    /// Shadow the apt sources list so cron jobs can't fetch updates.
    pub disable_sources_list: bool,
    /// Defaults to today on the machine running the tests.
    pub date: Option<NaiveDate>,
}

impl Default for CronOptions {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(2, 24, 50).unwrap_or_default(),
            cmd_to_watch: DEFAULT_CMD_TO_WATCH.to_string(),
            disable_sources_list: true,
            date: None,
        }
    }
}

impl CronOptions {
    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = time;
        self
    }

    pub fn watching(mut self, cmd: impl Into<String>) -> Self {
        self.cmd_to_watch = cmd.into();
        self
    }

    pub fn keep_sources_list(mut self) -> Self {
        self.disable_sources_list = false;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Moves a host's clock so cron fires a job, and waits for the job.
///
/// Entering jumps to 09:00 on the chosen date first, then to the target
/// time, so cron's daylight-saving handling doesn't skip the run. The guard
/// waits (bounded) for the watched command to start. Exit waits (unbounded)
/// for it to finish, then restores the clock and the sources list.
/// Dropping the guard without `exit` skips the wait but still restores
/// both.
pub struct CronRunner {
    // Field order is the release order on drop.
    finish: Cleanup,
    time: Time,
    sources_list: Option<ShadowFile>,
    exit_settle: Duration,
}

impl CronRunner {
    pub async fn enter(host: &HostSession, options: CronOptions) -> Result<Self> {
        let timings = *host.timings();
        let date = options
            .date
            .unwrap_or_else(|| Local::now().date_naive());

        let sources_list = if options.disable_sources_list {
            Some(ShadowFile::enter(host, SOURCES_LIST).await?)
        } else {
            None
        };

        let neutral = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
        let time = Time::enter(host, neutral, date).await?;
        tokio::time::sleep(timings.cron_clock_settle).await;
        time.set_time(options.time, date).await?;

        let mut finish = Cleanup::new(host.clone());
        finish.push_exit_only(wait_gone_command(&options.cmd_to_watch));
        host.check_output(&wait_started_command(
            &options.cmd_to_watch,
            timings.cron_start_timeout,
        ))
        .await?;

        Ok(Self {
            finish,
            time,
            sources_list,
            exit_settle: timings.cron_exit_settle,
        })
    }

    pub async fn exit(self) -> Result<()> {
        let CronRunner {
            mut finish,
            time,
            sources_list,
            exit_settle,
        } = self;

        let mut results = vec![finish.run().await, time.exit().await];
        if let Some(sources_list) = sources_list {
            results.push(sources_list.exit().await);
        }
        tokio::time::sleep(exit_settle).await;
        results.into_iter().collect()
    }
}

fn wait_started_command(cmd: &str, timeout: Duration) -> String {
    format!(
        "timeout {} bash -c \"while ! pgrep -x -f '{cmd}'; do true; done\"; true",
        timeout.as_secs()
    )
}

fn wait_gone_command(cmd: &str) -> String {
    format!("while pgrep -x -f '{cmd}'; do true; done")
}
