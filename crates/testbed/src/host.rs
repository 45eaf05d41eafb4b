//! Command execution on one testbed host.
//!
//! A [`HostSession`] wraps a [`CommandRunner`] and layers the helpers tests
//! need on top: `sudo` wrapping, file checks, reachability probes and the
//! scoped guards that change host state for the length of a test.
//!
//! # Guards
//!
//! Scoped changes ([`ShadowFile`], [`ShadowDir`], [`Time`], [`CronRunner`],
//! [`GroupMembership`]) are undone by calling their async `exit()`. If a
//! guard is dropped without `exit()`, because the test panicked or returned
//! early, the same commands run synchronously from `Drop`.

use crate::cron::{CronOptions, CronRunner};
use crate::guard::Cleanup;
use crate::journal::Journal;
use crate::shadow::{ShadowDir, ShadowFile};
use crate::clock::Time;
use chrono::{Local, NaiveDate, NaiveTime};
use std::net::Ipv4Addr;
use std::sync::Arc;
use testbed_core::{CommandOutput, CommandRunner, Error, Result, Timings};

const LOGIN_EMAIL_EXCEPTIONS: &str = "/etc/pi-server/ssh/email-on-login-exceptions";

/// Quotes `s` for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Wraps `command` so the whole shell line runs as root.
pub fn sudo(command: &str) -> String {
    format!("sudo /bin/sh -c {}", shell_quote(command))
}

#[derive(Clone)]
pub struct HostSession {
    name: String,
    runner: Arc<dyn CommandRunner>,
    timings: Timings,
}

impl std::fmt::Debug for HostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSession")
            .field("name", &self.name)
            .field("target", &self.runner.target())
            .finish()
    }
}

impl HostSession {
    pub fn new(name: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            name: name.into(),
            runner,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.runner.run(command).await
    }

    pub fn run_blocking(&self, command: &str) -> Result<CommandOutput> {
        self.runner.run_blocking(command)
    }

    /// Runs `command` and returns stdout without trailing newlines.
    pub async fn check_output(&self, command: &str) -> Result<String> {
        let output = self.run(command).await?;
        checked(command, output)
    }

    pub fn check_output_blocking(&self, command: &str) -> Result<String> {
        let output = self.run_blocking(command)?;
        checked(command, output)
    }

    pub async fn sudo_check_output(&self, command: &str) -> Result<String> {
        self.check_output(&sudo(command)).await
    }

    pub async fn is_reachable(&self, ip: Ipv4Addr) -> Result<bool> {
        let output = self.run(&format!("ping -W 1 -c 1 {ip}")).await?;
        Ok(output.is_success())
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        let output = self.run(&format!("test -e {}", shell_quote(path))).await?;
        Ok(output.is_success())
    }

    pub async fn read_file(&self, path: &str) -> Result<String> {
        self.sudo_check_output(&format!("cat {}", shell_quote(path)))
            .await
    }

    /// Replaces the file's content with `content` and a trailing newline.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.sudo_check_output(&write_command(path, content))
            .await?;
        Ok(())
    }

    pub async fn clear_file(&self, path: &str) -> Result<()> {
        self.write_file(path, "").await
    }

    pub async fn service_is_running(&self, service: &str) -> Result<bool> {
        let output = self
            .run(&format!("systemctl is-active -q {}", shell_quote(service)))
            .await?;
        Ok(output.is_success())
    }

    pub async fn user_groups(&self, user: &str) -> Result<Vec<String>> {
        let output = self
            .check_output(&format!("id -Gn {}", shell_quote(user)))
            .await?;
        Ok(output.split_whitespace().map(str::to_string).collect())
    }

    /// Address this SSH session comes from, as seen by the host.
    pub async fn client_ip(&self) -> Result<String> {
        let output = self.check_output("echo \"${SSH_CLIENT}\"").await?;
        output
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Parse(format!("{}: SSH_CLIENT is empty", self.name)))
    }

    /// Writes zeros to `path` until `mount_point` is about 92% full.
    pub async fn make_bigfile(&self, path: &str, mount_point: &str) -> Result<()> {
        let output = self
            .check_output(&format!(
                "df --output=size,used {} | tail -n 1",
                shell_quote(mount_point)
            ))
            .await?;
        let (size_kib, used_kib) = parse_df(&output)?;
        let needed_kib = (size_kib * 92 / 100).saturating_sub(used_kib);
        self.check_output(&format!(
            "dd if=/dev/zero of={} bs=1M count={}",
            shell_quote(path),
            needed_kib / 1024
        ))
        .await?;
        Ok(())
    }

    pub async fn shadow_file(&self, path: &str) -> Result<ShadowFile> {
        ShadowFile::enter(self, path).await
    }

    pub async fn shadow_dir(&self, path: &str) -> Result<ShadowDir> {
        ShadowDir::enter(self, path).await
    }

    /// Takes control of the clock; `date` defaults to today.
    pub async fn time(&self, time: NaiveTime, date: Option<NaiveDate>) -> Result<Time> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        Time::enter(self, time, date).await
    }

    pub async fn run_crons(&self, options: CronOptions) -> Result<CronRunner> {
        CronRunner::enter(self, options).await
    }

    pub fn journal(&self) -> Journal {
        Journal::new(self.clone())
    }

    /// Stops SSH logins from this session triggering notification emails.
    pub async fn disable_login_emails(&self) -> Result<ShadowFile> {
        let client_ip = self.client_ip().await?;
        let shadow = ShadowFile::enter(self, LOGIN_EMAIL_EXCEPTIONS).await?;
        shadow.write(&format!("vagrant:{client_ip}")).await?;
        Ok(shadow)
    }

    pub async fn group_membership(&self, user: &str, group: &str) -> Result<GroupMembership> {
        GroupMembership::enter(self, user, group).await
    }
}

fn checked(command: &str, output: CommandOutput) -> Result<String> {
    if !output.is_success() {
        return Err(Error::CommandFailed {
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim_end().to_string(),
        });
    }
    Ok(output.stdout.trim_end_matches(['\r', '\n']).to_string())
}

pub(crate) fn write_command(path: &str, content: &str) -> String {
    format!("echo {} > {}", shell_quote(content), shell_quote(path))
}

fn parse_df(output: &str) -> Result<(u64, u64)> {
    let mut fields = output.split_whitespace().map(str::parse::<u64>);
    match (fields.next(), fields.next()) {
        (Some(Ok(size)), Some(Ok(used))) => Ok((size, used)),
        _ => Err(Error::Parse(format!("unexpected df output: '{output}'"))),
    }
}

/// Temporarily adds a user to a group, if it isn't a member already.
pub struct GroupMembership {
    added: bool,
    cleanup: Cleanup,
}

impl GroupMembership {
    pub async fn enter(host: &HostSession, user: &str, group: &str) -> Result<Self> {
        let in_group = host.user_groups(user).await?.iter().any(|g| g == group);
        let mut cleanup = Cleanup::new(host.clone());
        if !in_group {
            let (user, group) = (shell_quote(user), shell_quote(group));
            cleanup.push(sudo(&format!("deluser {user} {group}")));
            host.sudo_check_output(&format!("adduser {user} {group}"))
                .await?;
        }
        Ok(Self {
            added: !in_group,
            cleanup,
        })
    }

    /// Whether the user was added by this guard.
    pub fn added(&self) -> bool {
        self.added
    }

    pub async fn exit(mut self) -> Result<()> {
        self.cleanup.run().await
    }
}
