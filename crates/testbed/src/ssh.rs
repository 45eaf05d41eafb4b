use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use testbed_core::{CommandOutput, CommandRunner, Error, Result};

/// Runs commands on a testbed host through the system `ssh` client.
///
/// Connection details come from the `ssh_config` that `vagrant ssh-config`
/// writes, so the host name here is the inventory name.
pub struct SshRunner {
    host: String,
    ssh_path: PathBuf,
    ssh_config: PathBuf,
    timeout: Option<Duration>,
}

impl SshRunner {
    pub fn new(host: impl Into<String>, ssh_config: impl AsRef<Path>) -> Result<Self> {
        let ssh_path = which::which("ssh").map_err(|_| Error::ToolNotFound("ssh".to_string()))?;
        Ok(Self {
            host: host.into(),
            ssh_path,
            ssh_config: ssh_config.as_ref().to_path_buf(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args(&self, command: &str) -> Vec<String> {
        vec![
            "-F".to_string(),
            self.ssh_config.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            self.host.clone(),
            command.to_string(),
        ]
    }
}

fn into_output(output: Output) -> CommandOutput {
    CommandOutput {
        // Killed by a signal.
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    fn target(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let args = self.build_args(command);
        tracing::debug!(host = %self.host, "ssh: {}", command);

        let mut cmd = tokio::process::Command::new(&self.ssh_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = cmd.output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output).await.map_err(|_| {
                Error::Timeout(format!("ssh {}: '{}' after {:?}", self.host, command, timeout))
            })??,
            None => output.await?,
        };
        Ok(into_output(output))
    }

    fn run_blocking(&self, command: &str) -> Result<CommandOutput> {
        let args = self.build_args(command);
        tracing::debug!(host = %self.host, "ssh (blocking): {}", command);

        let output = std::process::Command::new(&self.ssh_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;
        Ok(into_output(output))
    }
}
