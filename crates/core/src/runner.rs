use crate::error::Result;
use async_trait::async_trait;

/// Captured result of one shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes shell commands on one machine.
///
/// `run_blocking` exists for cleanup from `Drop`, where no executor can be
/// relied on to drive a future to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Name of the machine the commands run on.
    fn target(&self) -> &str;
    async fn run(&self, command: &str) -> Result<CommandOutput>;
    fn run_blocking(&self, command: &str) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_zero_exit_code() {
        let output = CommandOutput::success("hello");
        assert!(output.is_success());
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn failure_keeps_stderr() {
        let output = CommandOutput::failure(2, "boom");
        assert!(!output.is_success());
        assert_eq!(output.exit_code, 2);
        assert_eq!(output.stderr, "boom");
        assert!(output.stdout.is_empty());
    }
}
