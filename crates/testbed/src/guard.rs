use crate::host::HostSession;
use std::collections::VecDeque;
use testbed_core::{Error, Result};

struct Step {
    command: String,
    /// Skipped when the guard is dropped instead of exited.
    exit_only: bool,
}

/// Commands that undo a scoped change on a host, run in order.
///
/// [`Cleanup::run`] drains them asynchronously. Whatever is still queued when
/// the value is dropped runs synchronously, so the change is undone on every
/// exit path. Steps pushed with [`Cleanup::push_exit_only`] are skipped on
/// drop.
pub(crate) struct Cleanup {
    host: HostSession,
    steps: VecDeque<Step>,
}

impl Cleanup {
    pub(crate) fn new(host: HostSession) -> Self {
        Self {
            host,
            steps: VecDeque::new(),
        }
    }

    pub(crate) fn host(&self) -> &HostSession {
        &self.host
    }

    pub(crate) fn push(&mut self, command: String) {
        self.steps.push_back(Step {
            command,
            exit_only: false,
        });
    }

    pub(crate) fn push_front(&mut self, command: String) {
        self.steps.push_front(Step {
            command,
            exit_only: false,
        });
    }

    /// Queues a command that may block for a long time, such as waiting for
    /// a remote process. It runs from [`Cleanup::run`] but never from `Drop`,
    /// which would block the calling runtime thread.
    pub(crate) fn push_exit_only(&mut self, command: String) {
        self.steps.push_back(Step {
            command,
            exit_only: true,
        });
    }

    /// Runs every queued command, even after a failure, and returns the
    /// first error.
    pub(crate) async fn run(&mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        while let Some(step) = self.steps.pop_front() {
            if let Err(e) = self.host.check_output(&step.command).await {
                tracing::warn!(host = %self.host.name(), "cleanup '{}' failed: {}", step.command, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if self.steps.is_empty() {
            return;
        }
        tracing::debug!(
            host = %self.host.name(),
            "running {} cleanup command(s) from drop",
            self.steps.len()
        );
        while let Some(step) = self.steps.pop_front() {
            if step.exit_only {
                tracing::warn!(host = %self.host.name(), "skipping '{}' on drop", step.command);
                continue;
            }
            if let Err(e) = self.host.check_output_blocking(&step.command) {
                tracing::warn!(host = %self.host.name(), "cleanup '{}' failed: {}", step.command, e);
            }
        }
    }
}
