use std::net::Ipv4Addr;

/// Errors that can occur while driving the testbed.
///
/// These are setup or environment problems. Deployment mismatches found by
/// an assertion are not errors; they fail the calling test instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "'hosts' must exactly match the running VMs: got {got:?}, want {want:?}. Either the \
         wrong hosts were passed in, or some VMs are in the wrong state."
    )]
    HostMismatch { got: Vec<String>, want: Vec<String> },

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("unknown address: {0}")]
    UnknownAddr(String),

    #[error("unknown mask: {0}")]
    UnknownMask(String),

    #[error("unknown VM: {0}")]
    UnknownVm(String),

    #[error("unknown host type: {0}")]
    UnknownHostType(String),

    #[error("can't find host {what} for host '{hostname}'")]
    InvalidHostName { hostname: String, what: &'static str },

    #[error("host list must be non-empty")]
    EmptyHostList,

    #[error("traceroute {host} -> {addr} returned multiple IPs: {ips:?}")]
    AmbiguousRoute {
        host: String,
        addr: String,
        ips: Vec<Ipv4Addr>,
    },

    #[error("nmap returned an unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Cannot shadow '{path}' because backup file '{backup}' already exists. Fix it manually.")]
    BackupExists { path: String, backup: String },

    #[error("command '{command}' exited with {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("'{0}' not found in PATH")]
    ToolNotFound(String),

    #[error("VM provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
