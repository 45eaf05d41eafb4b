//! Integration-test harness for a Vagrant-provisioned home-server testbed.
//!
//! The testbed is a small fleet of VMs (routers, Raspberry Pi servers and an
//! `internet` VM) configured by Ansible. This crate drives those VMs and
//! checks their live state against what the configuration should produce:
//! reachability, routes, open ports, services, files, logs and the emails
//! and HTTP calls the servers make.
//!
//! # Quick Start
//!
//! Everything hangs off one [`Testbed`]:
//!
//! ```rust,no_run
//! use testbed::{Settings, Testbed, TestDecl, reachability};
//!
//! # async fn example() -> testbed::Result<()> {
//! let testbed = Testbed::connect(Settings::default()).await?;
//!
//! for case in TestDecl::new("test_reachability").vms_down(&["pi2"]).expand() {
//!     testbed.prepare(&case).await?;
//!     testbed
//!         .net()
//!         .assert_reachability(&reachability([
//!             ("internet", &["external", "internet"][..]),
//!             ("pi1", &["external", "internet", "pi1_lan"][..]),
//!             ("router1", &["external", "internet", "router1_lan"][..]),
//!         ]))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Scoped changes
//!
//! Helpers that change host state for one test return guards:
//!
//! ```rust,no_run
//! # async fn example(testbed: &testbed::Testbed) -> testbed::Result<()> {
//! let pi1 = testbed.host("pi1")?;
//! let hosts_file = pi1.shadow_file("/etc/hosts").await?;
//! hosts_file.write("127.0.0.1 localhost").await?;
//! // ...
//! hosts_file.exit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! A guard that is dropped without `exit()` still undoes its change, by
//! running the same commands synchronously from `Drop`.

mod cases;
mod clock;
mod context;
mod cron;
mod email;
mod guard;
mod host;
mod http;
mod inventory;
mod journal;
mod lines;
mod mockserver;
pub mod net;
mod openvpn;
mod page;
mod shadow;
mod ssh;
mod timer;
mod vagrant;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// ============================================================================
// Core API
// ============================================================================

pub use context::Testbed;
pub use host::{GroupMembership, HostSession, shell_quote, sudo};
pub use net::{CheckReport, Mismatch, Net};
pub use vagrant::{Vagrant, VagrantCli, parse_machine_readable};

// Registry
pub use inventory::Inventory;
pub use testbed_core::{Addrs, DeploymentConfig, EXTERNAL, Ipv4Net, Masks};

// Expectations
pub use testbed_core::{
    ExpectedRoute, Expectations, HopMatcher, OpenPorts, PortMap, PortRange, Protocol,
    ReachabilityMap, Route, RouteHop, RouteMap, reachability,
};

// Test doubles
pub use email::{
    CapturedEmail, Email, ExpectedEmail, exact_mismatch, filter_from, match_email,
    subset_mismatch,
};
pub use mockserver::MockServer;

// Host-state helpers
pub use clock::Time;
pub use cron::{CronOptions, CronRunner};
pub use journal::Journal;
pub use lines::Lines;
pub use openvpn::{OpenVpn, VpnConnection};
pub use shadow::{ShadowDir, ShadowFile};

// Browser driver
pub use page::{WebDriver, check_links, extract_attrs};
pub use reqwest::Url;

// Test-case expansion
pub use cases::{
    TestCase, TestDecl, corresponding_hostname, host_number, host_type, hostnames_by_type,
};

// Settings and errors
pub use testbed_core::{Error, Result, Settings, Timings};

// ============================================================================
// Advanced API
// ============================================================================

pub use ssh::SshRunner;
pub use testbed_core::{CommandOutput, CommandRunner, VmProvider, VmStatus};
pub use timer::Timer;
