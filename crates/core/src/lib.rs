pub mod error;
pub mod provider;
pub mod runner;
pub mod settings;
pub mod types;

pub use error::{Error, Result};
pub use provider::{VmProvider, VmStatus};
pub use runner::{CommandOutput, CommandRunner};
pub use settings::{Settings, Timings};
pub use types::{
    Addrs, DeploymentConfig, EXTERNAL, ExpectedRoute, Expectations, HopMatcher, Ipv4Net, Masks,
    OpenPorts, PortMap, PortRange, Protocol, ReachabilityMap, Route, RouteHop, RouteMap,
    reachability,
};
