mod addr;
mod expect;
mod ports;
mod route;

pub use addr::{Addrs, DeploymentConfig, EXTERNAL, Ipv4Net, Masks};
pub use expect::{Expectations, PortMap, ReachabilityMap, RouteMap, reachability};
pub use ports::{OpenPorts, PortRange, Protocol};
pub use route::{ExpectedRoute, HopMatcher, Route, RouteHop};
