use super::ports::{OpenPorts, PortRange};
use super::route::RouteHop;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Host name to the address names that must be reachable from it.
pub type ReachabilityMap = BTreeMap<String, BTreeSet<String>>;

/// Host name to target address to the intermediate hops expected on the way.
pub type RouteMap = BTreeMap<String, BTreeMap<String, Vec<RouteHop>>>;

/// Host name to address name to the ports expected open.
pub type PortMap = BTreeMap<String, BTreeMap<String, OpenPorts>>;

/// Builds a [`ReachabilityMap`] from string slices.
pub fn reachability<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [&'a str])>,
) -> ReachabilityMap {
    entries
        .into_iter()
        .map(|(host, addrs)| {
            (
                host.to_string(),
                addrs.iter().map(|addr| addr.to_string()).collect(),
            )
        })
        .collect()
}

/// A set of network expectations loaded from a TOML file.
///
/// ```toml
/// vms_down = ["internet"]
/// port_ranges = [[1, 2000], [8000, 9000]]
///
/// [reachability]
/// pi1 = ["pi1", "router1_lan"]
///
/// [routes.pi1]
/// internet = ["router1_lan"]
///
/// [ports.router1.pi1]
/// tcp = [22, 80]
/// udp = [53]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectations {
    pub vms_down: Vec<String>,
    pub reachability: Option<ReachabilityMap>,
    pub routes: Option<RouteMap>,
    pub ports: Option<PortMap>,
    pub port_ranges: Vec<PortRange>,
}

impl Expectations {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_helper_builds_sets() {
        let map = reachability([("h1", &["a1", "a2"][..]), ("h2", &[][..])]);
        assert_eq!(map.len(), 2);
        assert!(map["h1"].contains("a2"));
        assert!(map["h2"].is_empty());
    }

    #[test]
    fn parses_full_file() {
        let text = r#"
            vms_down = ["internet"]
            port_ranges = [[1, 2000], [8000, 9000]]

            [reachability]
            pi1 = ["pi1", "router1_lan"]

            [routes.pi1]
            internet = ["router1_lan"]
            external = [{ in_net = "10.8.0.0/24" }, "internet"]

            [ports.router1.pi1]
            tcp = [22, 80]
            udp = [53]
        "#;
        let expectations = Expectations::parse(text).unwrap();
        assert_eq!(expectations.vms_down, vec!["internet"]);
        assert_eq!(expectations.port_ranges.len(), 2);
        assert_eq!(expectations.reachability.unwrap()["pi1"].len(), 2);

        let routes = expectations.routes.unwrap();
        assert_eq!(routes["pi1"]["internet"], vec![RouteHop::addr("router1_lan")]);
        assert_eq!(
            routes["pi1"]["external"][0],
            RouteHop::in_net("10.8.0.0/24".parse().unwrap())
        );

        let ports = expectations.ports.unwrap();
        assert_eq!(ports["router1"]["pi1"], OpenPorts::new([22, 80], [53]));
    }

    #[test]
    fn empty_file_has_no_checks() {
        let expectations = Expectations::parse("").unwrap();
        assert!(expectations.reachability.is_none());
        assert!(expectations.routes.is_none());
        assert!(expectations.ports.is_none());
    }

    #[test]
    fn rejects_bad_port_range() {
        assert!(Expectations::parse("port_ranges = [[10, 1]]").is_err());
    }
}
