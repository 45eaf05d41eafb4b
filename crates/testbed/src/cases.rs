//! Expanding test declarations into concrete cases.
//!
//! A test that runs once per host is declared once with [`TestDecl`] and
//! expanded into one [`TestCase`] per host name:
//!
//! ```
//! use testbed::TestDecl;
//!
//! let cases = TestDecl::new("test_ssh_login")
//!     .for_hosts(&["pi1", "pi2"])
//!     .unwrap()
//!     .vms_down(&["pi2"])
//!     .expand();
//! assert_eq!(cases[0].id(), "test_ssh_login[pi1]");
//! assert_eq!(cases[1].vms_down, vec!["pi2"]);
//! ```

use crate::inventory::Inventory;
use crate::lines::full_match;
use std::collections::BTreeMap;
use testbed_core::{Error, Result};

/// The host name without its trailing number: `pi` for `pi2`.
pub fn host_type(hostname: &str) -> Result<String> {
    full_match("([^0-9]+)[0-9]*")?
        .captures(hostname)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::InvalidHostName {
            hostname: hostname.to_string(),
            what: "type",
        })
}

/// The trailing number of a host name, possibly empty.
pub fn host_number(hostname: &str) -> Result<String> {
    full_match("[^0-9]+([0-9]*)")?
        .captures(hostname)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::InvalidHostName {
            hostname: hostname.to_string(),
            what: "number",
        })
}

/// The host of type `host_type` paired with `hostname`, e.g. `router2` for
/// `pi2`. Unnumbered hosts pair with `internet`.
pub fn corresponding_hostname(hostname: &str, host_type: &str) -> Result<String> {
    let number = host_number(hostname)?;
    if number.is_empty() {
        Ok("internet".to_string())
    } else {
        Ok(format!("{host_type}{number}"))
    }
}

pub fn hostnames_by_type<'a>(
    hostnames: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for hostname in hostnames {
        out.entry(host_type(hostname)?)
            .or_default()
            .push(hostname.to_string());
    }
    for names in out.values_mut() {
        names.sort();
    }
    Ok(out)
}

/// A test, the hosts it runs against, and the VMs that must be down for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDecl {
    name: String,
    hosts: Option<Vec<String>>,
    vms_down: Vec<String>,
}

impl TestDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: None,
            vms_down: Vec::new(),
        }
    }

    /// Runs the test once per host in `hosts`.
    pub fn for_hosts<S: AsRef<str>>(mut self, hosts: &[S]) -> Result<Self> {
        if hosts.is_empty() {
            return Err(Error::EmptyHostList);
        }
        self.hosts = Some(hosts.iter().map(|h| h.as_ref().to_string()).collect());
        Ok(self)
    }

    /// Runs the test once per inventory host of each type in `types`.
    pub fn for_host_types<S: AsRef<str>>(self, inventory: &Inventory, types: &[S]) -> Result<Self> {
        let by_type = inventory.hostnames_by_type()?;
        let mut hosts = Vec::new();
        for host_type in types {
            let names = by_type
                .get(host_type.as_ref())
                .ok_or_else(|| Error::UnknownHostType(host_type.as_ref().to_string()))?;
            hosts.extend(names.iter().cloned());
        }
        self.for_hosts(&hosts)
    }

    pub fn vms_down<S: AsRef<str>>(mut self, vms: &[S]) -> Self {
        self.vms_down = vms.iter().map(|vm| vm.as_ref().to_string()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expand(&self) -> Vec<TestCase> {
        match &self.hosts {
            Some(hosts) => hosts
                .iter()
                .map(|host| TestCase {
                    name: self.name.clone(),
                    hostname: Some(host.clone()),
                    vms_down: self.vms_down.clone(),
                })
                .collect(),
            None => vec![TestCase {
                name: self.name.clone(),
                hostname: None,
                vms_down: self.vms_down.clone(),
            }],
        }
    }
}

/// One concrete run of a [`TestDecl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub hostname: Option<String>,
    pub vms_down: Vec<String>,
}

impl TestCase {
    pub fn id(&self) -> String {
        match &self.hostname {
            Some(host) => format!("{}[{host}]", self.name),
            None => self.name.clone(),
        }
    }

    pub fn vms_down(&self) -> Vec<&str> {
        self.vms_down.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_type_and_number() {
        assert_eq!(host_type("pi12").unwrap(), "pi");
        assert_eq!(host_number("pi12").unwrap(), "12");
        assert_eq!(host_type("internet").unwrap(), "internet");
        assert_eq!(host_number("internet").unwrap(), "");
    }

    #[test]
    fn rejects_names_without_type() {
        assert!(matches!(
            host_type("42"),
            Err(Error::InvalidHostName { what: "type", .. })
        ));
        assert!(matches!(
            host_number("router1a"),
            Err(Error::InvalidHostName { what: "number", .. })
        ));
    }

    #[test]
    fn corresponding_hosts() {
        assert_eq!(corresponding_hostname("pi2", "router").unwrap(), "router2");
        assert_eq!(corresponding_hostname("internet", "router").unwrap(), "internet");
    }

    #[test]
    fn groups_and_sorts_by_type() {
        let by_type = hostnames_by_type(["router2", "pi2", "router1", "pi1", "internet"]).unwrap();
        assert_eq!(by_type.len(), 3);
        assert_eq!(by_type["pi"], vec!["pi1", "pi2"]);
        assert_eq!(by_type["router"], vec!["router1", "router2"]);
    }

    #[test]
    fn empty_host_list_is_an_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            TestDecl::new("t").for_hosts(&empty),
            Err(Error::EmptyHostList)
        ));
    }

    #[test]
    fn expands_one_case_per_host() {
        let cases = TestDecl::new("test_firewall")
            .for_hosts(&["router1", "router2"])
            .unwrap()
            .expand();
        let ids: Vec<String> = cases.iter().map(TestCase::id).collect();
        assert_eq!(ids, vec!["test_firewall[router1]", "test_firewall[router2]"]);
    }

    #[test]
    fn expands_plain_test_once() {
        let cases = TestDecl::new("test_base").vms_down(&["pi2"]).expand();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id(), "test_base");
        assert_eq!(cases[0].vms_down(), vec!["pi2"]);
    }

    #[test]
    fn expands_host_types_through_inventory() {
        let inventory = Inventory::parse("pi1\npi2\nrouter1\ninternet\n").unwrap();
        let cases = TestDecl::new("t")
            .for_host_types(&inventory, &["router", "pi"])
            .unwrap()
            .expand();
        let hosts: Vec<&str> = cases.iter().filter_map(|c| c.hostname.as_deref()).collect();
        assert_eq!(hosts, vec!["router1", "pi1", "pi2"]);

        assert!(matches!(
            TestDecl::new("t").for_host_types(&inventory, &["nas"]),
            Err(Error::UnknownHostType(t)) if t == "nas"
        ));
    }
}
