//! Ansible INI inventory, as generated by Vagrant's ansible provisioner.
//!
//! ```ini
//! # Generated by Vagrant
//! pi1 ansible_host=127.0.0.1 ansible_port=2222 ansible_user='vagrant'
//! router1 ansible_host=127.0.0.1 ansible_port=2200
//!
//! [pis]
//! pi1
//!
//! [pis:vars]
//! role=pi_full
//! ```

use crate::cases::hostnames_by_type;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use testbed_core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    hosts: BTreeMap<String, BTreeMap<String, String>>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

enum Section {
    Hosts(Option<String>),
    Skipped,
}

impl Inventory {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("can't read inventory {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut inventory = Self::default();
        let mut section = Section::Hosts(None);

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| {
                    Error::Parse(format!("inventory line {}: bad section '{line}'", lineno + 1))
                })?;
                section = if name.contains(':') {
                    Section::Skipped
                } else {
                    inventory.groups.entry(name.to_string()).or_default();
                    Section::Hosts(Some(name.to_string()))
                };
                continue;
            }

            let Section::Hosts(group) = &section else {
                continue;
            };

            let mut fields = line.split_whitespace();
            let Some(host) = fields.next() else {
                continue;
            };
            let vars = inventory.hosts.entry(host.to_string()).or_default();
            for field in fields {
                let (key, value) = field.split_once('=').ok_or_else(|| {
                    Error::Parse(format!(
                        "inventory line {}: expected key=value, got '{field}'",
                        lineno + 1
                    ))
                })?;
                vars.insert(key.to_string(), unquote(value).to_string());
            }
            if let Some(group) = group {
                inventory
                    .groups
                    .entry(group.clone())
                    .or_default()
                    .insert(host.to_string());
            }
        }
        Ok(inventory)
    }

    /// All host names, sorted.
    pub fn hostnames(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    pub fn host_vars(&self, host: &str) -> Result<&BTreeMap<String, String>> {
        self.hosts
            .get(host)
            .ok_or_else(|| Error::UnknownHost(host.to_string()))
    }

    pub fn group(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group)
    }

    /// Host names grouped by the name with its number stripped.
    pub fn hostnames_by_type(&self) -> Result<BTreeMap<String, Vec<String>>> {
        hostnames_by_type(self.hosts.keys().map(String::as_str))
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = "\
# Generated by Vagrant

pi1 ansible_host=127.0.0.1 ansible_port=2222 ansible_user='vagrant'
router1 ansible_host=127.0.0.1 ansible_port=2200
internet ansible_host=127.0.0.1 ansible_port=2201

[pis]
pi1
pi2 ansible_port=2203

[pis:vars]
role=pi_full

[all:children]
pis
";

    #[test]
    fn parses_ungrouped_and_grouped_hosts() {
        let inventory = Inventory::parse(INVENTORY).unwrap();
        assert_eq!(
            inventory.hostnames(),
            vec!["internet", "pi1", "pi2", "router1"]
        );
        assert!(!inventory.contains("role=pi_full"));
        assert!(!inventory.contains("pis"));
    }

    #[test]
    fn keeps_host_vars_unquoted() {
        let inventory = Inventory::parse(INVENTORY).unwrap();
        let vars = inventory.host_vars("pi1").unwrap();
        assert_eq!(vars["ansible_port"], "2222");
        assert_eq!(vars["ansible_user"], "vagrant");
        assert_eq!(inventory.host_vars("pi2").unwrap()["ansible_port"], "2203");
    }

    #[test]
    fn records_group_members() {
        let inventory = Inventory::parse(INVENTORY).unwrap();
        let pis: Vec<&str> = inventory
            .group("pis")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(pis, vec!["pi1", "pi2"]);
        assert!(inventory.group("all:children").is_none());
    }

    #[test]
    fn unknown_host_vars_are_errors() {
        let inventory = Inventory::parse(INVENTORY).unwrap();
        assert!(matches!(
            inventory.host_vars("pi9"),
            Err(Error::UnknownHost(_))
        ));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(Inventory::parse("[pis\npi1").is_err());
        assert!(Inventory::parse("pi1 ansible_port").is_err());
    }

    #[test]
    fn groups_hosts_by_type() {
        let inventory = Inventory::parse(INVENTORY).unwrap();
        let by_type = inventory.hostnames_by_type().unwrap();
        assert_eq!(by_type["pi"], vec!["pi1", "pi2"]);
        assert_eq!(by_type["internet"], vec!["internet"]);
        assert_eq!(by_type["router"], vec!["router1"]);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = Inventory::load("/nonexistent/inventory").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
