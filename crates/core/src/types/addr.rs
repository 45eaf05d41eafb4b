use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

/// Address name whose routes leave the deployment.
pub const EXTERNAL: &str = "external";

/// An IPv4 network in CIDR notation, e.g. `10.0.1.0/24`.
///
/// Host bits in the written address are kept for display but ignored by
/// [`Ipv4Net::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Net {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Net {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(Error::Parse(format!(
                "prefix length {prefix_len} is longer than 32"
            )));
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    fn mask(&self) -> u32 {
        match self.prefix_len {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n)),
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & self.mask())
    }

    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        u32::from(*ip) & self.mask() == u32::from(self.network())
    }
}

impl FromStr for Ipv4Net {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (base, prefix) = s
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("'{s}' is not in CIDR notation")))?;
        let addr = base
            .parse::<Ipv4Addr>()
            .map_err(|e| Error::Parse(format!("bad address in '{s}': {e}")))?;
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|e| Error::Parse(format!("bad prefix length in '{s}': {e}")))?;
        Self::new(addr, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Net {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Ipv4Net> for String {
    fn from(net: Ipv4Net) -> Self {
        net.to_string()
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// Named deployment addresses from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addrs(BTreeMap<String, Ipv4Addr>);

impl Addrs {
    pub fn new(addrs: BTreeMap<String, Ipv4Addr>) -> Self {
        Self(addrs)
    }

    pub fn get(&self, name: &str) -> Result<Ipv4Addr> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownAddr(name.to_string()))
    }

    /// Address names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ipv4Addr)> {
        self.0.iter().map(|(name, ip)| (name.as_str(), *ip))
    }

    /// Whether `ip` belongs to any named address of the deployment.
    pub fn is_known_ip(&self, ip: &Ipv4Addr) -> bool {
        self.0.values().any(|known| known == ip)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Ipv4Addr)> for Addrs {
    fn from_iter<I: IntoIterator<Item = (String, Ipv4Addr)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Named network masks from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Masks(BTreeMap<String, Ipv4Net>);

impl Masks {
    pub fn new(masks: BTreeMap<String, Ipv4Net>) -> Self {
        Self(masks)
    }

    pub fn get(&self, name: &str) -> Result<Ipv4Net> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownMask(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ipv4Net)> {
        self.0.iter().map(|(name, net)| (name.as_str(), *net))
    }
}

/// The static `config.json` shipped with the deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub addrs: Addrs,
    #[serde(default)]
    pub masks: Masks,
}

impl DeploymentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
