use super::addr::{Addrs, Ipv4Net};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Hops observed between a host and an address.
///
/// `None` marks a hop where every probe timed out. An empty route means the
/// address was not reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route(Vec<Option<Ipv4Addr>>);

impl Route {
    pub fn new(hops: Vec<Option<Ipv4Addr>>) -> Self {
        Self(hops)
    }

    pub fn unreachable() -> Self {
        Self(Vec::new())
    }

    pub fn hops(&self) -> &[Option<Ipv4Addr>] {
        &self.0
    }

    pub fn last(&self) -> Option<Option<Ipv4Addr>> {
        self.0.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Keeps the leading hops that are deployment addresses, then ends the
    /// route at `target`. Where traffic goes after leaving the deployment is
    /// not under test.
    pub fn truncate_outside(&self, addrs: &Addrs, target: Ipv4Addr) -> Route {
        let mut hops: Vec<Option<Ipv4Addr>> = self
            .0
            .iter()
            .take_while(|hop| matches!(hop, Some(ip) if addrs.is_known_ip(ip)))
            .copied()
            .collect();
        hops.push(Some(target));
        Route(hops)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, hop) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match hop {
                Some(ip) => write!(f, "{ip}")?,
                None => write!(f, "*")?,
            }
        }
        write!(f, "]")
    }
}

/// One hop of an expected route, as written in a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteHop {
    /// A named deployment address.
    Addr(String),
    /// Any address inside a network.
    InNet { in_net: Ipv4Net },
}

impl RouteHop {
    pub fn addr(name: impl Into<String>) -> Self {
        RouteHop::Addr(name.into())
    }

    pub fn in_net(net: Ipv4Net) -> Self {
        RouteHop::InNet { in_net: net }
    }

    pub fn resolve(&self, addrs: &Addrs) -> Result<HopMatcher> {
        match self {
            RouteHop::Addr(name) => Ok(HopMatcher::Exact(addrs.get(name)?)),
            RouteHop::InNet { in_net } => Ok(HopMatcher::InNet(*in_net)),
        }
    }
}

impl From<&str> for RouteHop {
    fn from(name: &str) -> Self {
        RouteHop::addr(name)
    }
}

impl From<Ipv4Net> for RouteHop {
    fn from(net: Ipv4Net) -> Self {
        RouteHop::in_net(net)
    }
}

/// A resolved expectation for one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopMatcher {
    Exact(Ipv4Addr),
    InNet(Ipv4Net),
}

impl HopMatcher {
    pub fn matches(&self, hop: &Option<Ipv4Addr>) -> bool {
        match (self, hop) {
            (HopMatcher::Exact(want), Some(got)) => want == got,
            (HopMatcher::InNet(net), Some(got)) => net.contains(got),
            (_, None) => false,
        }
    }
}

impl fmt::Display for HopMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopMatcher::Exact(ip) => write!(f, "{ip}"),
            HopMatcher::InNet(net) => write!(f, "AddrInNet({net})"),
        }
    }
}

/// The full expected route to an address, target included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedRoute(Vec<HopMatcher>);

impl ExpectedRoute {
    pub fn unreachable() -> Self {
        Self(Vec::new())
    }

    /// Resolves `hops` and appends `target`.
    pub fn resolve(hops: &[RouteHop], target: Ipv4Addr, addrs: &Addrs) -> Result<Self> {
        let mut matchers = hops
            .iter()
            .map(|hop| hop.resolve(addrs))
            .collect::<Result<Vec<_>>>()?;
        matchers.push(HopMatcher::Exact(target));
        Ok(Self(matchers))
    }

    pub fn matchers(&self) -> &[HopMatcher] {
        &self.0
    }

    pub fn matches(&self, route: &Route) -> bool {
        self.0.len() == route.len()
            && self
                .0
                .iter()
                .zip(route.hops())
                .all(|(matcher, hop)| matcher.matches(hop))
    }
}

impl fmt::Display for ExpectedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, matcher) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{matcher}")?;
        }
        write!(f, "]")
    }
}
