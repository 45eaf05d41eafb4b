//! Network verifier.
//!
//! [`Net`] probes every host/address pair from the hosts' point of view and
//! compares what it sees against an expectation map. Probes for one check
//! run concurrently over SSH, bounded by `max_parallel`, and all of them
//! finish before anything is compared.
//!
//! Each `assert_*` method fails the calling test with a diff of every wrong
//! pair. The `check_*` twins return the [`CheckReport`] instead.

mod nmap;
mod report;
mod traceroute;

pub use nmap::{parse_open_ports, scan_command};
pub use report::{CheckReport, Mismatch};
pub use traceroute::{Hop, Probe, Trace};

use crate::host::HostSession;
use crate::timer::Timer;
use crate::vagrant::Vagrant;
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use testbed_core::{
    Addrs, EXTERNAL, Error, ExpectedRoute, OpenPorts, PortMap, PortRange, ReachabilityMap,
    Result, Route, RouteMap,
};

#[derive(Clone)]
pub struct Net {
    hosts: Arc<BTreeMap<String, HostSession>>,
    addrs: Arc<Addrs>,
    vagrant: Arc<Vagrant>,
    max_parallel: usize,
}

impl Net {
    pub fn new(
        hosts: Arc<BTreeMap<String, HostSession>>,
        addrs: Arc<Addrs>,
        vagrant: Arc<Vagrant>,
        max_parallel: usize,
    ) -> Self {
        Self {
            hosts,
            addrs,
            vagrant,
            max_parallel: max_parallel.max(1),
        }
    }

    fn host(&self, name: &str) -> Result<&HostSession> {
        self.hosts
            .get(name)
            .ok_or_else(|| Error::UnknownHost(name.to_string()))
    }

    /// Whether `host` can ping `addr`.
    pub async fn reachable(&self, host: &str, addr: &str) -> Result<bool> {
        let mut timer = Timer::start("Net::reachable").arg(host).arg(addr);
        let ip = self.addrs.get(addr)?;
        let reachable = self.host(host)?.is_reachable(ip).await?;
        timer.set_result(reachable);
        Ok(reachable)
    }

    /// Hops from `host` to `addr`. An empty route means unreachable.
    pub async fn traceroute(&self, host: &str, addr: &str) -> Result<Route> {
        let mut timer = Timer::start("Net::traceroute").arg(host).arg(addr);
        let target = self.addrs.get(addr)?;
        let output = self
            .host(host)?
            .check_output(&format!("sudo traceroute -I {target}"))
            .await?;
        let route = Trace::parse(&output)?.route(host, addr, target)?;
        timer.add_extra(&output);
        timer.set_result(route.to_string());
        Ok(route)
    }

    /// Ports open on `addr` as seen from `host`, scanning only `ranges`.
    pub async fn nmap(&self, host: &str, addr: &str, ranges: &[PortRange]) -> Result<OpenPorts> {
        let mut timer = Timer::start("Net::nmap").arg(host).arg(addr);
        let ip = self.addrs.get(addr)?;
        let output = self.host(host)?.check_output(&scan_command(ranges, ip)).await?;
        let ports = parse_open_ports(&output)?;
        timer.add_extra(&output);
        timer.set_result(ports.to_string());
        Ok(ports)
    }

    /// Every (host, address) pair for `hosts`, both sorted.
    ///
    /// `hosts` must be exactly the running VMs, otherwise the test setup is
    /// wrong and this is an error.
    pub fn host_addr_pairs<S: AsRef<str>>(&self, hosts: &[S]) -> Result<Vec<(String, String)>> {
        let hosts = self.running_hosts(hosts)?;
        Ok(hosts
            .iter()
            .flat_map(|host| {
                self.addrs
                    .names()
                    .map(move |addr| (host.clone(), addr.to_string()))
            })
            .collect())
    }

    /// `hosts` sorted, if they are exactly the running VMs.
    fn running_hosts<S: AsRef<str>>(&self, hosts: &[S]) -> Result<Vec<String>> {
        let mut got: Vec<String> = hosts.iter().map(|h| h.as_ref().to_string()).collect();
        got.sort();
        let want = self.vagrant.running_vms();
        if got != want {
            return Err(Error::HostMismatch { got, want });
        }
        Ok(got)
    }

    pub async fn check_reachability(&self, reachable: &ReachabilityMap) -> Result<CheckReport> {
        let _timer = Timer::start("Net::assert_reachability");
        let hosts: Vec<&String> = reachable.keys().collect();
        let pairs = self.host_addr_pairs(&hosts)?;
        let wants: Vec<bool> = pairs
            .iter()
            .map(|(host, addr)| reachable.get(host).is_some_and(|addrs| addrs.contains(addr)))
            .collect();
        let gots = self.gather(&pairs, |host, addr| self.reachable(host, addr)).await?;
        self.compare("reachable", &pairs, wants, gots, |want, got| want == got)
    }

    /// Checks reachability of every host/address pair.
    ///
    /// `reachable` maps each host to the addresses it should reach. Every
    /// pair not listed must be unreachable.
    pub async fn assert_reachability(&self, reachable: &ReachabilityMap) -> Result<()> {
        self.check_reachability(reachable).await?.assert_ok();
        Ok(())
    }

    pub async fn check_routes(&self, routes: &RouteMap) -> Result<CheckReport> {
        let _timer = Timer::start("Net::assert_routes");
        let hosts: Vec<&String> = routes.keys().collect();
        let pairs = self.host_addr_pairs(&hosts)?;
        let wants = pairs
            .iter()
            .map(|(host, addr)| {
                match routes.get(host).and_then(|targets| targets.get(addr)) {
                    Some(hops) => ExpectedRoute::resolve(hops, self.addrs.get(addr)?, &self.addrs),
                    None => Ok(ExpectedRoute::unreachable()),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let gots = self.gather(&pairs, |host, addr| self.deployment_route(host, addr)).await?;
        self.compare("traceroute", &pairs, wants, gots, |want, got| want.matches(got))
    }

    /// Checks the route of every host/address pair.
    ///
    /// `routes` maps host to target address to the hops in between. Every
    /// pair not listed must be unreachable. For [`EXTERNAL`] only the part
    /// of the route inside the deployment is compared.
    pub async fn assert_routes(&self, routes: &RouteMap) -> Result<()> {
        self.check_routes(routes).await?.assert_ok();
        Ok(())
    }

    pub async fn check_ports_open(
        &self,
        ports: &PortMap,
        ranges: &[PortRange],
    ) -> Result<CheckReport> {
        let _timer = Timer::start("Net::assert_ports_open");
        let hosts: Vec<&String> = ports.keys().collect();
        self.running_hosts(&hosts)?;

        let mut pairs = Vec::new();
        let mut wants = Vec::new();
        for (host, addrs) in ports {
            for (addr, open) in addrs {
                pairs.push((host.clone(), addr.clone()));
                wants.push(open.clone());
            }
        }
        let gots = self.gather(&pairs, |host, addr| self.nmap(host, addr, ranges)).await?;
        self.compare("nmap", &pairs, wants, gots, |want, got| want == got)
    }

    /// Checks that exactly the listed ports are open, within `ranges`, for
    /// each listed host/address pair.
    pub async fn assert_ports_open(&self, ports: &PortMap, ranges: &[PortRange]) -> Result<()> {
        self.check_ports_open(ports, ranges).await?.assert_ok();
        Ok(())
    }

    async fn deployment_route(&self, host: &str, addr: &str) -> Result<Route> {
        let route = self.traceroute(host, addr).await?;
        if addr == EXTERNAL && !route.is_empty() {
            return Ok(route.truncate_outside(&self.addrs, self.addrs.get(addr)?));
        }
        Ok(route)
    }

    async fn gather<'a, T, F, Fut>(&self, pairs: &'a [(String, String)], probe: F) -> Result<Vec<T>>
    where
        F: Fn(&'a str, &'a str) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tracing::info!("running {} checks", pairs.len());
        stream::iter(pairs)
            .map(|(host, addr)| probe(host.as_str(), addr.as_str()))
            .buffered(self.max_parallel)
            .try_collect()
            .await
    }

    fn compare<W: Display, G: Display>(
        &self,
        check: &'static str,
        pairs: &[(String, String)],
        wants: Vec<W>,
        gots: Vec<G>,
        same: impl Fn(&W, &G) -> bool,
    ) -> Result<CheckReport> {
        let mut mismatches = Vec::new();
        for ((host, addr), (want, got)) in pairs.iter().zip(wants.iter().zip(&gots)) {
            if !same(want, got) {
                mismatches.push(Mismatch {
                    host: host.clone(),
                    addr: addr.clone(),
                    ip: self.addrs.get(addr)?,
                    want: want.to_string(),
                    got: got.to_string(),
                });
            }
        }
        Ok(CheckReport::new(check, pairs.len(), mismatches))
    }
}
