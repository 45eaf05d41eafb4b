//! Parser for `traceroute` output.
//!
//! ```text
//! traceroute to 10.1.0.1 (10.1.0.1), 30 hops max, 60 byte packets
//!  1  router1 (192.168.0.1)  0.345 ms  0.290 ms  0.280 ms
//!  2  * * *
//!  3  10.1.0.1 (10.1.0.1)  1.012 ms !H  1.100 ms !H  *
//! ```

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use testbed_core::{EXTERNAL, Error, Result, Route};

/// One probe sent for a hop. A probe with no IP timed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub name: Option<String>,
    pub ip: Option<Ipv4Addr>,
    pub rtt_ms: Option<f64>,
    /// ICMP annotation such as `!H` or `!X`.
    pub annotation: Option<String>,
}

impl Probe {
    fn timed_out() -> Self {
        Self {
            name: None,
            ip: None,
            rtt_ms: None,
            annotation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub index: u32,
    pub probes: Vec<Probe>,
}

impl Hop {
    /// Distinct addresses that answered at this hop.
    pub fn ips(&self) -> BTreeSet<Ipv4Addr> {
        self.probes.iter().filter_map(|p| p.ip).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub hops: Vec<Hop>,
}

impl Trace {
    pub fn parse(output: &str) -> Result<Self> {
        let mut hops = Vec::new();
        for line in output.lines() {
            let line = line.trim();
            let mut tokens = line.split_whitespace();
            let Some(index) = tokens.next().and_then(|t| t.parse::<u32>().ok()) else {
                continue;
            };
            let rest: Vec<&str> = tokens.collect();
            hops.push(Hop {
                index,
                probes: parse_probes(&rest).map_err(|reason| {
                    Error::Parse(format!("traceroute hop '{line}': {reason}"))
                })?,
            });
        }
        Ok(Self { hops })
    }

    pub fn has_annotation(&self) -> bool {
        self.hops
            .iter()
            .flat_map(|hop| &hop.probes)
            .any(|probe| probe.annotation.is_some())
    }

    /// Reduces the trace to one address per hop.
    ///
    /// `host`, `addr` and `target` describe the traced pair. An annotated
    /// probe, or a non-external trace that did not end at `target`, gives an
    /// unreachable route. A hop answered by several addresses is an error.
    pub fn route(&self, host: &str, addr: &str, target: Ipv4Addr) -> Result<Route> {
        if self.has_annotation() {
            return Ok(Route::unreachable());
        }

        let mut hops = Vec::with_capacity(self.hops.len());
        for hop in &self.hops {
            let ips = hop.ips();
            match ips.len() {
                0 => hops.push(None),
                1 => hops.push(ips.into_iter().next()),
                _ => {
                    return Err(Error::AmbiguousRoute {
                        host: host.to_string(),
                        addr: addr.to_string(),
                        ips: ips.into_iter().collect(),
                    });
                }
            }
        }

        if addr != EXTERNAL && hops.last() != Some(&Some(target)) {
            return Ok(Route::unreachable());
        }
        Ok(Route::new(hops))
    }
}

fn parse_probes(tokens: &[&str]) -> std::result::Result<Vec<Probe>, String> {
    let mut probes: Vec<Probe> = Vec::new();
    let mut name: Option<String> = None;
    let mut ip: Option<Ipv4Addr> = None;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let next = tokens.get(i + 1).copied();
        i += 1;

        if token == "*" {
            probes.push(Probe::timed_out());
        } else if let Some(annotation) = token.strip_prefix('!') {
            let probe = probes
                .last_mut()
                .ok_or_else(|| format!("annotation '!{annotation}' before any probe"))?;
            probe.annotation = Some(annotation.to_string());
        } else if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            ip = Some(
                inner
                    .parse()
                    .map_err(|_| format!("bad address '{inner}'"))?,
            );
        } else if token.starts_with('[') {
            // AS path lookup, e.g. [AS13335]
        } else if let (Ok(rtt), Some("ms")) = (token.parse::<f64>(), next) {
            i += 1;
            probes.push(Probe {
                name: name.clone(),
                ip: Some(ip.ok_or_else(|| format!("round trip time '{token}' without an address"))?),
                rtt_ms: Some(rtt),
                annotation: None,
            });
        } else if let Ok(bare) = token.parse::<Ipv4Addr>() {
            name = Some(token.to_string());
            ip = Some(bare);
        } else {
            name = Some(token.to_string());
            ip = None;
        }
    }
    Ok(probes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 1, 0, 1);

    #[test]
    fn parses_named_hops_and_timeouts() {
        let trace = Trace::parse(
            "traceroute to 10.1.0.1 (10.1.0.1), 30 hops max, 60 byte packets\n \
             1  router1 (192.168.0.1)  0.345 ms  0.290 ms  0.280 ms\n \
             2  * * *\n \
             3  10.1.0.1 (10.1.0.1)  1.012 ms  1.100 ms  1.200 ms\n",
        )
        .unwrap();
        assert_eq!(trace.hops.len(), 3);
        assert_eq!(trace.hops[0].probes.len(), 3);
        assert_eq!(trace.hops[0].probes[0].name.as_deref(), Some("router1"));
        assert_eq!(trace.hops[0].probes[2].rtt_ms, Some(0.280));
        assert!(trace.hops[1].ips().is_empty());
        assert!(!trace.has_annotation());

        let route = trace.route("pi1", "router2_wan", TARGET).unwrap();
        assert_eq!(
            route,
            Route::new(vec![Some(Ipv4Addr::new(192, 168, 0, 1)), None, Some(TARGET)])
        );
    }

    #[test]
    fn annotation_makes_route_unreachable() {
        let trace = Trace::parse(
            " 1  192.168.0.1 (192.168.0.1)  0.3 ms  0.2 ms  0.2 ms\n \
             2  10.1.0.1 (10.1.0.1)  1.0 ms !H  1.1 ms !H  *\n",
        )
        .unwrap();
        assert!(trace.has_annotation());
        assert_eq!(trace.hops[1].probes[0].annotation.as_deref(), Some("H"));
        assert!(trace.route("pi1", "x", TARGET).unwrap().is_empty());
    }

    #[test]
    fn multiple_ips_at_one_hop_is_an_error() {
        let trace = Trace::parse(" 1  a (10.0.0.1)  1 ms b (10.0.0.2)  2 ms  3 ms\n").unwrap();
        assert_eq!(trace.hops[0].probes[2].ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
        let err = trace.route("pi1", "external", TARGET).unwrap_err();
        match err {
            Error::AmbiguousRoute { host, addr, ips } => {
                assert_eq!(host, "pi1");
                assert_eq!(addr, "external");
                assert_eq!(
                    ips,
                    vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn off_target_trace_is_unreachable() {
        let trace = Trace::parse(" 1  192.168.0.1 (192.168.0.1)  0.3 ms\n 2  * * *\n").unwrap();
        assert!(trace.route("pi1", "router2_wan", TARGET).unwrap().is_empty());
    }

    #[test]
    fn external_trace_keeps_partial_route() {
        let trace = Trace::parse(" 1  192.168.0.1 (192.168.0.1)  0.3 ms\n 2  * * *\n").unwrap();
        let route = trace.route("pi1", EXTERNAL, TARGET).unwrap();
        assert_eq!(route.hops(), &[Some(Ipv4Addr::new(192, 168, 0, 1)), None]);
    }

    #[test]
    fn empty_trace_to_internal_target_is_unreachable() {
        let trace = Trace::parse("traceroute to 10.1.0.1 (10.1.0.1), 30 hops max\n").unwrap();
        assert!(trace.hops.is_empty());
        assert!(trace.route("pi1", "router2_wan", TARGET).unwrap().is_empty());
    }

    #[test]
    fn bare_addresses_without_names() {
        let trace = Trace::parse(" 1  192.168.0.1  0.3 ms  0.2 ms\n").unwrap();
        assert_eq!(trace.hops[0].probes.len(), 2);
        assert_eq!(trace.hops[0].probes[1].ip, Some(Ipv4Addr::new(192, 168, 0, 1)));
    }

    #[test]
    fn rejects_bad_address() {
        assert!(Trace::parse(" 1  x (10.0.0.300)  1 ms\n").is_err());
        assert!(Trace::parse(" 1  !H\n").is_err());
    }
}
