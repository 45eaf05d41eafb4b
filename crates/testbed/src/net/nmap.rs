use regex::Regex;
use std::net::Ipv4Addr;
use testbed_core::{Error, OpenPorts, PortRange, Protocol, Result};

const PORT_LINE: &str = r"^([0-9]+)/([a-z]+) +(\S+)";

/// TCP SYN and UDP scan of `ranges`, listing only open ports.
pub fn scan_command(ranges: &[PortRange], ip: Ipv4Addr) -> String {
    format!(
        "sudo nmap -p{} --open -Pn -oN - -T4 -sU -sS {ip}",
        PortRange::join(ranges)
    )
}

/// Collects the open ports from nmap's normal output.
///
/// `open|filtered` counts as open.
pub fn parse_open_ports(output: &str) -> Result<OpenPorts> {
    let port_line = Regex::new(PORT_LINE).map_err(|e| Error::InvalidPattern {
        pattern: PORT_LINE.to_string(),
        reason: e.to_string(),
    })?;
    let mut ports = OpenPorts::default();
    for line in output.lines() {
        let Some(caps) = port_line.captures(line) else {
            continue;
        };
        if !caps[3].split('|').any(|state| state == "open") {
            continue;
        }
        let port: u16 = caps[1]
            .parse()
            .map_err(|_| Error::Parse(format!("bad port in nmap line '{line}'")))?;
        let protocol: Protocol = caps[2].parse()?;
        ports.insert(protocol, port);
    }
    Ok(ports)
}
