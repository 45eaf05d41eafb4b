//! The `check` command - runs the network checks in an expectations file.

use clap::Args;
use std::path::PathBuf;
use testbed::{CheckReport, Expectations, PortRange, Testbed};

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the expectations TOML file
    file: PathBuf,

    /// Check the fleet as it is instead of converging VM state first
    #[arg(long)]
    no_ensure: bool,
}

/// Returns whether every check passed.
pub async fn run(testbed: &Testbed, args: CheckArgs) -> anyhow::Result<bool> {
    let expectations = Expectations::load(&args.file).map_err(|e| {
        anyhow::anyhow!("failed to load expectations from {}: {e}", args.file.display())
    })?;

    if !args.no_ensure {
        testbed.ensure_vm_state(&expectations.vms_down).await?;
    }

    let net = testbed.net();
    let mut reports = Vec::new();
    if let Some(reachable) = &expectations.reachability {
        reports.push(net.check_reachability(reachable).await?);
    }
    if let Some(routes) = &expectations.routes {
        reports.push(net.check_routes(routes).await?);
    }
    if let Some(ports) = &expectations.ports {
        let ranges = if expectations.port_ranges.is_empty() {
            vec![PortRange::new(1, u16::MAX)?]
        } else {
            expectations.port_ranges.clone()
        };
        reports.push(net.check_ports_open(ports, &ranges).await?);
    }

    if reports.is_empty() {
        eprintln!("{}: no checks defined", args.file.display());
        return Ok(true);
    }
    Ok(summarize(&reports))
}

fn summarize(reports: &[CheckReport]) -> bool {
    for report in reports {
        println!("{report}");
    }
    let failed = reports.iter().filter(|report| !report.is_ok()).count();
    if failed > 0 {
        println!("{failed} of {} checks failed", reports.len());
    }
    failed == 0
}
