//! The `vms` command - lists the VMs and their cached state.

use clap::Args;
use serde::Serialize;
use testbed::Testbed;

#[derive(Args)]
pub struct VmsArgs {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct VmEntry<'a> {
    name: &'a str,
    running: bool,
}

pub fn run(testbed: &Testbed, args: VmsArgs) -> anyhow::Result<()> {
    let state = testbed.vagrant().state();
    let vms: Vec<VmEntry<'_>> = state
        .iter()
        .map(|(name, running)| VmEntry {
            name,
            running: *running,
        })
        .collect();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "provider": testbed.vagrant().provider_name(),
                "vms": vms,
            }))?
        );
        return Ok(());
    }

    if vms.is_empty() {
        println!("No VMs defined.");
        return Ok(());
    }
    let width = vms.iter().map(|vm| vm.name.len()).max().unwrap_or(0);
    for vm in &vms {
        let status = if vm.running { "running" } else { "stopped" };
        println!("{:width$}  {status}", vm.name);
    }
    Ok(())
}
