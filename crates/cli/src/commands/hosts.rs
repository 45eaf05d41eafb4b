//! The `hosts` command - lists inventory hosts grouped by type.

use clap::Args;
use testbed::Testbed;

#[derive(Args)]
pub struct HostsArgs {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

pub fn run(testbed: &Testbed, args: HostsArgs) -> anyhow::Result<()> {
    let by_type = testbed.inventory().hostnames_by_type()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&by_type)?);
        return Ok(());
    }

    for (host_type, hosts) in &by_type {
        println!("{host_type}: {}", hosts.join(" "));
    }
    Ok(())
}
