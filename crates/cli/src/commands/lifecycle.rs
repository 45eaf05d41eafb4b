//! The `up`, `down` and `reboot` commands.

use clap::Args;
use testbed::Testbed;

#[derive(Args)]
pub struct LifecycleArgs {
    /// VM names
    #[arg(required = true)]
    vms: Vec<String>,
}

pub async fn up(testbed: &Testbed, args: LifecycleArgs) -> anyhow::Result<()> {
    for vm in &args.vms {
        testbed.vagrant().up(vm).await?;
        eprintln!("{vm}: running");
    }
    Ok(())
}

pub async fn down(testbed: &Testbed, args: LifecycleArgs) -> anyhow::Result<()> {
    for vm in &args.vms {
        testbed.vagrant().down(vm).await?;
        eprintln!("{vm}: stopped");
    }
    Ok(())
}

pub async fn reboot(testbed: &Testbed, args: LifecycleArgs) -> anyhow::Result<()> {
    let vms: Vec<&str> = args.vms.iter().map(String::as_str).collect();
    testbed.vagrant().reboot(&vms).await?;
    eprintln!("rebooted {}", vms.join(", "));
    Ok(())
}
