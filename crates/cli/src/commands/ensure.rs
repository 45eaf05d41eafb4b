//! The `ensure` command - converges the fleet to all-up-except.

use clap::Args;
use testbed::Testbed;

#[derive(Args)]
pub struct EnsureArgs {
    /// VM to keep halted (repeatable)
    #[arg(long = "down", value_name = "VM")]
    down: Vec<String>,
}

pub async fn run(testbed: &Testbed, args: EnsureArgs) -> anyhow::Result<()> {
    let changed = testbed.ensure_vm_state(&args.down).await?;
    let running = testbed.vagrant().running_vms();
    if changed {
        eprintln!("VM state changed; running: {}", running.join(", "));
    } else {
        eprintln!("VM state already converged; running: {}", running.join(", "));
    }
    Ok(())
}
