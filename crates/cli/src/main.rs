mod commands;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use testbed::{Settings, Testbed};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testbed")]
#[command(about = "Drive and check a Vagrant-provisioned home-server testbed")]
#[command(version)]
struct Cli {
    /// Path to a testbed.toml settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the VMs and whether they are running
    Vms(commands::vms::VmsArgs),

    /// Start VMs
    Up(commands::lifecycle::LifecycleArgs),

    /// Halt VMs
    Down(commands::lifecycle::LifecycleArgs),

    /// Halt and restart VMs, then wait for them to settle
    Reboot(commands::lifecycle::LifecycleArgs),

    /// Bring every VM up except the listed ones
    Ensure(commands::ensure::EnsureArgs),

    /// List inventory hosts grouped by type
    Hosts(commands::hosts::HostsArgs),

    /// Run the network checks in an expectations file
    Check(commands::check::CheckArgs),

    /// Show version information
    Version(commands::version::VersionArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

/// Returns `false` when a check ran but found mismatches.
async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    let settings = cli.settings.as_deref();

    match cli.command {
        Commands::Vms(args) => commands::vms::run(&connect(settings).await?, args)?,
        Commands::Up(args) => commands::lifecycle::up(&connect(settings).await?, args).await?,
        Commands::Down(args) => commands::lifecycle::down(&connect(settings).await?, args).await?,
        Commands::Reboot(args) => {
            commands::lifecycle::reboot(&connect(settings).await?, args).await?
        }
        Commands::Ensure(args) => commands::ensure::run(&connect(settings).await?, args).await?,
        Commands::Hosts(args) => commands::hosts::run(&connect(settings).await?, args)?,
        Commands::Check(args) => {
            return commands::check::run(&connect(settings).await?, args).await;
        }
        Commands::Version(args) => commands::version::run(args),
    }
    Ok(true)
}

async fn connect(settings: Option<&Path>) -> anyhow::Result<Testbed> {
    let settings = match settings {
        Some(path) => Settings::load(path).map_err(|e| {
            anyhow::anyhow!("failed to load settings from {}: {e}", path.display())
        })?,
        None => Settings::default(),
    };
    tracing::debug!(?settings, "connecting to testbed");
    Ok(Testbed::connect(settings).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_option_is_global() {
        let cli = Cli::try_parse_from([
            "testbed", "ensure", "--down", "pi1", "--down", "pi2", "--settings", "testbed.toml",
        ])
        .unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("testbed.toml")));
        assert!(matches!(cli.command, Commands::Ensure(_)));
    }

    #[test]
    fn lifecycle_commands_need_a_vm() {
        assert!(Cli::try_parse_from(["testbed", "up"]).is_err());
        assert!(Cli::try_parse_from(["testbed", "reboot", "pi1", "pi2"]).is_ok());
    }

    #[test]
    fn check_takes_a_file() {
        let cli = Cli::try_parse_from(["testbed", "check", "expect/base.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Check(_)));
        assert!(Cli::try_parse_from(["testbed", "check"]).is_err());
    }

    #[test]
    fn version_needs_no_settings() {
        let cli = Cli::try_parse_from(["testbed", "version", "--short"]).unwrap();
        assert!(cli.settings.is_none());
        assert!(matches!(cli.command, Commands::Version(_)));
    }
}
