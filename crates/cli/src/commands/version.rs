//! Prints the harness version, for bug reports against a given testbed.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs {
    /// Print only the version number
    #[arg(long, short)]
    short: bool,
}

pub fn run(args: VersionArgs) {
    let version = env!("CARGO_PKG_VERSION");
    if args.short {
        println!("{version}");
    } else {
        println!("{} {version} ({})", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_NAME"));
    }
}
