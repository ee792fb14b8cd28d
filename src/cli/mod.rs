//! Command-line interface module.

mod args;
pub mod build;
pub mod common;
pub mod watch;

pub use args::{BuildArgs, Cli, Commands};

use anyhow::Result;

/// Dispatch a parsed command line.
pub async fn run(cli: &Cli) -> Result<()> {
    crate::logger::set_verbose(cli.build_args().verbose);

    match &cli.command {
        Commands::Build { build_args } => build::build(cli, build_args).await,
        Commands::Watch { build_args, delay } => watch::watch(cli, build_args, *delay).await,
    }
}
