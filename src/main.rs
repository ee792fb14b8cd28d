//! weft - module bundler command line.

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use weft::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    if let Err(e) = runtime.block_on(cli::run(&cli)) {
        weft::log!("error"; "{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
