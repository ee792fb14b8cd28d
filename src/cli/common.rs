//! Helpers shared by the build and watch commands.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::ColorChoice;

use super::{BuildArgs, Cli};
use crate::config::{CompilerOptions, absolutize};
use crate::stats::{Stats, StatsOptions};

/// Load `weft.toml` and apply command-line overrides.
pub fn load_options(cli: &Cli, args: &BuildArgs) -> Result<CompilerOptions> {
    let mut options = CompilerOptions::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if let Some(output) = &args.output {
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        options.output.path = absolutize(&cwd, output);
    }
    Ok(options)
}

pub fn stats_options(color: ColorChoice) -> StatsOptions {
    let colors = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal(),
    };
    StatsOptions {
        colors,
        ..StatsOptions::default()
    }
}

/// Full summary as text or pretty JSON.
pub fn render_stats(stats: &Stats, options: &StatsOptions, json: bool) -> Result<String> {
    if json {
        let json = stats.to_json(options);
        return serde_json::to_string_pretty(&json).context("cannot serialize stats");
    }
    Ok(stats.to_string(options))
}

/// `3 files` / `1 file`
pub fn plural_count(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_count() {
        assert_eq!(plural_count(1, "asset"), "1 asset");
        assert_eq!(plural_count(0, "asset"), "0 assets");
    }

    #[test]
    fn test_stats_options_follow_color_choice() {
        assert!(stats_options(ColorChoice::Always).colors);
        assert!(!stats_options(ColorChoice::Never).colors);
        assert!(stats_options(ColorChoice::Never).modules);
    }
}
