//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

use crate::config::CONFIG_FILE;

/// weft module bundler
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single build
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Rebuild whenever a dependency changes
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Aggregation delay in milliseconds (overrides `watch.delay_ms`)
        #[arg(short, long)]
        delay: Option<u64>,
    },
}

/// Arguments shared by Build and Watch.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Output directory (overrides `output.path`)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Print the build summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    pub const fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args } | Commands::Watch { build_args, .. } => build_args,
        }
    }

    pub const fn is_watch(&self) -> bool {
        matches!(self.command, Commands::Watch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_with_delay() {
        let cli = Cli::parse_from(["weft", "watch", "--delay", "50", "-V"]);
        assert!(cli.is_watch());
        assert!(cli.build_args().verbose);
        assert!(matches!(cli.command, Commands::Watch { delay: Some(50), .. }));
        assert_eq!(cli.config, PathBuf::from("weft.toml"));
    }

    #[test]
    fn test_parse_build_overrides() {
        let cli = Cli::parse_from(["weft", "-C", "site/weft.toml", "b", "-o", "out", "--json"]);
        assert!(!cli.is_watch());
        assert_eq!(cli.config, PathBuf::from("site/weft.toml"));
        assert_eq!(cli.build_args().output.as_deref(), Some(std::path::Path::new("out")));
        assert!(cli.build_args().json);
    }
}
