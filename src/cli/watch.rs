//! Watch command: rebuild on change until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::Notify;

use super::common::{load_options, plural_count, render_stats, stats_options};
use super::{BuildArgs, Cli};
use crate::compiler::Compiler;
use crate::error::BuildError;
use crate::log;
use crate::logger::{status_error, status_success, status_warning};
use crate::stats::{Stats, StatsOptions};

pub async fn watch(cli: &Cli, args: &BuildArgs, delay: Option<u64>) -> Result<()> {
    let options = load_options(cli, args)?;
    let delay = delay.map_or_else(|| options.watch_delay(), Duration::from_millis);

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || signal.notify_one())
        .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))?;

    let stats_options = stats_options(cli.color);
    let json = args.json;
    let compiler = Compiler::from_options(options);
    let handle = compiler.watch(delay, move |result| report(result, &stats_options, json))?;
    log!("watch"; "watching for changes (delay {}ms), press Ctrl+C to stop", delay.as_millis());

    shutdown.notified().await;
    log!("watch"; "shutting down...");
    handle.close().await?;
    Ok(())
}

fn report(result: Result<Stats, BuildError>, options: &StatsOptions, json: bool) {
    let stats = match result {
        Ok(stats) => stats,
        Err(err) => {
            status_error("build failed", &format!("{:#}", anyhow::Error::from(err)));
            return;
        }
    };

    if json {
        match render_stats(&stats, options, true) {
            Ok(text) => println!("{text}"),
            Err(e) => status_error("cannot render stats", &format!("{e:#}")),
        }
        return;
    }

    let emitted = stats
        .compilation
        .assets()
        .iter()
        .filter(|(_, asset)| asset.emitted())
        .count();
    let summary = format!(
        "{} in {}ms, {} emitted",
        stats.hash(),
        stats.time(),
        plural_count(emitted, "asset")
    );

    if stats.has_errors() {
        let errors = stats.compilation.errors();
        let detail: Vec<_> = errors.iter().map(ToString::to_string).collect();
        status_error(
            &format!("{summary}, {}", plural_count(errors.len(), "error")),
            &detail.join("\n"),
        );
    } else if stats.has_warnings() {
        let warnings = stats.compilation.warnings();
        let detail: Vec<_> = warnings.iter().map(ToString::to_string).collect();
        status_warning(&summary, &detail.join("\n"));
    } else {
        status_success(&summary);
    }
}
