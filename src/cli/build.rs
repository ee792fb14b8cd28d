//! One-shot build command.

use anyhow::{Result, bail};

use super::common::{load_options, plural_count, render_stats, stats_options};
use super::{BuildArgs, Cli};
use crate::compiler::Compiler;
use crate::log;

pub async fn build(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let options = load_options(cli, args)?;
    log!("build"; "{} -> {}", options.context.display(), options.output.path.display());

    let compiler = Compiler::from_options(options);
    let stats = compiler.run().await?;

    let stats_options = stats_options(cli.color);
    println!("{}", render_stats(&stats, &stats_options, args.json)?);

    if stats.has_errors() {
        let count = stats.compilation.errors().len();
        bail!("build finished with {}", plural_count(count, "error"));
    }
    Ok(())
}
