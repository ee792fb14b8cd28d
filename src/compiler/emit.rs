//! Writing assets and records to the output file system.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use super::Compiler;
use crate::compilation::{Asset, Compilation};
use crate::error::{BuildError, Result};
use crate::fs::OutputFileSystem;

impl Compiler {
    /// Write every asset of a sealed compilation below the output path.
    ///
    /// An asset already written to its target is skipped and reported with
    /// `emitted == false`. Writes run concurrently; the first failure is
    /// returned once every write has settled.
    pub async fn emit_assets(&self, compilation: &Arc<Compilation>) -> Result<()> {
        self.hooks.emit.call(compilation).await?;

        let fs = self
            .output_file_system
            .as_deref()
            .ok_or(BuildError::MissingOutputFileSystem)?;
        fs.mkdirp(&self.output_path)
            .await
            .map_err(|e| BuildError::io(&self.output_path, e))?;

        let assets = compilation.assets();
        let mut writes: FuturesUnordered<_> = assets
            .iter()
            .map(|(name, asset)| self.emit_asset(fs, name, asset))
            .collect();

        let mut first_error = None;
        while let Some(result) = writes.next().await {
            if let Err(e) = result
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        drop(writes);
        if let Some(e) = first_error {
            return Err(e);
        }

        crate::debug!("emit"; "{} assets to {}", assets.len(), self.output_path.display());
        self.hooks.after_emit.call(compilation).await
    }

    async fn emit_asset(&self, fs: &dyn OutputFileSystem, name: &str, asset: &Asset) -> Result<()> {
        let target = fs.join(&self.output_path, name);
        if asset.is_at(&target) {
            asset.mark_unchanged();
            return Ok(());
        }

        if let Some(dir) = target.parent()
            && dir != self.output_path
        {
            fs.mkdirp(dir).await.map_err(|e| BuildError::io(dir, e))?;
        }

        fs.write_file(&target, asset.source())
            .await
            .map_err(|e| BuildError::io(&target, e))?;
        crate::debug!("emit"; "{}", target.display());
        asset.mark_written(target);
        Ok(())
    }

    /// Persist the records document as indented JSON.
    ///
    /// Without a records output path nothing is touched.
    pub async fn emit_records(&self) -> Result<()> {
        let Some(path) = self.records_output_path.as_deref() else {
            return Ok(());
        };
        let fs = self
            .output_file_system
            .as_deref()
            .ok_or(BuildError::MissingOutputFileSystem)?;

        let content = self
            .records
            .read()
            .to_pretty()
            .map_err(BuildError::RecordsSerialize)?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs.mkdirp(dir).await.map_err(|e| BuildError::io(dir, e))?;
        }
        fs.write_file(path, content.as_bytes())
            .await
            .map_err(|e| BuildError::io(path, e))?;

        crate::debug!("records"; "wrote {}", path.display());
        Ok(())
    }
}
