use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Plugin;
use crate::compiler::Compiler;

/// Adds one named entry point during `make`.
#[derive(Debug, Clone)]
pub struct EntryPlugin {
    context: PathBuf,
    request: String,
    name: String,
}

impl EntryPlugin {
    pub fn new(context: &Path, request: &str, name: &str) -> Self {
        Self {
            context: context.to_path_buf(),
            request: request.to_owned(),
            name: name.to_owned(),
        }
    }
}

impl Plugin for EntryPlugin {
    fn name(&self) -> &str {
        "EntryPlugin"
    }

    fn apply(&self, compiler: &mut Compiler) {
        let entry = Arc::new(self.clone());
        compiler.hooks.make.tap(self.name(), move |compilation| {
            let entry = Arc::clone(&entry);
            Box::pin(async move {
                compilation
                    .add_entry(&entry.context, &entry.request, &entry.name)
                    .await?;
                Ok(())
            })
        });
    }
}
