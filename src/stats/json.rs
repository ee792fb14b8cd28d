use serde::Serialize;

use super::StatsOptions;
use crate::compilation::Compilation;
use crate::config::relative_to;

/// Serializable build summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    pub hash: String,
    /// Build time in milliseconds; absent for child compilations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub assets: Vec<AssetJson>,
    pub chunks: Vec<ChunkJson>,
    pub modules: Vec<ModuleJson>,
    pub children: Vec<StatsJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetJson {
    pub name: String,
    pub size: usize,
    pub chunks: Vec<u64>,
    pub chunk_names: Vec<String>,
    pub emitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkJson {
    pub id: u64,
    pub rendered: bool,
    pub entry: bool,
    /// Sum of the contained modules' sizes.
    pub size: usize,
    pub names: Vec<String>,
    pub files: Vec<String>,
    pub parents: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleJson {
    pub id: u64,
    pub identifier: String,
    /// Resource relative to the build context, `./`-prefixed.
    pub name: String,
    pub size: usize,
    pub chunks: Vec<u64>,
    pub built: bool,
    pub failed: bool,
}

impl StatsJson {
    pub(super) fn of(compilation: &Compilation, time: Option<u64>, options: &StatsOptions) -> Self {
        let context = &compilation.options().context;
        let chunks = compilation.chunks();
        let modules = compilation.modules();

        let assets = if options.assets {
            compilation
                .assets()
                .into_iter()
                .map(|(name, asset)| {
                    let owners: Vec<_> = chunks.iter().filter(|c| c.files.contains(&name)).collect();
                    AssetJson {
                        size: asset.size(),
                        chunks: owners.iter().map(|c| c.id).collect(),
                        chunk_names: owners.iter().filter_map(|c| c.name.clone()).collect(),
                        emitted: asset.emitted(),
                        name,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let chunk_json = if options.chunks {
            chunks
                .iter()
                .map(|chunk| ChunkJson {
                    id: chunk.id,
                    rendered: chunk.rendered,
                    entry: chunk.entry,
                    size: modules
                        .iter()
                        .filter(|m| m.chunks.contains(&chunk.id))
                        .map(|m| m.module.size())
                        .sum(),
                    names: chunk.name.iter().cloned().collect(),
                    files: chunk.files.clone(),
                    parents: chunk.parents.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let module_json = if options.modules {
            modules
                .iter()
                .map(|sealed| ModuleJson {
                    id: sealed.id,
                    identifier: sealed.module.identifier().to_owned(),
                    name: format!("./{}", relative_to(context, sealed.module.resource())),
                    size: sealed.module.size(),
                    chunks: sealed.chunks.clone(),
                    built: sealed.module.built(),
                    failed: sealed.module.error().is_some(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let children = if options.children {
            compilation
                .children()
                .iter()
                .map(|child| Self::of(child, None, options))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            name: compilation.name().map(str::to_owned),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            hash: compilation.hash().to_owned(),
            time,
            errors: compilation.errors().iter().map(ToString::to_string).collect(),
            warnings: compilation.warnings().iter().map(ToString::to_string).collect(),
            assets,
            chunks: chunk_json,
            modules: module_json,
            children,
        }
    }
}
