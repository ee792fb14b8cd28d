use super::Module;

/// A group of modules rendered into output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: u64,
    pub name: Option<String>,
    /// Entry chunks carry the runtime and start their entry module.
    pub entry: bool,
    /// Identifiers of the contained modules, by module id.
    pub modules: Vec<String>,
    pub files: Vec<String>,
    pub parents: Vec<u64>,
    /// Whether the chunk was rendered by this build rather than reused.
    pub rendered: bool,
}

/// A module after ids were assigned.
#[derive(Debug, Clone)]
pub struct SealedModule {
    pub id: u64,
    pub module: Module,
    /// Ids of the chunks containing this module.
    pub chunks: Vec<u64>,
}

/// The frozen module/chunk graph of a sealed compilation.
#[derive(Debug, Clone, Default)]
pub struct SealedGraph {
    pub modules: Vec<SealedModule>,
    pub chunks: Vec<Chunk>,
    /// Hex digest over every asset present at seal time.
    pub hash: String,
}

impl SealedGraph {
    pub fn module(&self, identifier: &str) -> Option<&SealedModule> {
        self.modules
            .iter()
            .find(|m| m.module.identifier() == identifier)
    }

    pub fn chunk_by_name(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name.as_deref() == Some(name))
    }
}
