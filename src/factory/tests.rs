use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::*;
use crate::compilation::ModuleCache;
use crate::config::ResolveOptions;
use crate::fs::{MemoryFileSystem, Timestamps};
use crate::parser::{Dependency, Parser};

struct Fixture {
    fs: Arc<MemoryFileSystem>,
    resolvers: Resolvers,
    cache: Arc<ModuleCache>,
}

impl Fixture {
    fn new() -> Self {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/p/src/index.js", "var a = require('./a');\nrequire.context('./pages');");
        fs.insert_file("/p/src/a.js", "module.exports = 'a';");
        fs.insert_file("/p/src/config.json", "{ \"debug\": true }\n");
        fs.insert_file("/p/src/pages/home.js", "");
        fs.insert_file("/p/src/pages/blog/post.js", "");
        fs.insert_file("/p/src/pages/notes.txt", "");
        let resolvers = Resolvers::new(fs.clone(), &ResolveOptions::default());
        Self {
            fs,
            resolvers,
            cache: Arc::new(ModuleCache::new()),
        }
    }

    fn normal(&self, timestamps: Timestamps) -> NormalModuleFactory {
        NormalModuleFactory::new(
            PathBuf::from("/p/src"),
            self.resolvers.clone(),
            Arc::new(Parser::new()),
            self.fs.clone(),
            self.cache.clone(),
            Arc::new(timestamps),
        )
    }
}

#[tokio::test]
async fn test_create_parses_dependencies() {
    let fixture = Fixture::new();
    let factory = fixture.normal(Timestamps::default());

    let module = factory.create(Path::new("/p/src"), "./index").await.unwrap();
    assert_eq!(module.identifier(), "/p/src/index.js");
    assert!(module.built());
    let requests: Vec<_> = module
        .dependencies()
        .iter()
        .filter_map(Dependency::request)
        .collect();
    assert_eq!(requests, ["./a", "./pages"]);
    assert_eq!(fixture.cache.len(), 1);
}

#[tokio::test]
async fn test_json_module_is_wrapped() {
    let fixture = Fixture::new();
    let module = fixture
        .normal(Timestamps::default())
        .create(Path::new("/p/src"), "./config.json")
        .await
        .unwrap();
    assert_eq!(module.source(), "module.exports = { \"debug\": true };");
    assert!(module.dependencies().is_empty());
}

#[tokio::test]
async fn test_fresh_cache_entry_skips_read() {
    let fixture = Fixture::new();
    fixture
        .normal(Timestamps::default())
        .create(Path::new("/p/src"), "./a")
        .await
        .unwrap();

    // Older than the cached build: reused without touching the file.
    let mut timestamps = Timestamps::default();
    timestamps.files.insert(PathBuf::from("/p/src/a.js"), 1);
    fixture.fs.insert_file("/p/src/a.js", "changed on disk");

    let module = fixture
        .normal(timestamps)
        .create(Path::new("/p/src"), "./a")
        .await
        .unwrap();
    assert!(!module.built());
    assert_eq!(module.source(), "module.exports = 'a';");
}

#[tokio::test]
async fn test_before_resolve_rewrites_request() {
    let fixture = Fixture::new();
    let mut factory = fixture.normal(Timestamps::default());
    factory.on_before_resolve("Alias", |request| {
        request.strip_prefix("@/").map(|rest| format!("./{rest}"))
    });

    let module = factory.create(Path::new("/p/src"), "@/a").await.unwrap();
    assert_eq!(module.identifier(), "/p/src/a.js");
}

#[tokio::test]
async fn test_context_factory_lists_files_recursively() {
    let fixture = Fixture::new();
    let factory = ContextModuleFactory::new(
        fixture.resolvers.clone(),
        fixture.fs.clone(),
        &ResolveOptions::default().extensions,
    );

    let context = factory.create(Path::new("/p/src"), "./pages").await.unwrap();
    assert_eq!(context.directory, PathBuf::from("/p/src/pages"));
    let keys: Vec<_> = context.files.keys().map(String::as_str).collect();
    assert_eq!(keys, ["./blog/post.js", "./home.js"]);
}
