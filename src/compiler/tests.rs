use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::compilation::RawSource;
use crate::config::OutputOverrides;
use crate::fs::MemoryFileSystem;
use crate::hooks::HookName;

struct Fixture {
    compiler: Compiler,
    input: Arc<MemoryFileSystem>,
    output: Arc<MemoryFileSystem>,
}

fn fixture() -> Fixture {
    let input = Arc::new(MemoryFileSystem::new());
    input.insert_file("/app/index.js", "var b = require('./b');\nmodule.exports = b;");
    input.insert_file("/app/b.js", "module.exports = 2;");
    input.insert_file("/app/worker.js", "module.exports = 'worker';");
    let output = Arc::new(MemoryFileSystem::new());

    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.set_input_file_system(input.clone());
    compiler.set_output_file_system(Some(output.clone()));
    compiler.set_watch_file_system(None);
    compiler.set_output_path("/dist");

    Fixture {
        compiler,
        input,
        output,
    }
}

fn with_entry(mut fixture: Fixture) -> Fixture {
    fixture
        .compiler
        .apply(&EntryPlugin::new(Path::new("/app"), "./index", "main"));
    fixture
}

/// Emits a fixed `main.js` during the emit phase.
struct EmitMain;

impl Plugin for EmitMain {
    fn name(&self) -> &str {
        "EmitMain"
    }

    fn apply(&self, compiler: &mut Compiler) {
        compiler.hooks.emit.tap(self.name(), |compilation| {
            compilation.emit_asset("main.js", RawSource::from("console.log(1)"));
            Box::pin(async { Ok(()) })
        });
    }
}

fn counter<T: ?Sized + 'static>(hook: &mut crate::hooks::SyncHook<T>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    hook.tap("Counter", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    count
}

// ============================================================================
// run
// ============================================================================

#[tokio::test]
async fn test_run_writes_assets_and_records() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = fixture();
    compiler.apply(&EmitMain);
    compiler.set_records_output_path(Some("/dist/.records".into()));

    let stats = compiler.run().await.unwrap();

    assert_eq!(output.contents_str("/dist/main.js").as_deref(), Some("console.log(1)"));
    let records = output.contents_str("/dist/.records").unwrap();
    assert_eq!(records, compiler.records().read().to_pretty().unwrap());
    assert!(stats.compilation.asset("main.js").unwrap().emitted());
}

#[tokio::test]
async fn test_second_run_skips_unchanged_asset() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = fixture();
    compiler.apply(&EmitMain);
    compiler.set_records_output_path(Some("/dist/.records".into()));

    compiler.run().await.unwrap();
    assert_eq!(output.writes(), 2);

    let stats = compiler.run().await.unwrap();
    let asset = stats.compilation.asset("main.js").unwrap();
    assert!(!asset.emitted());
    assert_eq!(asset.exists_at().as_deref(), Some(Path::new("/dist/main.js")));
    // only the records file was written again
    assert_eq!(output.writes(), 3);
}

#[tokio::test]
async fn test_lifecycle_order() {
    let Fixture { mut compiler, .. } = with_entry(fixture());
    let log = Arc::new(Mutex::new(Vec::new()));

    macro_rules! record_async {
        ($hook:ident) => {{
            let log = Arc::clone(&log);
            compiler.hooks.$hook.tap("Log", move |_| {
                log.lock().push(stringify!($hook));
                Box::pin(async { Ok(()) })
            });
        }};
    }
    macro_rules! record_sync {
        ($hook:ident) => {{
            let log = Arc::clone(&log);
            compiler.hooks.$hook.tap("Log", move |_| {
                log.lock().push(stringify!($hook));
            });
        }};
    }

    record_async!(run);
    record_sync!(compile);
    record_sync!(compilation);
    record_async!(make);
    record_async!(after_compile);
    record_async!(emit);
    record_async!(after_emit);
    record_sync!(done);
    record_sync!(normal_module_factory);
    record_sync!(context_module_factory);

    compiler.run().await.unwrap();
    assert_eq!(
        *log.lock(),
        [
            "run",
            "normal_module_factory",
            "context_module_factory",
            "compile",
            "compilation",
            "make",
            "after_compile",
            "emit",
            "after_emit",
            "done",
        ]
    );
}

#[tokio::test]
async fn test_make_failure_skips_emit_and_records() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = with_entry(fixture());
    compiler.set_records_output_path(Some("/dist/.records".into()));
    compiler.hooks.make.tap("Broken", |_| {
        Box::pin(async { Err(anyhow::anyhow!("cannot read entry")) })
    });
    let emits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&emits);
    compiler.hooks.emit.tap("Spy", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    });
    let done = counter(&mut compiler.hooks.done);
    let failed = counter(&mut compiler.hooks.failed);

    let err = compiler.run().await.unwrap_err();

    assert_eq!(err.hook_name(), Some(HookName::Make));
    assert!(err.to_string().contains("Broken"));
    assert_eq!(emits.load(Ordering::SeqCst), 0);
    assert_eq!(output.writes(), 0);
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_emit_without_output_file_system() {
    let Fixture { mut compiler, .. } = with_entry(fixture());
    compiler.set_output_file_system(None);

    let err = compiler.run().await.unwrap_err();
    assert!(matches!(err, BuildError::MissingOutputFileSystem));
}

// ============================================================================
// emit
// ============================================================================

#[tokio::test]
async fn test_emit_same_compilation_twice() {
    let Fixture {
        compiler, output, ..
    } = with_entry(fixture());
    let compilation = compiler.compile().await.unwrap();

    compiler.emit_assets(&compilation).await.unwrap();
    let writes = output.writes();
    let before: Vec<_> = compilation
        .assets()
        .into_iter()
        .map(|(name, asset)| (name, asset.size(), asset.emitted()))
        .collect();
    assert!(before.iter().all(|(_, _, emitted)| *emitted));

    compiler.emit_assets(&compilation).await.unwrap();
    assert_eq!(output.writes(), writes);
    for (name, size, _) in before {
        let asset = compilation.asset(&name).unwrap();
        assert!(!asset.emitted(), "{name}");
        assert_eq!(asset.size(), size);
    }
}

#[tokio::test]
async fn test_emit_creates_nested_directories() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = with_entry(fixture());
    compiler.hooks.emit.tap("Nested", |compilation| {
        compilation.emit_asset("js/vendor/lib.js", RawSource::from("lib"));
        Box::pin(async { Ok(()) })
    });

    compiler.run().await.unwrap();
    assert!(output.is_dir("/dist/js/vendor"));
    assert_eq!(output.contents_str("/dist/js/vendor/lib.js").as_deref(), Some("lib"));
    assert!(output.contents_str("/dist/main.js").is_some());
}

#[tokio::test]
async fn test_emit_write_failure_is_reported() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = with_entry(fixture());
    // a file where a directory is needed
    output.insert_file("/dist/js", "blocked");
    compiler.hooks.emit.tap("Nested", |compilation| {
        compilation.emit_asset("js/lib.js", RawSource::from("lib"));
        Box::pin(async { Ok(()) })
    });
    let after_emit = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&after_emit);
    compiler.hooks.after_emit.tap("Spy", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    });

    let err = compiler.run().await.unwrap_err();
    assert!(matches!(err, BuildError::Io { .. }));
    assert_eq!(after_emit.load(Ordering::SeqCst), 0);
    // the sibling write still went through
    assert!(output.contents_str("/dist/main.js").is_some());
}

// ============================================================================
// records
// ============================================================================

#[tokio::test]
async fn test_emit_records_without_path_touches_nothing() {
    let Fixture {
        mut compiler,
        output,
        ..
    } = fixture();
    compiler.emit_records().await.unwrap();
    assert_eq!(output.writes(), 0);

    compiler.set_output_file_system(None);
    compiler.emit_records().await.unwrap();
}

#[tokio::test]
async fn test_read_records_missing_file_is_empty() {
    let Fixture { mut compiler, .. } = fixture();
    compiler.records().write().set_counter("nextFreeModuleId", 9);
    compiler.set_records_input_path(Some("/state/records.json".into()));

    compiler.read_records().await.unwrap();
    assert!(compiler.records().read().is_empty());
}

#[tokio::test]
async fn test_read_records_parse_error_keeps_previous() {
    let Fixture {
        mut compiler,
        input,
        ..
    } = fixture();
    input.insert_file("/state/records.json", r#"{ "nextFreeModuleId": 3 }"#);
    compiler.set_records_input_path(Some("/state/records.json".into()));
    compiler.read_records().await.unwrap();
    assert_eq!(compiler.records().read().counter("nextFreeModuleId"), 3);

    input.insert_file("/state/records.json", "{ not json");
    let err = compiler.read_records().await.unwrap_err();
    assert!(matches!(err, BuildError::RecordsParse(_)));
    assert!(err.to_string().starts_with("Cannot parse records:"));
    assert_eq!(compiler.records().read().counter("nextFreeModuleId"), 3);
}

#[tokio::test]
async fn test_records_keep_ids_across_runs() {
    let Fixture {
        mut compiler,
        input,
        output,
    } = with_entry(fixture());
    compiler.set_records_input_path(Some("/dist/records.json".into()));
    compiler.set_records_output_path(Some("/dist/records.json".into()));

    let first = compiler.run().await.unwrap();
    let b_id = first.compilation.sealed().unwrap().module("/app/b.js").unwrap().id;

    // written on the output side, read back from the input side
    let written = output.contents("/dist/records.json").unwrap();
    input.insert_file("/dist/records.json", written);
    input.insert_file("/app/a.js", "module.exports = 1;");
    input.insert_file(
        "/app/index.js",
        "var a = require('./a');\nvar b = require('./b');",
    );

    let second = compiler.run().await.unwrap();
    let sealed = second.compilation.sealed().unwrap();
    assert_eq!(sealed.module("/app/b.js").unwrap().id, b_id);
    assert_eq!(sealed.modules.len(), 3);
}

#[test]
fn test_records_paths_are_normalized() {
    let Fixture { mut compiler, .. } = fixture();
    compiler.set_records_output_path(Some(r"out\records.json".into()));
    assert_eq!(
        compiler.records_output_path(),
        Some(Path::new("out/records.json"))
    );
    compiler.set_records_input_path(None);
    assert_eq!(compiler.records_input_path(), None);
}

// ============================================================================
// children
// ============================================================================

#[tokio::test]
async fn test_child_compiler_inherits_selected_hooks() {
    let Fixture { mut compiler, .. } = with_entry(fixture());
    compiler.hooks.compilation.tap("Shared", |_| {});
    compiler.hooks.done.tap("ParentOnly", |_| {});
    let compilation = compiler.compile().await.unwrap();

    let overrides = OutputOverrides {
        filename: Some("[name].worker.js".into()),
        ..OutputOverrides::default()
    };
    let child = compiler.create_child_compiler(&compilation, "worker", &overrides);

    assert!(child.is_child());
    assert_eq!(child.name(), Some("worker"));
    assert_eq!(child.hooks.count(HookName::Make), 0);
    assert_eq!(child.hooks.count(HookName::Done), 0);
    assert_eq!(child.hooks.plugins(HookName::Compilation), ["Shared"]);
    assert!(child.output_file_system().is_none());
    assert!(child.records().read().is_empty());
    assert_eq!(child.options().output.filename, "[name].worker.js");
    assert_eq!(compiler.options().output.filename, "[name].js");
}

#[tokio::test]
async fn test_run_as_child_merges_into_parent() {
    let Fixture { compiler, .. } = with_entry(fixture());
    let parent = compiler.compile().await.unwrap();

    let overrides = OutputOverrides {
        filename: Some("[name].worker.js".into()),
        ..OutputOverrides::default()
    };
    let mut child = parent.create_child_compiler("worker", &overrides);
    child.apply(&EntryPlugin::new(Path::new("/app"), "./worker", "worker"));

    let output = child.run_as_child().await.unwrap();
    assert_eq!(output.entries.len(), 1);
    assert_eq!(output.entries[0].name.as_deref(), Some("worker"));
    assert_eq!(output.compilation.name(), Some("worker"));

    let children = parent.children();
    assert_eq!(children.len(), 1);
    assert!(Arc::ptr_eq(&children[0], &output.compilation));
    assert!(parent.asset("worker.worker.js").is_some());
    assert!(parent.asset("main.js").is_some());
    // the parent's entry plugin did not run in the child
    assert!(output.compilation.asset("main.js").is_none());
}

#[tokio::test]
async fn test_child_compiler_uses_parent_output_path() {
    let Fixture { mut compiler, .. } = with_entry(fixture());
    assert_eq!(compiler.options().output.path, Path::new("dist"));
    compiler.set_output_path("/srv/www");
    let compilation = compiler.compile().await.unwrap();

    let overrides = OutputOverrides {
        path: Some("/elsewhere".into()),
        ..OutputOverrides::default()
    };
    let child = compiler.create_child_compiler(&compilation, "worker", &overrides);
    assert_eq!(child.output_path(), Path::new("/srv/www"));
    assert_eq!(child.options().output.path, Path::new("/elsewhere"));

    let from_compilation = compilation.create_child_compiler("worker", &overrides);
    assert_eq!(from_compilation.output_path(), Path::new("/srv/www"));
}

#[tokio::test]
async fn test_run_as_child_requires_parent() {
    let Fixture { compiler, .. } = fixture();
    let err = compiler.run_as_child().await.unwrap_err();
    assert!(matches!(err, BuildError::NotAChild));
}
