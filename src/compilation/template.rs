//! Runtime templates turning a chunk into a self-contained script.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::{Chunk, Link, Module};
use crate::parser::Dependency;

/// Templates shared by a compiler and its children.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub main: MainTemplate,
    pub module: ModuleTemplate,
}

/// Renders an entry chunk: bootstrap runtime plus the module table.
#[derive(Debug, Clone, Default)]
pub struct MainTemplate;

impl MainTemplate {
    pub fn render(
        &self,
        chunk: &Chunk,
        entry: u64,
        modules: &[(u64, &Module)],
        ids: &FxHashMap<String, u64>,
        public_path: &str,
        module_template: &ModuleTemplate,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "/* chunk {} */", chunk.id);
        out.push_str(BOOTSTRAP_HEAD);
        let _ = writeln!(out, "\trequire.p = {};", json_str(public_path));
        out.push_str(BOOTSTRAP_CONTEXT);
        let _ = writeln!(out, "\treturn require({entry});");
        out.push_str("})({\n");

        let rendered: Vec<_> = modules
            .iter()
            .map(|(id, module)| module_template.render(*id, module, ids))
            .collect();
        out.push_str(&rendered.join(",\n"));
        out.push_str("\n});\n");
        out
    }
}

const BOOTSTRAP_HEAD: &str = "(function(modules) {
\tvar installedModules = {};
\tfunction require(moduleId) {
\t\tif (installedModules[moduleId]) return installedModules[moduleId].exports;
\t\tvar module = installedModules[moduleId] = { exports: {}, id: moduleId, loaded: false };
\t\tmodules[moduleId].call(module.exports, module, module.exports, require);
\t\tmodule.loaded = true;
\t\treturn module.exports;
\t}
\trequire.m = modules;
\trequire.cache = installedModules;
";

const BOOTSTRAP_CONTEXT: &str = "\trequire.ctx = function(map) {
\t\tfunction context(key) {
\t\t\tif (!(key in map)) throw new Error(\"Cannot find module '\" + key + \"'\");
\t\t\treturn require(map[key]);
\t\t}
\t\tcontext.keys = function() { return Object.keys(map); };
\t\treturn context;
\t};
";

/// Renders one module as an entry of the module table.
#[derive(Debug, Clone, Default)]
pub struct ModuleTemplate;

impl ModuleTemplate {
    pub fn render(&self, id: u64, module: &Module, ids: &FxHashMap<String, u64>) -> String {
        format!(
            "/* {id} */ {id}: function(module, exports, require) {{\n{}\n}}",
            render_body(module, ids)
        )
    }
}

/// Module source with every dependency range replaced.
pub fn render_body(module: &Module, ids: &FxHashMap<String, u64>) -> String {
    if let Some(error) = module.error() {
        return format!(
            "throw new Error({});",
            json_str(&format!("Module build failed: {error}"))
        );
    }

    let source = module.source();
    let mut out = String::with_capacity(source.len());
    for var in module.variables() {
        let _ = writeln!(out, "var {} = {};", var.name, var.expression);
    }

    let mut cursor = 0;
    for dep in module.dependencies() {
        let range = dep.range();
        let in_bounds = cursor <= range.start
            && range.end <= source.len()
            && source.is_char_boundary(range.start)
            && source.is_char_boundary(range.end);
        if !in_bounds {
            continue;
        }

        let replacement = match dep {
            Dependency::Require { request, .. } => match module.resolved(request) {
                Some(Link::Module(target)) => ids
                    .get(target)
                    .map_or_else(|| missing(request), |id| format!("require({id})")),
                _ => missing(request),
            },
            Dependency::Context { request, .. } => match module.resolved(request) {
                Some(Link::Context(map)) => format!("require.ctx({})", context_map(map, ids)),
                _ => missing(request),
            },
            Dependency::Const { expression, .. } => expression.clone(),
        };

        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}

fn missing(request: &str) -> String {
    format!(
        "(function() {{ var e = new Error({}); e.code = 'MODULE_NOT_FOUND'; throw e; }}())",
        json_str(&format!("Cannot find module \"{request}\""))
    )
}

fn context_map(map: &BTreeMap<String, String>, ids: &FxHashMap<String, u64>) -> String {
    let object: Map<String, Value> = map
        .iter()
        .filter_map(|(key, target)| ids.get(target).map(|id| (key.clone(), Value::from(*id))))
        .collect();
    Value::Object(object).to_string()
}

/// JSON string literal, usable as a JavaScript string literal.
pub(crate) fn json_str(text: &str) -> String {
    Value::from(text).to_string()
}
