use std::path::{Path, PathBuf};

use super::Plugin;
use crate::compilation::json_str;
use crate::compiler::Compiler;
use crate::config::{NodeOptions, NodeShim, relative_to};
use crate::parser::{Dependency, Expression, Parser, ParserState};

const MOCK_FILENAME: &str = "/index.js";
const MOCK_DIRNAME: &str = "/";

/// Shims Node.js free variables for code that runs outside Node.
///
/// | expression      | rewritten to                               |
/// |-----------------|--------------------------------------------|
/// | `__filename`    | `var __filename = "..."` per [`NodeShim`]  |
/// | `__dirname`     | `var __dirname = "..."` per [`NodeShim`]   |
/// | `require.main`  | `require.cache[0]`                         |
///
/// `module.exports`, `module.loaded` and `module.id` are claimed and left
/// as they are.
#[derive(Debug, Clone)]
pub struct NodeStuffPlugin {
    context: PathBuf,
    options: NodeOptions,
}

impl NodeStuffPlugin {
    pub fn new(context: &Path, options: &NodeOptions) -> Self {
        Self {
            context: context.to_path_buf(),
            options: *options,
        }
    }
}

impl Plugin for NodeStuffPlugin {
    fn name(&self) -> &str {
        "NodeStuffPlugin"
    }

    fn apply(&self, compiler: &mut Compiler) {
        let parser = compiler.parser();

        shim(
            parser,
            self.name(),
            "__filename",
            self.options.filename,
            &self.context,
            |state| state.resource().to_path_buf(),
            MOCK_FILENAME,
        );
        shim(
            parser,
            self.name(),
            "__dirname",
            self.options.dirname,
            &self.context,
            |state| state.context().to_path_buf(),
            MOCK_DIRNAME,
        );

        parser.on_expression("require.main", self.name(), |state, expr| {
            state.add_dependency(Dependency::Const {
                expression: "require.cache[0]".to_owned(),
                range: expr.range.clone(),
            });
            true
        });

        for ignored in ["module.exports", "module.loaded", "module.id"] {
            parser.on_expression(ignored, self.name(), |_, _| true);
        }
    }
}

fn shim(
    parser: &Parser,
    plugin: &str,
    variable: &'static str,
    mode: NodeShim,
    context: &Path,
    path_of: fn(&ParserState) -> PathBuf,
    mock: &'static str,
) {
    let context = context.to_path_buf();
    let handler = move |state: &mut ParserState, _: &Expression| {
        let value = match mode {
            NodeShim::Off => return false,
            NodeShim::Mock => mock.to_owned(),
            NodeShim::Relative => relative_to(&context, &path_of(state)),
        };
        state.add_variable(variable, json_str(&value));
        true
    };
    parser.on_expression(variable, plugin, handler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::parser::Variable;

    fn parse(node: NodeOptions, source: &str) -> (Vec<Dependency>, Vec<Variable>) {
        let mut compiler = Compiler::new(CompilerOptions::default());
        compiler.apply(&NodeStuffPlugin::new(Path::new("/app"), &node));

        let mut state = ParserState::new("/app/lib/util.js");
        compiler.parser().parse(source, &mut state);
        state.finish()
    }

    #[test]
    fn test_mock_shims() {
        let (deps, vars) = parse(
            NodeOptions::default(),
            "log(__filename, __dirname, __dirname);",
        );
        assert!(deps.is_empty());
        assert_eq!(
            vars,
            [
                Variable { name: "__dirname".into(), expression: "\"/\"".into() },
                Variable { name: "__filename".into(), expression: "\"/index.js\"".into() },
            ]
        );
    }

    #[test]
    fn test_relative_shims() {
        let node = NodeOptions {
            filename: NodeShim::Relative,
            dirname: NodeShim::Relative,
        };
        let (_, vars) = parse(node, "log(__filename + __dirname);");
        let values: Vec<_> = vars.iter().map(|v| v.expression.as_str()).collect();
        assert_eq!(values, ["\"lib\"", "\"lib/util.js\""]);
    }

    #[test]
    fn test_off_leaves_source_alone() {
        let node = NodeOptions {
            filename: NodeShim::Off,
            dirname: NodeShim::Off,
        };
        let (deps, vars) = parse(node, "log(__filename, __dirname);");
        assert!(deps.is_empty());
        assert!(vars.is_empty());
    }

    #[test]
    fn test_require_main_is_rewritten() {
        let source = "if (require.main === module) run();";
        let (deps, _) = parse(NodeOptions::default(), source);
        assert_eq!(
            deps,
            [Dependency::Const {
                expression: "require.cache[0]".into(),
                range: 4..16,
            }]
        );
    }
}
