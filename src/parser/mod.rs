//! Source scanner with named expression extension points.
//!
//! The parser does not build an AST. It finds the constructs the pipeline
//! cares about with a couple of regular expressions:
//!
//! - `require("x")` / `require('x')` calls become [`Dependency::Require`]
//! - `require.context("dir")` calls become [`Dependency::Context`]
//! - free occurrences of registered expressions (`__dirname`,
//!   `require.main`, ...) are offered to plugin handlers in order until one
//!   of them claims the occurrence by returning `true`

mod state;

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;

use crate::hooks::Tap;

pub use state::{Dependency, ParserState, Variable};

/// `require("x")` not preceded by `.` or an identifier character.
static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^.A-Za-z0-9_$])(require[ \t]*\([ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)')[ \t]*\))"#,
    )
    .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// `require.context("dir")` not preceded by `.` or an identifier character.
static CONTEXT_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^.A-Za-z0-9_$])(require[ \t]*\.[ \t]*context[ \t]*\([ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)')[ \t]*\))"#,
    )
    .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// A free occurrence of a registered expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub name: String,
    pub range: Range<usize>,
}

type ExpressionHandler = dyn Fn(&mut ParserState, &Expression) -> bool + Send + Sync;

/// Shared parser. Handlers may be registered through a shared reference,
/// so one instance serves a compiler and all of its children.
#[derive(Default)]
pub struct Parser {
    expressions: RwLock<BTreeMap<String, Vec<Tap<ExpressionHandler>>>>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for free occurrences of `expression`.
    pub fn on_expression<F>(&self, expression: &str, plugin: &str, handler: F)
    where
        F: Fn(&mut ParserState, &Expression) -> bool + Send + Sync + 'static,
    {
        self.expressions
            .write()
            .entry(expression.to_owned())
            .or_default()
            .push(Tap::new(plugin, Arc::new(handler)));
    }

    /// Registered expression names, sorted.
    pub fn expressions(&self) -> Vec<String> {
        self.expressions.read().keys().cloned().collect()
    }

    /// Scan `source`, recording dependencies and variables into `state`.
    pub fn parse(&self, source: &str, state: &mut ParserState) {
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for caps in CONTEXT_CALL.captures_iter(source) {
            let (Some(call), Some(request)) = (caps.get(1), caps.get(2).or(caps.get(3))) else {
                continue;
            };
            claimed.push(call.range());
            state.add_dependency(Dependency::Context {
                request: request.as_str().to_owned(),
                range: call.range(),
            });
        }

        for caps in REQUIRE_CALL.captures_iter(source) {
            let (Some(call), Some(request)) = (caps.get(1), caps.get(2).or(caps.get(3))) else {
                continue;
            };
            claimed.push(call.range());
            state.add_dependency(Dependency::Require {
                request: request.as_str().to_owned(),
                range: call.range(),
            });
        }

        // Snapshot so handlers may register further handlers.
        let expressions: Vec<_> = self
            .expressions
            .read()
            .iter()
            .map(|(name, taps)| (name.clone(), taps.clone()))
            .collect();

        for (name, taps) in expressions {
            for range in free_occurrences(source, &name) {
                if claimed.iter().any(|c| c.start < range.end && range.start < c.end) {
                    continue;
                }
                let expr = Expression {
                    name: name.clone(),
                    range,
                };
                for tap in &taps {
                    if (tap.handler())(state, &expr) {
                        break;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("expressions", &self.expressions())
            .finish()
    }
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Occurrences of `name` not glued to a surrounding identifier or member
/// access.
fn free_occurrences(source: &str, name: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    source
        .match_indices(name)
        .map(|(start, _)| start..start + name.len())
        .filter(|range| {
            let before = range.start.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(range.end).copied();
            !before.is_some_and(|b| b == b'.' || is_ident_byte(b))
                && !after.is_some_and(is_ident_byte)
        })
        .collect()
}
