//! Built-in plugins.
//!
//! A plugin is applied once to a [`Compiler`] and registers whatever hook or
//! parser handlers it needs.

mod entry;
mod node_stuff;

pub use entry::EntryPlugin;
pub use node_stuff::NodeStuffPlugin;

use crate::compiler::Compiler;

pub trait Plugin {
    /// Name recorded on every handler the plugin registers.
    fn name(&self) -> &str;

    fn apply(&self, compiler: &mut Compiler);
}
