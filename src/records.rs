//! Cross-build records document.
//!
//! Records are an opaque JSON object persisted between builds. The compiler
//! only guarantees read-before-build and write-after-success; the schema is
//! owned by whoever stores entries. The seal step keeps module and chunk ids
//! stable through it:
//!
//! ```json
//! {
//!   "modules": { "byIdentifier": { "/src/index.js": 0 } },
//!   "chunks": { "byName": { "main": 0 } },
//!   "nextFreeModuleId": 1,
//!   "nextFreeChunkId": 1
//! }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Records shared between a compiler and the compilations it creates.
pub type SharedRecords = Arc<RwLock<Records>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Records(Map<String, Value>);

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a records document. Anything but a JSON object is rejected.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Indented JSON, two spaces per level.
    pub fn to_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Look up `section.table[key]` as an unsigned id.
    pub fn id_in(&self, section: &str, table: &str, key: &str) -> Option<u64> {
        self.0
            .get(section)?
            .get(table)?
            .get(key)?
            .as_u64()
    }

    /// Store `section.table[key] = id`, creating intermediate objects.
    ///
    /// A non-object value in the way is replaced.
    pub fn set_id_in(&mut self, section: &str, table: &str, key: &str, id: u64) {
        let section = object_entry(&mut self.0, section);
        let table = object_entry(section, table);
        table.insert(key.to_owned(), Value::from(id));
    }

    /// Unsigned counter at the top level, or 0.
    pub fn counter(&self, key: &str) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn set_counter(&mut self, key: &str, value: u64) {
        self.0.insert(key.to_owned(), Value::from(value));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn object_entry<'m>(map: &'m mut Map<String, Value>, key: &str) -> &'m mut Map<String, Value> {
    let slot = map
        .entry(key.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just made an object"),
    }
}
