//! Id assignment, chunk formation and rendering.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Chunk, Compilation, Module, RawSource, SealedGraph, SealedModule};
use crate::records::Records;

const MODULE_SECTION: &str = "modules";
const CHUNK_SECTION: &str = "chunks";
const NEXT_MODULE_ID: &str = "nextFreeModuleId";
const NEXT_CHUNK_ID: &str = "nextFreeChunkId";

/// Length of the hex compilation hash.
const HASH_LEN: usize = 20;

impl Compilation {
    pub(super) fn seal_graph(
        &self,
        entries: Vec<(String, String)>,
        modules: BTreeMap<String, Module>,
    ) -> SealedGraph {
        let mut entry_points: Vec<(String, String)> = Vec::new();
        for (name, identifier) in entries {
            if !entry_points.iter().any(|(n, _)| *n == name) {
                entry_points.push((name, identifier));
            }
        }
        entry_points.sort_by(|a, b| a.0.cmp(&b.0));

        let (module_ids, chunk_ids) = {
            let mut records = self.records.write();
            let module_ids = assign_ids(
                &mut records,
                MODULE_SECTION,
                "byIdentifier",
                NEXT_MODULE_ID,
                modules.keys().map(String::as_str),
            );
            let chunk_ids = assign_ids(
                &mut records,
                CHUNK_SECTION,
                "byName",
                NEXT_CHUNK_ID,
                entry_points.iter().map(|(name, _)| name.as_str()),
            );
            (module_ids, chunk_ids)
        };

        let mut membership: FxHashMap<String, Vec<u64>> = FxHashMap::default();
        let mut chunks = Vec::with_capacity(entry_points.len());

        for (name, entry) in &entry_points {
            let Some(&chunk_id) = chunk_ids.get(name.as_str()) else {
                continue;
            };
            let mut members = reachable(entry, &modules);
            members.sort_by_key(|identifier| module_ids.get(identifier.as_str()).copied());
            for identifier in &members {
                membership.entry(identifier.clone()).or_default().push(chunk_id);
            }

            let Some(&entry_id) = module_ids.get(entry.as_str()) else {
                continue;
            };
            let mut chunk = Chunk {
                id: chunk_id,
                name: Some(name.clone()),
                entry: true,
                modules: members,
                files: Vec::new(),
                parents: Vec::new(),
                rendered: false,
            };
            self.render_chunk(&mut chunk, entry_id, &modules, &module_ids);
            chunks.push(chunk);
        }

        let mut sealed_modules: Vec<SealedModule> = modules
            .into_iter()
            .filter_map(|(identifier, module)| {
                let id = *module_ids.get(identifier.as_str())?;
                let chunks = membership.remove(identifier.as_str()).unwrap_or_default();
                Some(SealedModule { id, module, chunks })
            })
            .collect();
        sealed_modules.sort_by_key(|m| m.id);

        SealedGraph {
            modules: sealed_modules,
            chunks,
            hash: self.output_hash(),
        }
    }

    fn render_chunk(
        &self,
        chunk: &mut Chunk,
        entry_id: u64,
        modules: &BTreeMap<String, Module>,
        ids: &FxHashMap<String, u64>,
    ) {
        let members: Vec<(u64, &Module)> = chunk
            .modules
            .iter()
            .filter_map(|identifier| {
                let module = modules.get(identifier)?;
                Some((*ids.get(identifier)?, module))
            })
            .collect();

        let templates = self.templates();
        let source = templates.main.render(
            chunk,
            entry_id,
            &members,
            ids,
            &self.options().output.public_path,
            &templates.module,
        );

        let file = output_filename(&self.options().output.filename, chunk);
        let (asset, reused) = self.intern_asset(&file, RawSource::from(source));
        chunk.rendered = !reused;
        self.insert_asset(file.clone(), asset);
        chunk.files.push(file);
    }

    fn output_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, asset) in self.assets() {
            hasher.update(name.as_bytes());
            hasher.update(asset.hash().as_bytes());
        }
        let mut hex = hasher.finalize().to_hex().to_string();
        hex.truncate(HASH_LEN);
        hex
    }
}

/// Ids for `keys`, keeping every id already present in `records` and handing
/// out fresh ones from the stored counter.
fn assign_ids<'a>(
    records: &mut Records,
    section: &str,
    table: &str,
    counter: &str,
    keys: impl Iterator<Item = &'a str>,
) -> FxHashMap<String, u64> {
    let keys: Vec<&str> = keys.collect();
    let mut ids = FxHashMap::default();
    let mut used = FxHashSet::default();

    for key in &keys {
        if let Some(id) = records.id_in(section, table, key)
            && used.insert(id)
        {
            ids.insert((*key).to_owned(), id);
        }
    }

    // `None` once the counter cannot advance past `u64::MAX`.
    let mut next = used
        .iter()
        .max()
        .map_or(Some(0), |max| max.checked_add(1))
        .map(|floor| records.counter(counter).max(floor));
    for key in &keys {
        if ids.contains_key(*key) {
            continue;
        }
        let id = fresh_id(&used, &mut next);
        used.insert(id);
        ids.insert((*key).to_owned(), id);
        records.set_id_in(section, table, key, id);
    }

    records.set_counter(counter, next.unwrap_or(u64::MAX));
    ids
}

/// The next unused id from the counter, or the lowest unused id once the
/// counter is exhausted.
fn fresh_id(used: &FxHashSet<u64>, next: &mut Option<u64>) -> u64 {
    while let Some(candidate) = *next {
        *next = candidate.checked_add(1);
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    (0..=u64::MAX)
        .find(|id| !used.contains(id))
        .unwrap_or_default()
}

/// Identifiers of every module reachable from `entry`, entry first.
fn reachable(entry: &str, modules: &BTreeMap<String, Module>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([entry]);

    while let Some(identifier) = queue.pop_front() {
        if !seen.insert(identifier) {
            continue;
        }
        let Some(module) = modules.get(identifier) else {
            continue;
        };
        order.push(identifier.to_owned());
        queue.extend(module.linked_modules());
    }
    order
}

fn output_filename(template: &str, chunk: &Chunk) -> String {
    let name = chunk
        .name
        .clone()
        .unwrap_or_else(|| chunk.id.to_string());
    template
        .replace("[name]", &name)
        .replace("[id]", &chunk.id.to_string())
}
