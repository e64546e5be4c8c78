//! Breadth-first discovery of every module reachable from the entry
//!
//! Ids are handed out in discovery order: the entry is 0 and each newly
//! resolved specifier takes the next free id, which is always the current
//! length of the node list. By default nothing is deduplicated, so a module
//! reached through two different importers becomes two nodes.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use rustc_hash::FxHashMap;

use crate::{
    analyzer::{ModuleRecord, SourceAnalyzer},
    config::Config,
    error::BundleError,
    module_graph::{ModuleGraph, ModuleId, ModuleNode},
    resolver::{ModuleResolver, canonicalize_path},
};

#[derive(Debug)]
pub struct GraphBuilder<A> {
    analyzer: A,
    resolver: ModuleResolver,
    dedupe: bool,
    max_modules: usize,
}

impl<A: SourceAnalyzer> GraphBuilder<A> {
    pub fn new(analyzer: A, config: &Config) -> Self {
        Self {
            analyzer,
            resolver: ModuleResolver::new(config),
            dedupe: config.dedupe,
            max_modules: config.max_modules,
        }
    }

    /// Build the graph rooted at `entry`; any failure aborts the whole build
    pub fn build(&self, entry: &Path) -> Result<ModuleGraph, BundleError> {
        info!("Building module graph from {}", entry.display());

        let mut traversal = Traversal::default();
        let record = self.analyzer.analyze(entry)?;
        let entry_id = traversal.push(ModuleId::ENTRY, record, None);

        let mut worklist = VecDeque::from([entry_id]);
        while let Some(current) = worklist.pop_front() {
            let specifiers = std::mem::take(&mut traversal.pending[current.index()]);
            let base_dir = base_dir(&traversal.nodes[current.index()].source_path);

            for specifier in specifiers {
                if traversal.nodes[current.index()]
                    .specifier_map
                    .contains_key(&specifier)
                {
                    trace!("Specifier {specifier:?} already mapped in module {current}");
                    continue;
                }

                let path = self.resolver.resolve(&base_dir, &specifier);
                let canonical = canonicalize_path(&path);

                if self.dedupe {
                    if let Some(&existing) = traversal.visited.get(&canonical) {
                        debug!("Reusing module {existing} for {specifier:?} in module {current}");
                        traversal.nodes[current.index()]
                            .specifier_map
                            .insert(specifier, existing);
                        continue;
                    }
                } else if let Some(cycle) = traversal.cycle_through(current, &canonical) {
                    return Err(BundleError::CircularImport { cycle });
                }

                let Some(id) = traversal
                    .next_id()
                    .filter(|id| id.index() < self.max_modules)
                else {
                    return Err(BundleError::TooManyModules {
                        limit: self.max_modules,
                    });
                };

                let record = self.analyzer.analyze(&path)?;
                traversal.push(id, record, Some(current));
                debug!(
                    "Discovered module {id} at {} via {specifier:?} from module {current}",
                    path.display()
                );
                traversal.nodes[current.index()]
                    .specifier_map
                    .insert(specifier, id);
                worklist.push_back(id);
            }
        }

        let graph = ModuleGraph::from_nodes(traversal.nodes);
        if self.dedupe {
            for cycle in graph.find_cycles() {
                warn!(
                    "Circular import between modules {cycle:?}; the bundle will recurse without \
                     bound if this code path runs"
                );
            }
        }
        info!("Module graph complete: {} modules", graph.len());
        Ok(graph)
    }
}

/// State owned by one `build` call
#[derive(Default)]
struct Traversal {
    nodes: Vec<ModuleNode>,
    /// Specifiers of each node not yet resolved
    pending: Vec<Vec<String>>,
    parents: Vec<Option<ModuleId>>,
    canonical_paths: Vec<PathBuf>,
    /// Canonical path -> first node discovered there
    visited: FxHashMap<PathBuf, ModuleId>,
}

impl Traversal {
    /// `None` once the u32 id space is exhausted
    fn next_id(&self) -> Option<ModuleId> {
        u32::try_from(self.nodes.len()).ok().map(ModuleId::new)
    }

    fn push(
        &mut self,
        id: ModuleId,
        record: ModuleRecord,
        parent: Option<ModuleId>,
    ) -> ModuleId {
        let canonical = canonicalize_path(&record.source_path);
        self.visited.entry(canonical.clone()).or_insert(id);
        self.canonical_paths.push(canonical);
        self.parents.push(parent);
        self.pending.push(record.dependency_specifiers);
        self.nodes.push(ModuleNode {
            id,
            source_path: record.source_path,
            transformed_body: record.transformed_body,
            specifier_map: IndexMap::new(),
        });
        id
    }

    /// The import chain from the ancestor at `target` down to `current` and
    /// back to `target`, if `target` is `current` or one of its ancestors
    fn cycle_through(&self, current: ModuleId, target: &Path) -> Option<Vec<PathBuf>> {
        let mut chain = vec![current];
        let mut cursor = current;
        while let Some(parent) = self.parents[cursor.index()] {
            chain.push(parent);
            cursor = parent;
        }
        chain.reverse();

        let start = chain
            .iter()
            .position(|id| self.canonical_paths[id.index()] == target)?;
        let mut cycle: Vec<PathBuf> = chain[start..]
            .iter()
            .map(|id| self.nodes[id.index()].source_path.clone())
            .collect();
        cycle.push(self.nodes[chain[start].index()].source_path.clone());
        Some(cycle)
    }
}

fn base_dir(source_path: &Path) -> PathBuf {
    match source_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
