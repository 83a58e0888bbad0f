//! Derived index over all task records.
//!
//! The index keeps every task's metadata (no descriptions) plus the relation
//! graph, persisted as one JSON file next to the records. It is never the
//! authority: whenever the file is missing, unreadable, or was written for a
//! different workspace fingerprint, it is thrown away and rebuilt from the
//! records.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{Edge, RelationGraph};
use crate::selector;
use crate::storage::{self, Storage};
use crate::task::{IndexEntry, Priority, Status, Task, TaskId};

/// Name of the index file inside the task directory
pub const INDEX_FILE: &str = "index.json";

const INDEX_SCHEMA_VERSION: &str = "taskline.index.v1";

/// Why `load()` fell back to a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    Missing,
    Corrupt,
    SchemaMismatch,
    FingerprintMismatch,
    RelationConfigChanged,
}

/// How `load()` obtained the in-memory index, reported in JSON output as
/// `{"state": "loaded"}` or `{"state": "rebuilt", "reason": "..."}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CacheStatus {
    Loaded,
    Rebuilt(RebuildReason),
}

/// Which part of the parent/subtask tree a filter covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentScope {
    #[default]
    Any,
    TopLevel,
    ChildrenOf(TaskId),
}

impl From<Option<TaskId>> for ParentScope {
    /// `None` is no filter, `Some(0)` top-level only, `Some(n)` subtasks of `n`.
    fn from(value: Option<TaskId>) -> Self {
        match value {
            None => ParentScope::Any,
            Some(0) => ParentScope::TopLevel,
            Some(id) => ParentScope::ChildrenOf(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub kind: Option<String>,
    pub parent: ParentScope,
}

impl TaskFilter {
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        if self.status.is_some_and(|status| entry.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| entry.priority != priority) {
            return false;
        }
        if let Some(kind) = self.kind.as_deref() {
            if entry.kind != kind {
                return false;
            }
        }
        match self.parent {
            ParentScope::Any => true,
            ParentScope::TopLevel => entry.parent_id.is_none(),
            ParentScope::ChildrenOf(parent) => entry.parent_id == Some(parent),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    schema_version: String,
    fingerprint: String,
    #[serde(default)]
    symmetric: Vec<String>,
    entries: Vec<IndexEntry>,
    edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
pub struct IndexCache {
    storage: Storage,
    path: PathBuf,
    fingerprint: String,
    entries: BTreeMap<TaskId, IndexEntry>,
    graph: RelationGraph,
}

impl IndexCache {
    /// Create an empty cache bound to a store. Call [`IndexCache::load`] to populate it.
    pub fn open<I, S>(storage: Storage, symmetric: I, fingerprint: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = storage.dir().join(INDEX_FILE);
        Self {
            storage,
            path,
            fingerprint: fingerprint.into(),
            entries: BTreeMap::new(),
            graph: RelationGraph::new(symmetric),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load the persisted index, rebuilding from records when it cannot be trusted
    pub fn load(&mut self) -> Result<CacheStatus> {
        let reason = match self.read_file() {
            Ok(file) => match self.check(&file) {
                None => {
                    self.install(file);
                    debug!(entries = self.entries.len(), "loaded task index");
                    return Ok(CacheStatus::Loaded);
                }
                Some(reason) => reason,
            },
            Err(reason) => reason,
        };

        debug!(?reason, "rebuilding task index");
        self.rebuild()?;
        if let Err(err) = self.save() {
            warn!("Failed to persist rebuilt index {}: {}", self.path.display(), err);
        }
        Ok(CacheStatus::Rebuilt(reason))
    }

    fn read_file(&self) -> std::result::Result<IndexFile, RebuildReason> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RebuildReason::Missing);
            }
            Err(err) => {
                warn!("Unreadable index {}: {}", self.path.display(), err);
                return Err(RebuildReason::Corrupt);
            }
        };
        serde_json::from_str(&content).map_err(|err| {
            warn!("Corrupt index {}: {}", self.path.display(), err);
            RebuildReason::Corrupt
        })
    }

    fn check(&self, file: &IndexFile) -> Option<RebuildReason> {
        if file.schema_version != INDEX_SCHEMA_VERSION {
            return Some(RebuildReason::SchemaMismatch);
        }
        if file.fingerprint != self.fingerprint {
            return Some(RebuildReason::FingerprintMismatch);
        }
        let persisted: BTreeSet<&str> = file.symmetric.iter().map(String::as_str).collect();
        let current: BTreeSet<&str> = self
            .graph
            .symmetric_types()
            .iter()
            .map(String::as_str)
            .collect();
        if persisted != current {
            return Some(RebuildReason::RelationConfigChanged);
        }
        None
    }

    fn install(&mut self, file: IndexFile) {
        self.entries = file
            .entries
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();
        let mut graph = RelationGraph::new(self.graph.symmetric_types().iter().cloned());
        for edge in file.edges {
            graph.insert_directed(edge);
        }
        self.graph = graph;
    }

    /// Persist the full derived state atomically
    pub fn save(&self) -> Result<()> {
        let file = IndexFile {
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            fingerprint: self.fingerprint.clone(),
            symmetric: self.graph.symmetric_types().iter().cloned().collect(),
            entries: self.entries.values().cloned().collect(),
            edges: self.graph.edges(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        storage::write_atomic(&self.path, json.as_bytes())?;
        debug!(entries = file.entries.len(), edges = file.edges.len(), "saved task index");
        Ok(())
    }

    /// Drop the persisted index and resync memory from the records, best effort.
    ///
    /// Used after a partially applied write, when neither copy can be trusted.
    pub fn invalidate(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove index {}: {}", self.path.display(), err),
        }
        if let Err(err) = self.rebuild() {
            warn!("Failed to rebuild index from {}: {}", self.storage.dir().display(), err);
        }
    }

    /// Replace the in-memory state with a full scan of the records
    pub fn rebuild(&mut self) -> Result<()> {
        let mut tasks = self.storage.load_all()?;
        let known: BTreeSet<TaskId> = tasks.iter().map(|task| task.id).collect();

        // Records are left as written; only the graph skips dangling targets.
        for task in &mut tasks {
            let id = task.id;
            task.relations.retain(|relation| {
                let live = known.contains(&relation.target);
                if !live {
                    warn!(
                        "Dropping {} relation from task {} to missing task {}",
                        relation.kind, id, relation.target
                    );
                }
                live
            });
        }

        self.graph = RelationGraph::from_tasks(self.graph.symmetric_types(), &tasks);
        self.entries = tasks.iter().map(|task| (task.id, task.entry())).collect();
        Ok(())
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Full record, including description, read from the store
    pub fn get(&self, id: TaskId) -> Result<Task> {
        if !self.entries.contains_key(&id) {
            return Err(Error::NotFound(id));
        }
        self.storage.load(id)
    }

    pub fn get_entry(&self, id: TaskId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn set(&mut self, task: &Task) {
        self.entries.insert(task.id, task.entry());
    }

    /// Forget a task and every edge touching it
    pub fn delete(&mut self, id: TaskId) -> Option<IndexEntry> {
        self.graph.remove_all_for(id);
        self.entries.remove(&id)
    }

    /// Every entry, sorted by ID
    pub fn all(&self) -> Vec<&IndexEntry> {
        self.entries.values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching every present predicate, sorted by ID
    pub fn filter(&self, filter: &TaskFilter) -> Vec<&IndexEntry> {
        self.entries
            .values()
            .filter(|entry| filter.matches(entry))
            .collect()
    }

    pub fn next_todo(&self) -> Option<&IndexEntry> {
        selector::next_todo(self)
    }

    /// Next ID to assign: one past the highest live or ever-assigned ID
    pub fn next_id(&self) -> Result<TaskId> {
        let max_live = self.entries.keys().next_back().copied().unwrap_or(0);
        let high_water = self.storage.high_water()?;
        Ok(max_live.max(high_water) + 1)
    }

    // =========================================================================
    // Subtasks
    // =========================================================================

    pub fn get_subtasks(&self, parent_id: TaskId) -> Vec<&IndexEntry> {
        self.entries
            .values()
            .filter(|entry| entry.parent_id == Some(parent_id))
            .collect()
    }

    pub fn has_subtasks(&self, id: TaskId) -> bool {
        self.entries
            .values()
            .any(|entry| entry.parent_id == Some(id))
    }

    /// (total, done) counts over the direct subtasks of `parent_id`
    pub fn subtask_counts(&self, parent_id: TaskId) -> (usize, usize) {
        self.get_subtasks(parent_id)
            .iter()
            .fold((0, 0), |(total, done), entry| {
                (total + 1, done + usize::from(entry.status == Status::Done))
            })
    }

    // =========================================================================
    // Relations
    // =========================================================================

    pub fn get_relations_for_task(&self, id: TaskId) -> Vec<Edge> {
        self.graph.all_edges_involving(id)
    }

    /// Every `blocked_by` target of `id`, done or not
    pub fn get_blockers(&self, id: TaskId) -> Vec<TaskId> {
        self.graph.blockers_of(id)
    }

    /// Blockers of `id` that are not done yet
    pub fn open_blockers(&self, id: TaskId) -> Vec<TaskId> {
        self.graph
            .blockers_of(id)
            .into_iter()
            .filter(|blocker| {
                self.entries
                    .get(blocker)
                    .map(|entry| entry.status != Status::Done)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn is_blocked(&self, id: TaskId) -> bool {
        !self.open_blockers(id).is_empty()
    }

    pub fn add_relation(&mut self, source: TaskId, kind: &str, target: TaskId) -> bool {
        self.graph.add_edge(Edge::new(kind, source, target))
    }

    pub fn remove_relation(&mut self, source: TaskId, kind: &str, target: TaskId) -> bool {
        self.graph.remove_edge(&Edge::new(kind, source, target))
    }

    pub fn remove_all_relations_for_task(&mut self, id: TaskId) -> Vec<Edge> {
        self.graph.remove_all_for(id)
    }

    pub fn is_symmetric(&self, kind: &str) -> bool {
        self.graph.is_symmetric(kind)
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.graph.edges()
    }
}
