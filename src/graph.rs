//! In-memory relation graph between tasks.
//!
//! Edges are held twice, once keyed by source and once by target, so that
//! lookups in either direction never scan the whole edge set. Relation types
//! configured as symmetric are mirrored on insert and removal.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, BLOCKED_BY};

/// A directed relation. Field order gives the persisted sort: (source, target, type).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: TaskId,
    pub target: TaskId,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Edge {
    pub fn new(kind: impl Into<String>, source: TaskId, target: TaskId) -> Self {
        Self {
            source,
            target,
            kind: kind.into(),
        }
    }

    pub fn mirror(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            kind: self.kind.clone(),
        }
    }

    /// The endpoint that is not `id` (the source for self-loops)
    pub fn other(&self, id: TaskId) -> TaskId {
        if self.source == id {
            self.target
        } else {
            self.source
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    symmetric: BTreeSet<String>,
    outgoing: HashMap<TaskId, BTreeSet<Edge>>,
    incoming: HashMap<TaskId, BTreeSet<Edge>>,
}

impl RelationGraph {
    pub fn new<I, S>(symmetric: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symmetric: symmetric.into_iter().map(Into::into).collect(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    /// Build a graph from every task's stored outgoing relations
    pub fn from_tasks<'a, I>(symmetric: &BTreeSet<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut graph = Self::new(symmetric.iter().cloned());
        for task in tasks {
            for relation in &task.relations {
                graph.add_edge(Edge::new(relation.kind.clone(), task.id, relation.target));
            }
        }
        graph
    }

    pub fn symmetric_types(&self) -> &BTreeSet<String> {
        &self.symmetric
    }

    pub fn is_symmetric(&self, kind: &str) -> bool {
        self.symmetric.contains(kind)
    }

    /// Add an edge, plus its mirror for symmetric types. Returns true if anything was new.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let mirror = self.is_symmetric(&edge.kind).then(|| edge.mirror());
        let mut added = self.insert_directed(edge);
        if let Some(mirror) = mirror {
            added |= self.insert_directed(mirror);
        }
        added
    }

    /// Remove an edge, plus its mirror for symmetric types. Returns true if anything was removed.
    pub fn remove_edge(&mut self, edge: &Edge) -> bool {
        let mut removed = self.remove_directed(edge);
        if self.is_symmetric(&edge.kind) {
            removed |= self.remove_directed(&edge.mirror());
        }
        removed
    }

    /// Insert exactly one direction, without mirroring
    pub(crate) fn insert_directed(&mut self, edge: Edge) -> bool {
        self.incoming
            .entry(edge.target)
            .or_default()
            .insert(edge.clone());
        self.outgoing.entry(edge.source).or_default().insert(edge)
    }

    fn remove_directed(&mut self, edge: &Edge) -> bool {
        let removed = remove_from(&mut self.outgoing, edge.source, edge);
        remove_from(&mut self.incoming, edge.target, edge);
        removed
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.outgoing
            .get(&edge.source)
            .map(|edges| edges.contains(edge))
            .unwrap_or(false)
    }

    pub fn edges_from(&self, id: TaskId) -> Vec<Edge> {
        self.outgoing
            .get(&id)
            .map(|edges| edges.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn edges_to(&self, id: TaskId) -> Vec<Edge> {
        self.incoming
            .get(&id)
            .map(|edges| edges.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Union of edges from and to `id`, de-duplicated and sorted
    pub fn all_edges_involving(&self, id: TaskId) -> Vec<Edge> {
        let mut edges: BTreeSet<Edge> = BTreeSet::new();
        if let Some(out) = self.outgoing.get(&id) {
            edges.extend(out.iter().cloned());
        }
        if let Some(inc) = self.incoming.get(&id) {
            edges.extend(inc.iter().cloned());
        }
        edges.into_iter().collect()
    }

    /// Targets of the `blocked_by` edges sourced at `id`
    pub fn blockers_of(&self, id: TaskId) -> Vec<TaskId> {
        self.outgoing
            .get(&id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|edge| edge.kind == BLOCKED_BY)
                    .map(|edge| edge.target)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every edge touching `id`, in both directions. Returns the removed edges.
    pub fn remove_all_for(&mut self, id: TaskId) -> Vec<Edge> {
        let edges = self.all_edges_involving(id);
        for edge in &edges {
            self.remove_directed(edge);
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        edges
    }

    /// Every directed edge, sorted by (source, target, type)
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .outgoing
            .values()
            .flat_map(|edges| edges.iter().cloned())
            .collect();
        edges.sort();
        edges
    }

    pub fn len(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_from(map: &mut HashMap<TaskId, BTreeSet<Edge>>, key: TaskId, edge: &Edge) -> bool {
    let Some(edges) = map.get_mut(&key) else {
        return false;
    };
    let removed = edges.remove(edge);
    if edges.is_empty() {
        map.remove(&key);
    }
    removed
}
