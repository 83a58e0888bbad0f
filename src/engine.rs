//! Task lifecycle engine.
//!
//! Every mutation runs in three phases: validate against the index, write the
//! affected records, then update and persist the index. Validation failures
//! touch nothing on disk. A failure after the first record write discards the
//! persisted index so the next open rebuilds it from the records.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git;
use crate::index::{CacheStatus, IndexCache, TaskFilter};
use crate::selector;
use crate::task::{IndexEntry, Priority, Relation, Status, Task, TaskId, BLOCKED_BY};

/// Input for [`TaskEngine::create`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// Falls back to `tasks.default_priority`
    pub priority: Option<String>,
    /// Falls back to `tasks.default_type`
    pub kind: Option<String>,
    pub parent_id: Option<TaskId>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Field changes for [`TaskEngine::update`]; absent fields are left alone
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub kind: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.kind.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskWithSubtasks {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RelatedTask {
    #[serde(rename = "type")]
    pub kind: String,
    pub task_id: TaskId,
}

/// Relations of one task, grouped by meaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskRelations {
    pub blocked_by: Vec<TaskId>,
    pub blocks: Vec<TaskId>,
    pub related: Vec<RelatedTask>,
}

#[derive(Debug)]
pub struct TaskEngine {
    config: Config,
    cache: IndexCache,
    cache_status: CacheStatus,
}

impl TaskEngine {
    /// Open the task directory of a project, fingerprinting it against git HEAD
    pub fn open(root: &Path, config: Config) -> Result<Self> {
        let fingerprint = git::workspace_fingerprint(root);
        let tasks_dir = root.join(&config.tasks_dir);
        Self::with_fingerprint(tasks_dir, config, fingerprint)
    }

    /// Open a task directory with an explicit workspace fingerprint
    pub fn with_fingerprint(
        tasks_dir: impl Into<PathBuf>,
        mut config: Config,
        fingerprint: impl Into<String>,
    ) -> Result<Self> {
        config.normalize();
        config.validate()?;
        let storage = crate::storage::Storage::new(tasks_dir);
        let mut cache = IndexCache::open(storage, config.relations.symmetric.clone(), fingerprint);
        let cache_status = cache.load()?;
        debug!(?cache_status, dir = %cache.storage().dir().display(), "opened task engine");
        Ok(Self {
            config,
            cache,
            cache_status,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache_status
    }

    pub fn tasks_dir(&self) -> &Path {
        self.cache.storage().dir()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn create(&mut self, new: NewTask) -> Result<Task> {
        let title = validate_title(&new.title)?;
        let priority = match new.priority.as_deref() {
            Some(value) => value.parse::<Priority>()?,
            None => self.config.default_priority()?,
        };
        let kind = match new.kind {
            Some(kind) => self.validate_type(&kind)?,
            None => self.config.tasks.default_type.clone(),
        };
        if let Some(parent_id) = new.parent_id {
            let parent = self.cache.get_entry(parent_id).ok_or_else(|| {
                Error::Validation(format!("parent task {parent_id} does not exist"))
            })?;
            if parent.parent_id.is_some() {
                return Err(Error::Validation(format!(
                    "task {parent_id} is a subtask and cannot have subtasks"
                )));
            }
        }

        let id = self.cache.next_id()?;
        let now = Utc::now();
        let task = Task {
            id,
            parent_id: new.parent_id,
            title,
            description: new.description,
            status: Status::Todo,
            priority,
            kind,
            created_at: now,
            updated_at: now,
            relations: Vec::new(),
        };

        self.persist(|cache| {
            cache.storage().save(&task)?;
            cache.storage().record_high_water(task.id)?;
            cache.set(&task);
            Ok(())
        })?;
        debug!(task_id = id, "created task");
        Ok(task)
    }

    /// Edit fields in place. A status set here skips workflow checks and parent propagation.
    pub fn update(&mut self, id: TaskId, update: TaskUpdate) -> Result<Task> {
        let mut task = self.cache.get(id)?;

        let title = update.title.as_deref().map(validate_title).transpose()?;
        let status = update
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?;
        let priority = update
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?;
        let kind = update
            .kind
            .as_deref()
            .map(|kind| self.validate_type(kind))
            .transpose()?;

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(status) = status {
            task.status = status;
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        if let Some(kind) = kind {
            task.kind = kind;
        }
        touch(&mut task);

        self.persist(|cache| {
            cache.storage().save(&task)?;
            cache.set(&task);
            Ok(())
        })?;
        Ok(task)
    }

    /// Delete a task, and with `cascade` its subtasks. Returns every deleted ID.
    pub fn delete(&mut self, id: TaskId, cascade: bool) -> Result<Vec<TaskId>> {
        if !self.cache.contains(id) {
            return Err(Error::NotFound(id));
        }
        let subtasks: Vec<TaskId> = self
            .cache
            .get_subtasks(id)
            .iter()
            .map(|entry| entry.id)
            .collect();
        if !subtasks.is_empty() && !cascade {
            return Err(Error::StateConflict(format!(
                "task {id} has {} subtask(s); delete them first or use cascade",
                subtasks.len()
            )));
        }

        let mut doomed = subtasks;
        doomed.push(id);
        let doomed_set: BTreeSet<TaskId> = doomed.iter().copied().collect();

        // Tasks outside the deleted set that store a relation into it.
        let mut neighbours = Vec::new();
        let others: BTreeSet<TaskId> = doomed
            .iter()
            .flat_map(|&gone| {
                self.cache
                    .get_relations_for_task(gone)
                    .into_iter()
                    .map(move |edge| edge.other(gone))
            })
            .filter(|other| !doomed_set.contains(other))
            .collect();
        for other in others {
            let mut task = self.cache.get(other)?;
            let mut purged = false;
            for gone in &doomed {
                purged |= task.purge_relations_to(*gone);
            }
            if purged {
                touch(&mut task);
                neighbours.push(task);
            }
        }

        self.persist(|cache| {
            for task in &neighbours {
                cache.storage().save(task)?;
                cache.set(task);
            }
            for gone in &doomed {
                cache.storage().delete(*gone)?;
                cache.delete(*gone);
            }
            Ok(())
        })?;
        debug!(task_id = id, deleted = doomed.len(), "deleted task");
        Ok(doomed)
    }

    pub fn start(&mut self, id: TaskId) -> Result<Task> {
        let mut task = self.cache.get(id)?;
        if task.status != Status::Todo {
            return Err(Error::StateConflict(format!(
                "task {id} is {}; only todo tasks can be started",
                task.status
            )));
        }
        let blockers = self.cache.open_blockers(id);
        if !blockers.is_empty() {
            return Err(Error::StateConflict(format!(
                "task {id} is blocked by {}",
                join_ids(&blockers)
            )));
        }

        task.status = Status::InProgress;
        touch(&mut task);

        let parent = match task.parent_id {
            Some(parent_id)
                if self
                    .cache
                    .get_entry(parent_id)
                    .is_some_and(|entry| entry.status == Status::Todo) =>
            {
                let mut parent = self.cache.get(parent_id)?;
                parent.status = Status::InProgress;
                touch(&mut parent);
                Some(parent)
            }
            _ => None,
        };

        self.persist(|cache| {
            cache.storage().save(&task)?;
            cache.set(&task);
            if let Some(parent) = &parent {
                cache.storage().save(parent)?;
                cache.set(parent);
            }
            Ok(())
        })?;
        if let Some(parent) = &parent {
            debug!(task_id = id, parent_id = parent.id, "started parent with subtask");
        }
        Ok(task)
    }

    pub fn complete(&mut self, id: TaskId) -> Result<Task> {
        let mut task = self.cache.get(id)?;
        if task.status != Status::InProgress {
            return Err(Error::StateConflict(format!(
                "task {id} is {}; only in_progress tasks can be completed",
                task.status
            )));
        }
        let (total, done) = self.cache.subtask_counts(id);
        if done < total {
            return Err(Error::StateConflict(format!(
                "task {id} has {} open subtask(s)",
                total - done
            )));
        }

        task.status = Status::Done;
        touch(&mut task);

        let parent = match task.parent_id {
            Some(parent_id) if self.closes_parent(parent_id, id) => {
                let mut parent = self.cache.get(parent_id)?;
                parent.status = Status::Done;
                touch(&mut parent);
                Some(parent)
            }
            _ => None,
        };

        self.persist(|cache| {
            cache.storage().save(&task)?;
            cache.set(&task);
            if let Some(parent) = &parent {
                cache.storage().save(parent)?;
                cache.set(parent);
            }
            Ok(())
        })?;
        if let Some(parent) = &parent {
            debug!(task_id = id, parent_id = parent.id, "completed parent with last subtask");
        }
        Ok(task)
    }

    /// True when `child` is the last open subtask of a parent that is not done yet
    fn closes_parent(&self, parent_id: TaskId, child: TaskId) -> bool {
        let parent_open = self
            .cache
            .get_entry(parent_id)
            .is_some_and(|entry| entry.status != Status::Done);
        parent_open
            && self
                .cache
                .get_subtasks(parent_id)
                .iter()
                .all(|entry| entry.id == child || entry.status == Status::Done)
    }

    /// Store a relation on `source`. Returns the updated source task.
    pub fn add_relation(&mut self, source: TaskId, kind: &str, target: TaskId) -> Result<Task> {
        if source == target {
            return Err(Error::Validation(format!(
                "task {source} cannot relate to itself"
            )));
        }
        let kind = self.validate_relation_type(kind)?;
        let mut task = self.cache.get(source)?;
        if !self.cache.contains(target) {
            return Err(Error::NotFound(target));
        }
        let duplicate = task.has_relation(&kind, target)
            || (self.cache.is_symmetric(&kind) && self.cache.get(target)?.has_relation(&kind, source));
        if duplicate {
            return Err(Error::Validation(format!(
                "task {source} already has a {kind} relation to {target}"
            )));
        }

        task.relations.push(Relation::new(kind.clone(), target));
        touch(&mut task);

        self.persist(|cache| {
            cache.storage().save(&task)?;
            cache.set(&task);
            cache.add_relation(source, &kind, target);
            Ok(())
        })?;
        Ok(task)
    }

    /// Remove a stored relation. For symmetric types either endpoint may be
    /// named as the source, and the edge is stripped from both records.
    /// Returns the named source task.
    pub fn remove_relation(&mut self, source: TaskId, kind: &str, target: TaskId) -> Result<Task> {
        let mut task = self.cache.get(source)?;
        let removed_here = strip_relation(&mut task, kind, target);

        let mut mirror = None;
        if self.cache.is_symmetric(kind) && self.cache.contains(target) {
            let mut other = self.cache.get(target)?;
            if strip_relation(&mut other, kind, source) {
                mirror = Some(other);
            }
        }
        if !removed_here && mirror.is_none() {
            return Err(no_such_relation(source, kind, target));
        }

        self.persist(|cache| {
            if removed_here {
                cache.storage().save(&task)?;
                cache.set(&task);
            }
            if let Some(other) = &mirror {
                cache.storage().save(other)?;
                cache.set(other);
            }
            cache.remove_relation(source, kind, target);
            Ok(())
        })?;
        Ok(task)
    }

    /// Force a full rescan of the records and persist the result
    pub fn rebuild_index(&mut self) -> Result<usize> {
        self.cache.rebuild()?;
        self.cache.save()?;
        Ok(self.cache.len())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn list(&self, filter: &TaskFilter) -> Vec<IndexEntry> {
        self.cache.filter(filter).into_iter().cloned().collect()
    }

    pub fn get(&self, id: TaskId) -> Result<Task> {
        self.cache.get(id)
    }

    pub fn get_with_subtasks(&self, id: TaskId) -> Result<TaskWithSubtasks> {
        let task = self.cache.get(id)?;
        let subtasks = self
            .cache
            .get_subtasks(id)
            .iter()
            .map(|entry| self.cache.get(entry.id))
            .collect::<Result<Vec<_>>>()?;
        Ok(TaskWithSubtasks { task, subtasks })
    }

    pub fn get_next_task(&self) -> Option<IndexEntry> {
        self.cache.next_todo().cloned()
    }

    /// Every selectable task, next task first
    pub fn ready(&self) -> Vec<IndexEntry> {
        selector::ready(&self.cache).into_iter().cloned().collect()
    }

    /// Todo tasks held back by at least one open blocker
    pub fn blocked_tasks(&self) -> Vec<IndexEntry> {
        self.cache
            .all()
            .into_iter()
            .filter(|entry| entry.status == Status::Todo && self.cache.is_blocked(entry.id))
            .cloned()
            .collect()
    }

    pub fn relations(&self, id: TaskId) -> Result<TaskRelations> {
        if !self.cache.contains(id) {
            return Err(Error::NotFound(id));
        }
        let mut relations = TaskRelations::default();
        let mut related = BTreeSet::new();
        for edge in self.cache.get_relations_for_task(id) {
            if edge.kind == BLOCKED_BY {
                if edge.source == id {
                    relations.blocked_by.push(edge.target);
                } else {
                    relations.blocks.push(edge.source);
                }
            } else {
                related.insert(RelatedTask {
                    task_id: edge.other(id),
                    kind: edge.kind,
                });
            }
        }
        relations.blocked_by.sort_unstable();
        relations.blocks.sort_unstable();
        relations.related = related.into_iter().collect();
        Ok(relations)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn validate_type(&self, kind: &str) -> Result<String> {
        let kind = kind.trim();
        if self.config.is_task_type(kind) {
            Ok(kind.to_string())
        } else {
            Err(Error::Validation(format!(
                "unknown task type '{kind}' (expected {})",
                self.config.tasks.types.join("|")
            )))
        }
    }

    fn validate_relation_type(&self, kind: &str) -> Result<String> {
        let kind = kind.trim();
        if self.config.is_relation_type(kind) {
            Ok(kind.to_string())
        } else {
            Err(Error::Validation(format!(
                "unknown relation type '{kind}' (expected {})",
                self.config.relations.types.join("|")
            )))
        }
    }

    /// Apply record writes and index updates, then save the index.
    fn persist<T>(&mut self, write: impl FnOnce(&mut IndexCache) -> Result<T>) -> Result<T> {
        let result = write(&mut self.cache).and_then(|value| {
            self.cache.save()?;
            Ok(value)
        });
        if let Err(err) = &result {
            warn!("Task write failed, discarding index: {}", err);
            self.cache.invalidate();
        }
        result
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    if title.contains(['\n', '\r']) {
        return Err(Error::Validation(
            "title must be a single line; put details in the description".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn touch(task: &mut Task) {
    task.updated_at = Utc::now();
}

/// Drop the stored `kind` relation to `target`, touching the task if it had one
fn strip_relation(task: &mut Task, kind: &str, target: TaskId) -> bool {
    let before = task.relations.len();
    task.relations
        .retain(|relation| !(relation.kind == kind && relation.target == target));
    let removed = task.relations.len() != before;
    if removed {
        touch(task);
    }
    removed
}

fn no_such_relation(source: TaskId, kind: &str, target: TaskId) -> Error {
    Error::StateConflict(format!(
        "task {source} has no {kind} relation to {target}"
    ))
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::RELATES_TO;
    use tempfile::TempDir;

    fn engine() -> (TempDir, TaskEngine) {
        let temp = TempDir::new().unwrap();
        let engine =
            TaskEngine::with_fingerprint(temp.path().join(".tasks"), Config::default(), "").unwrap();
        (temp, engine)
    }

    fn create(engine: &mut TaskEngine, title: &str, parent: Option<TaskId>) -> TaskId {
        engine
            .create(NewTask {
                parent_id: parent,
                ..NewTask::titled(title)
            })
            .unwrap()
            .id
    }

    #[test]
    fn create_applies_config_defaults() {
        let (_temp, mut engine) = engine();
        let task = engine.create(NewTask::titled("  Write docs ")).unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.kind, "task");
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(engine.get(1).unwrap(), task);
    }

    #[test]
    fn create_rejects_invalid_input_without_writing() {
        let (_temp, mut engine) = engine();
        let parent = create(&mut engine, "Parent", None);
        let child = create(&mut engine, "Child", Some(parent));

        let cases = [
            NewTask::titled("   "),
            NewTask {
                priority: Some("urgent".to_string()),
                ..NewTask::titled("A")
            },
            NewTask {
                kind: Some("epic".to_string()),
                ..NewTask::titled("A")
            },
            NewTask {
                parent_id: Some(42),
                ..NewTask::titled("A")
            },
            NewTask {
                parent_id: Some(child),
                ..NewTask::titled("A")
            },
        ];
        for case in cases {
            let err = engine.create(case).expect_err("invalid create");
            assert!(matches!(err, Error::Validation(_)), "{err:?}");
        }
        assert_eq!(engine.list(&TaskFilter::default()).len(), 2);
        assert_eq!(engine.cache().next_id().unwrap(), 3);
    }

    #[test]
    fn multi_line_titles_are_rejected() {
        let (temp, mut engine) = engine();
        let err = engine
            .create(NewTask::titled("first line\n+++\nsecond"))
            .expect_err("multi-line title");
        assert!(matches!(err, Error::Validation(_)));
        assert!(!temp.path().join(".tasks/1.md").exists());

        let id = create(&mut engine, "single line", None);
        let err = engine
            .update(
                id,
                TaskUpdate {
                    title: Some("one\r\ntwo".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .expect_err("multi-line title");
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(engine.get(id).unwrap().title, "single line");
        assert_eq!(engine.rebuild_index().unwrap(), 1);
    }

    #[test]
    fn update_validates_each_field() {
        let (_temp, mut engine) = engine();
        let id = create(&mut engine, "A", None);

        let err = engine
            .update(
                id,
                TaskUpdate {
                    title: Some(String::new()),
                    ..TaskUpdate::default()
                },
            )
            .expect_err("empty title");
        assert!(matches!(err, Error::Validation(_)));

        let err = engine
            .update(
                id,
                TaskUpdate {
                    status: Some("blocked".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .expect_err("unknown status");
        assert!(matches!(err, Error::Validation(_)));

        assert!(matches!(
            engine.update(99, TaskUpdate::default()),
            Err(Error::NotFound(99))
        ));

        let task = engine
            .update(
                id,
                TaskUpdate {
                    description: Some("more".to_string()),
                    priority: Some("critical".to_string()),
                    kind: Some("bug".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(task.title, "A");
        assert_eq!(task.description, "more");
        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.kind, "bug");
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn update_status_skips_workflow_and_propagation() {
        let (_temp, mut engine) = engine();
        let parent = create(&mut engine, "P", None);
        let child = create(&mut engine, "C", Some(parent));

        engine
            .update(
                child,
                TaskUpdate {
                    status: Some("done".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(engine.get(child).unwrap().status, Status::Done);
        assert_eq!(engine.get(parent).unwrap().status, Status::Todo);
    }

    #[test]
    fn start_and_complete_enforce_status() {
        let (_temp, mut engine) = engine();
        let id = create(&mut engine, "A", None);

        assert!(matches!(engine.complete(id), Err(Error::StateConflict(_))));
        engine.start(id).unwrap();
        assert!(matches!(engine.start(id), Err(Error::StateConflict(_))));
        engine.complete(id).unwrap();
        assert!(matches!(engine.complete(id), Err(Error::StateConflict(_))));
        assert!(matches!(engine.start(7), Err(Error::NotFound(7))));
    }

    #[test]
    fn blocked_task_cannot_start() {
        let (_temp, mut engine) = engine();
        let a = create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);
        engine.add_relation(b, BLOCKED_BY, a).unwrap();

        assert_eq!(engine.blocked_tasks().len(), 1);
        let err = engine.start(b).expect_err("blocked");
        assert!(matches!(err, Error::StateConflict(ref message) if message.contains("blocked")));

        engine.start(a).unwrap();
        engine.complete(a).unwrap();
        assert!(engine.blocked_tasks().is_empty());
        engine.start(b).unwrap();
    }

    #[test]
    fn container_cannot_complete_with_open_subtasks() {
        let (_temp, mut engine) = engine();
        let parent = create(&mut engine, "P", None);
        let child = create(&mut engine, "C", Some(parent));

        engine.start(parent).unwrap();
        let err = engine.complete(parent).expect_err("open subtask");
        assert!(matches!(err, Error::StateConflict(_)));

        engine.start(child).unwrap();
        engine.complete(child).unwrap();
        assert_eq!(engine.get(parent).unwrap().status, Status::Done);
    }

    #[test]
    fn relation_validation() {
        let (_temp, mut engine) = engine();
        let a = create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);

        assert!(matches!(
            engine.add_relation(a, BLOCKED_BY, a),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine.add_relation(a, "duplicates", b),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine.add_relation(a, BLOCKED_BY, 9),
            Err(Error::NotFound(9))
        ));
        assert!(matches!(
            engine.add_relation(9, BLOCKED_BY, a),
            Err(Error::NotFound(9))
        ));

        engine.add_relation(a, BLOCKED_BY, b).unwrap();
        assert!(matches!(
            engine.add_relation(a, BLOCKED_BY, b),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine.remove_relation(b, BLOCKED_BY, a),
            Err(Error::StateConflict(_))
        ));
        engine.remove_relation(a, BLOCKED_BY, b).unwrap();
        assert!(engine.get(a).unwrap().relations.is_empty());
    }

    #[test]
    fn symmetric_relation_is_visible_and_removable_from_both_ends() {
        let (_temp, mut engine) = engine();
        let a = create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);

        engine.add_relation(a, RELATES_TO, b).unwrap();
        assert!(matches!(
            engine.add_relation(b, RELATES_TO, a),
            Err(Error::Validation(_))
        ));

        let expected = |task_id| TaskRelations {
            related: vec![RelatedTask {
                kind: RELATES_TO.to_string(),
                task_id,
            }],
            ..TaskRelations::default()
        };
        assert_eq!(engine.relations(a).unwrap(), expected(b));
        assert_eq!(engine.relations(b).unwrap(), expected(a));

        let source = engine.remove_relation(b, RELATES_TO, a).unwrap();
        assert_eq!(source.id, b);
        assert!(engine.get(a).unwrap().relations.is_empty());
        assert!(engine.cache().edges().is_empty());
        assert_eq!(engine.relations(b).unwrap(), TaskRelations::default());
    }

    #[test]
    fn symmetric_removal_clears_both_stored_directions() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".tasks");
        let mut config = Config::default();
        config.relations.types.push("duplicates".to_string());

        // Both ends store the edge while the type is still one-way.
        let mut engine = TaskEngine::with_fingerprint(&dir, config.clone(), "").unwrap();
        let a = create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);
        engine.add_relation(a, "duplicates", b).unwrap();
        engine.add_relation(b, "duplicates", a).unwrap();
        drop(engine);

        config.relations.symmetric.push("duplicates".to_string());
        let mut engine = TaskEngine::with_fingerprint(&dir, config, "").unwrap();
        assert_eq!(engine.cache().edges().len(), 2);

        engine.remove_relation(a, "duplicates", b).unwrap();
        assert!(engine.get(a).unwrap().relations.is_empty());
        assert!(engine.get(b).unwrap().relations.is_empty());
        assert!(engine.cache().edges().is_empty());

        let persisted = engine.cache().edges();
        engine.rebuild_index().unwrap();
        assert_eq!(engine.cache().edges(), persisted);
        assert!(matches!(
            engine.remove_relation(b, "duplicates", a),
            Err(Error::StateConflict(_))
        ));
    }

    #[test]
    fn delete_purges_relations_on_neighbours() {
        let (_temp, mut engine) = engine();
        let a = create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);
        let c = create(&mut engine, "C", None);
        engine.add_relation(b, BLOCKED_BY, a).unwrap();
        engine.add_relation(a, RELATES_TO, c).unwrap();
        let before = engine.get(b).unwrap().updated_at;

        assert_eq!(engine.delete(a, false).unwrap(), vec![a]);
        assert!(matches!(engine.get(a), Err(Error::NotFound(_))));

        let b_task = engine.get(b).unwrap();
        assert!(b_task.relations.is_empty());
        assert!(b_task.updated_at >= before);
        assert!(engine.cache().edges().is_empty());
        assert_eq!(engine.relations(c).unwrap(), TaskRelations::default());
        assert!(matches!(engine.delete(a, false), Err(Error::NotFound(_))));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (temp, mut engine) = engine();
        create(&mut engine, "A", None);
        let b = create(&mut engine, "B", None);
        engine.delete(b, false).unwrap();
        assert_eq!(create(&mut engine, "C", None), 3);

        std::fs::remove_file(engine.cache().path()).unwrap();
        let mut reopened =
            TaskEngine::with_fingerprint(temp.path().join(".tasks"), Config::default(), "").unwrap();
        assert_eq!(create(&mut reopened, "D", None), 4);
    }
}
