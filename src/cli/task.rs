//! taskline task command implementations

use serde::Serialize;

use crate::engine::{NewTask, TaskEngine, TaskUpdate};
use crate::error::{Error, Result};
use crate::index::{CacheStatus, ParentScope, RebuildReason, TaskFilter};
use crate::output::{emit_success, format_entry_line, HumanOutput};
use crate::storage::format_timestamp;
use crate::task::{IndexEntry, Priority, Status, Task, TaskId};

use super::CommandContext;

pub struct NewOptions {
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
    pub kind: Option<String>,
    pub parent: Option<TaskId>,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub kind: Option<String>,
    pub parent: Option<TaskId>,
}

#[derive(Serialize)]
struct DeleteReport {
    deleted: Vec<TaskId>,
}

#[derive(Serialize)]
struct ReindexReport {
    tasks: usize,
    edges: usize,
}

/// Output for `engine`: carries the index status, and warns when a stale or corrupt index was rebuilt
pub(crate) fn human_output(engine: &TaskEngine, header: impl Into<String>) -> HumanOutput {
    let mut out = HumanOutput::new(header);
    out.set_index_status(engine.cache_status());
    if let CacheStatus::Rebuilt(reason) = engine.cache_status() {
        if reason != RebuildReason::Missing {
            out.push_warning(format!("index rebuilt ({reason:?})"));
        }
    }
    out
}

pub fn run_new(ctx: &CommandContext, options: NewOptions) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let task = engine.create(NewTask {
        title: options.title,
        description: options.description,
        priority: options.priority,
        kind: options.kind,
        parent_id: options.parent,
    })?;

    let mut out = task_output(&engine, format!("Created task #{}", task.id), &task);
    out.push_next_step(format!("taskline start {}", task.id));
    emit_success(ctx.output, "new", &task, Some(&out))
}

pub fn run_list(ctx: &CommandContext, options: ListOptions) -> Result<()> {
    let filter = TaskFilter {
        status: options
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?,
        priority: options
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?,
        kind: options.kind,
        parent: ParentScope::from(options.parent),
    };

    let engine = ctx.project.open_engine()?;
    let tasks = engine.list(&filter);

    let mut out = entries_output(&engine, format!("{} task(s)", tasks.len()), &tasks);
    if tasks.is_empty() && filter == TaskFilter::default() {
        out.push_next_step("taskline new <title>");
    }
    emit_success(ctx.output, "list", &tasks, Some(&out))
}

pub fn run_show(ctx: &CommandContext, id: TaskId, subtasks: bool) -> Result<()> {
    let engine = ctx.project.open_engine()?;

    if subtasks {
        let detail = engine.get_with_subtasks(id)?;
        let mut out = task_output(&engine, format!("Task #{}", id), &detail.task);
        for subtask in &detail.subtasks {
            out.push_detail(format!(
                "subtask {}",
                format_entry_line(&subtask.entry())
            ));
        }
        return emit_success(ctx.output, "show", &detail, Some(&out));
    }

    let task = engine.get(id)?;
    let out = task_output(&engine, format!("Task #{}", id), &task);
    emit_success(ctx.output, "show", &task, Some(&out))
}

pub fn run_update(ctx: &CommandContext, id: TaskId, update: TaskUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(Error::Validation(
            "nothing to update (pass --title, --description, --status, --priority or --type)"
                .to_string(),
        ));
    }
    let mut engine = ctx.project.open_engine()?;
    let status_edit = update.status.is_some();
    let task = engine.update(id, update)?;

    let mut out = task_output(&engine, format!("Updated task #{}", id), &task);
    if status_edit {
        out.push_warning("status set directly; start/done checks and parent updates were skipped");
    }
    emit_success(ctx.output, "update", &task, Some(&out))
}

pub fn run_delete(ctx: &CommandContext, id: TaskId, cascade: bool) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let deleted = engine.delete(id, cascade)?;

    let mut out = human_output(&engine, format!("Deleted task #{}", id));
    out.push_summary(
        "deleted",
        deleted
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", "),
    );
    emit_success(ctx.output, "delete", &DeleteReport { deleted }, Some(&out))
}

pub fn run_start(ctx: &CommandContext, id: TaskId) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let task = engine.start(id)?;

    let mut out = task_output(&engine, format!("Started task #{}", id), &task);
    if let Some(parent) = task.parent_id {
        out.push_detail(format!("parent #{parent} is in progress"));
    }
    out.push_next_step(format!("taskline done {}", id));
    emit_success(ctx.output, "start", &task, Some(&out))
}

pub fn run_done(ctx: &CommandContext, id: TaskId) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let task = engine.complete(id)?;

    let mut out = task_output(&engine, format!("Completed task #{}", id), &task);
    if let Some(parent) = task.parent_id {
        if engine.get(parent)?.status == Status::Done {
            out.push_detail(format!("parent #{parent} completed with its last subtask"));
        }
    }
    out.push_next_step("taskline next");
    emit_success(ctx.output, "done", &task, Some(&out))
}

pub fn run_next(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.project.open_engine()?;
    let next = engine.get_next_task();

    let out = match &next {
        Some(entry) => {
            let mut out = human_output(&engine, format!("Next: #{} {}", entry.id, entry.title));
            push_entry_summary(&mut out, entry);
            out.push_next_step(format!("taskline start {}", entry.id));
            out
        }
        None => {
            let mut out = human_output(&engine, "No task ready");
            let blocked = engine.blocked_tasks();
            if !blocked.is_empty() {
                out.push_detail(format!("{} todo task(s) are blocked", blocked.len()));
            }
            out
        }
    };
    emit_success(ctx.output, "next", &next, Some(&out))
}

pub fn run_ready(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.project.open_engine()?;
    let ready = engine.ready();

    let out = entries_output(&engine, format!("{} ready task(s)", ready.len()), &ready);
    emit_success(ctx.output, "ready", &ready, Some(&out))
}

pub fn run_reindex(ctx: &CommandContext) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let tasks = engine.rebuild_index()?;
    let report = ReindexReport {
        tasks,
        edges: engine.cache().edges().len(),
    };

    let mut out = human_output(&engine, "Index rebuilt");
    out.push_summary("tasks", report.tasks.to_string());
    out.push_summary("edges", report.edges.to_string());
    out.push_summary("index", engine.cache().path().display().to_string());
    emit_success(ctx.output, "reindex", &report, Some(&out))
}

fn task_output(engine: &TaskEngine, header: String, task: &Task) -> HumanOutput {
    let mut out = human_output(engine, header);
    out.push_summary("title", task.title.clone());
    out.push_summary("status", task.status.as_str());
    out.push_summary("priority", task.priority.as_str());
    out.push_summary("type", task.kind.clone());
    if let Some(parent) = task.parent_id {
        out.push_summary("parent", format!("#{parent}"));
    }
    out.push_summary("created", format_timestamp(&task.created_at));
    out.push_summary("updated", format_timestamp(&task.updated_at));
    for relation in &task.relations {
        out.push_detail(format!("{} #{}", relation.kind, relation.target));
    }
    if !task.description.is_empty() {
        out.push_detail(task.description.clone());
    }
    out
}

fn entries_output(engine: &TaskEngine, header: String, entries: &[IndexEntry]) -> HumanOutput {
    let mut out = human_output(engine, header);
    for entry in entries {
        out.push_detail(format_entry_line(entry));
    }
    out
}

fn push_entry_summary(out: &mut HumanOutput, entry: &IndexEntry) {
    out.push_summary("status", entry.status.as_str());
    out.push_summary("priority", entry.priority.as_str());
    out.push_summary("type", entry.kind.clone());
    if let Some(parent) = entry.parent_id {
        out.push_summary("parent", format!("#{parent}"));
    }
}
