//! taskline relation command implementations

use crate::error::Result;
use crate::output::emit_success;
use crate::task::TaskId;

use super::task::human_output;
use super::CommandContext;

pub fn run_add(ctx: &CommandContext, source: TaskId, kind: &str, target: TaskId) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let task = engine.add_relation(source, kind, target)?;

    let mut out = human_output(&engine, format!("Added {kind}: #{source} -> #{target}"));
    if engine.cache().is_symmetric(kind) {
        out.push_detail(format!("mirrored as #{target} -> #{source}"));
    }
    emit_success(ctx.output, "relation add", &task, Some(&out))
}

pub fn run_remove(ctx: &CommandContext, source: TaskId, kind: &str, target: TaskId) -> Result<()> {
    let mut engine = ctx.project.open_engine()?;
    let task = engine.remove_relation(source, kind, target)?;

    let mut out = human_output(&engine, format!("Removed {kind}: #{source} -> #{target}"));
    if engine.cache().is_symmetric(kind) {
        out.push_detail(format!("mirror #{target} -> #{source} removed as well"));
    }
    emit_success(ctx.output, "relation remove", &task, Some(&out))
}

pub fn run_list(ctx: &CommandContext, id: TaskId) -> Result<()> {
    let engine = ctx.project.open_engine()?;
    let relations = engine.relations(id)?;

    let mut out = human_output(&engine, format!("Relations of #{id}"));
    out.push_summary("blocked by", format_ids(&relations.blocked_by));
    out.push_summary("blocks", format_ids(&relations.blocks));
    for related in &relations.related {
        out.push_detail(format!("{} #{}", related.kind, related.task_id));
    }
    if engine.cache().is_blocked(id) {
        out.push_warning(format!(
            "#{id} is blocked by {}",
            format_ids(&engine.cache().open_blockers(id))
        ));
    }
    emit_success(ctx.output, "relation list", &relations, Some(&out))
}

fn format_ids(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}
