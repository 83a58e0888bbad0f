//! taskline tool command implementations

use serde_json::Value;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::tool;

use super::task::human_output;
use super::CommandContext;

pub fn run_list(ctx: &CommandContext) -> Result<()> {
    let definitions = tool::definitions();

    let mut out = HumanOutput::new(format!("{} tool(s)", definitions.len()));
    for definition in &definitions {
        let name = definition["name"].as_str().unwrap_or_default();
        let description = definition["description"].as_str().unwrap_or_default();
        out.push_detail(format!("{name}: {description}"));
    }
    emit_success(ctx.output, "tool list", &definitions, Some(&out))
}

pub fn run_call(ctx: &CommandContext, name: &str, args: &str) -> Result<()> {
    let args: Value = serde_json::from_str(args)
        .map_err(|err| Error::Validation(format!("--args is not valid JSON: {err}")))?;
    let mut engine = ctx.project.open_engine()?;
    let result = tool::dispatch(&mut engine, name, args)?;

    let mut out = human_output(&engine, format!("{name}: ok"));
    out.push_detail(serde_json::to_string_pretty(&result)?);
    emit_success(ctx.output, "tool call", &result, Some(&out))
}
