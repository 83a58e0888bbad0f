//! Tool-calling adapter.
//!
//! Exposes the engine operations to automated callers as named tools with a
//! JSON input schema. Arguments are type-checked here; everything else is
//! validated by the engine. Failures come back as `"<kind>: <message>"`.

use serde_json::{json, Map, Value};

use crate::engine::{NewTask, TaskEngine, TaskUpdate};
use crate::error::{Error, Result};
use crate::index::{ParentScope, TaskFilter};
use crate::task::{Priority, Status, TaskId};

fn id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer", "description": description }
        },
        "required": ["id"]
    })
}

fn relation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source_id": { "type": "integer" },
            "type": { "type": "string", "description": "Relation type, e.g. blocked_by or relates_to" },
            "target_id": { "type": "integer" }
        },
        "required": ["source_id", "type", "target_id"]
    })
}

/// One definition per tool: `name`, `description`, `inputSchema`
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "task_create",
            "description": "Create a task, optionally as a subtask of a top-level task.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "priority": { "type": "string", "enum": ["critical", "high", "medium", "low"] },
                    "type": { "type": "string" },
                    "parent_id": { "type": "integer" }
                },
                "required": ["title"]
            },
        }),
        json!({
            "name": "task_list",
            "description": "List tasks matching every given filter, sorted by id. parent_id 0 lists top-level tasks.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status": { "type": "string", "enum": ["todo", "in_progress", "done"] },
                    "priority": { "type": "string", "enum": ["critical", "high", "medium", "low"] },
                    "type": { "type": "string" },
                    "parent_id": { "type": "integer" }
                },
                "required": []
            },
        }),
        json!({
            "name": "task_get",
            "description": "Get a task with its description, optionally with its subtasks.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "include_subtasks": { "type": "boolean" }
                },
                "required": ["id"]
            },
        }),
        json!({
            "name": "task_update",
            "description": "Edit task fields. Setting status here skips start/complete checks.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "status": { "type": "string", "enum": ["todo", "in_progress", "done"] },
                    "priority": { "type": "string", "enum": ["critical", "high", "medium", "low"] },
                    "type": { "type": "string" }
                },
                "required": ["id"]
            },
        }),
        json!({
            "name": "task_delete",
            "description": "Delete a task. cascade also deletes its subtasks.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "cascade": { "type": "boolean" }
                },
                "required": ["id"]
            },
        }),
        json!({
            "name": "task_start",
            "description": "Move a todo task to in_progress. Fails while the task is blocked.",
            "inputSchema": id_schema("Task to start"),
        }),
        json!({
            "name": "task_complete",
            "description": "Move an in_progress task to done. Fails while subtasks are open.",
            "inputSchema": id_schema("Task to complete"),
        }),
        json!({
            "name": "task_next",
            "description": "The task to work on next, or null when nothing is ready.",
            "inputSchema": { "type": "object", "properties": {}, "required": [] },
        }),
        json!({
            "name": "relation_add",
            "description": "Add a relation from source to target.",
            "inputSchema": relation_schema(),
        }),
        json!({
            "name": "relation_remove",
            "description": "Remove a relation. Symmetric relations may be named from either end.",
            "inputSchema": relation_schema(),
        }),
    ]
}

pub fn tool_names() -> Vec<String> {
    definitions()
        .iter()
        .filter_map(|tool| tool.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

/// Run a tool against the engine
pub fn call(engine: &mut TaskEngine, name: &str, args: Value) -> std::result::Result<Value, String> {
    dispatch(engine, name, args).map_err(|err| format_error(&err))
}

pub fn format_error(err: &Error) -> String {
    format!("{}: {}", err.kind(), err)
}

/// Like [`call`], keeping the typed error
pub fn dispatch(engine: &mut TaskEngine, name: &str, args: Value) -> Result<Value> {
    let args = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(Error::Validation(format!(
                "arguments must be an object, got {}",
                type_name(&other)
            )));
        }
    };

    let value = match name {
        "task_create" => {
            let new = NewTask {
                title: require_string(&args, "title")?,
                description: optional_string(&args, "description")?.unwrap_or_default(),
                priority: optional_string(&args, "priority")?,
                kind: optional_string(&args, "type")?,
                parent_id: optional_u64(&args, "parent_id")?,
            };
            serde_json::to_value(engine.create(new)?)?
        }
        "task_list" => {
            let filter = TaskFilter {
                status: optional_string(&args, "status")?
                    .map(|value| value.parse::<Status>())
                    .transpose()?,
                priority: optional_string(&args, "priority")?
                    .map(|value| value.parse::<Priority>())
                    .transpose()?,
                kind: optional_string(&args, "type")?,
                parent: ParentScope::from(optional_u64(&args, "parent_id")?),
            };
            serde_json::to_value(engine.list(&filter))?
        }
        "task_get" => {
            let id = require_id(&args, "id")?;
            if optional_bool(&args, "include_subtasks")?.unwrap_or(false) {
                serde_json::to_value(engine.get_with_subtasks(id)?)?
            } else {
                serde_json::to_value(engine.get(id)?)?
            }
        }
        "task_update" => {
            let id = require_id(&args, "id")?;
            let update = TaskUpdate {
                title: optional_string(&args, "title")?,
                description: optional_string(&args, "description")?,
                status: optional_string(&args, "status")?,
                priority: optional_string(&args, "priority")?,
                kind: optional_string(&args, "type")?,
            };
            serde_json::to_value(engine.update(id, update)?)?
        }
        "task_delete" => {
            let id = require_id(&args, "id")?;
            let cascade = optional_bool(&args, "cascade")?.unwrap_or(false);
            let deleted = engine.delete(id, cascade)?;
            json!({ "deleted": deleted })
        }
        "task_start" => serde_json::to_value(engine.start(require_id(&args, "id")?)?)?,
        "task_complete" => serde_json::to_value(engine.complete(require_id(&args, "id")?)?)?,
        "task_next" => serde_json::to_value(engine.get_next_task())?,
        "relation_add" | "relation_remove" => {
            let source = require_id(&args, "source_id")?;
            let kind = require_string(&args, "type")?;
            let target = require_id(&args, "target_id")?;
            let task = if name == "relation_add" {
                engine.add_relation(source, &kind, target)?
            } else {
                engine.remove_relation(source, &kind, target)?
            };
            serde_json::to_value(task)?
        }
        _ => return Err(Error::Validation(format!("unknown tool '{name}'"))),
    };
    Ok(value)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn require_string(args: &Map<String, Value>, key: &str) -> Result<String> {
    optional_string(args, key)?.ok_or_else(|| Error::Validation(format!("{key} is required")))
}

fn optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(Error::Validation(format!(
            "{key}: expected string, got {}",
            type_name(other)
        ))),
    }
}

fn optional_u64(args: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_u64().map(Some).ok_or_else(|| {
            Error::Validation(format!("{key}: expected non-negative integer"))
        }),
        Some(other) => Err(Error::Validation(format!(
            "{key}: expected integer, got {}",
            type_name(other)
        ))),
    }
}

fn require_id(args: &Map<String, Value>, key: &str) -> Result<TaskId> {
    optional_u64(args, key)?.ok_or_else(|| Error::Validation(format!("{key} is required")))
}

fn optional_bool(args: &Map<String, Value>, key: &str) -> Result<Option<bool>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(Error::Validation(format!(
            "{key}: expected boolean, got {}",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn engine() -> (TempDir, TaskEngine) {
        let temp = TempDir::new().unwrap();
        let engine =
            TaskEngine::with_fingerprint(temp.path().join(".tasks"), Config::default(), "").unwrap();
        (temp, engine)
    }

    #[test]
    fn every_definition_has_a_schema() {
        let names = tool_names();
        assert_eq!(names.len(), 10);
        for tool in definitions() {
            assert_eq!(tool["inputSchema"]["type"], "object");
            assert!(tool["inputSchema"]["required"].is_array());
            assert!(tool["description"].as_str().is_some());
        }
    }

    #[test]
    fn argument_types_are_checked() {
        let (_temp, mut engine) = engine();
        let err = call(&mut engine, "task_create", json!({ "title": 5 })).unwrap_err();
        assert_eq!(err, "validation: Invalid input: title: expected string, got number");

        let err = call(&mut engine, "task_start", json!({})).unwrap_err();
        assert_eq!(err, "validation: Invalid input: id is required");

        let err = call(&mut engine, "task_get", json!({ "id": -1 })).unwrap_err();
        assert!(err.starts_with("validation:"));

        let err = call(&mut engine, "task_next", json!([1])).unwrap_err();
        assert!(err.contains("must be an object"));

        let err = call(&mut engine, "task_frobnicate", Value::Null).unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn tools_drive_the_engine() {
        let (_temp, mut engine) = engine();
        let parent = call(
            &mut engine,
            "task_create",
            json!({ "title": "Parent", "priority": "high" }),
        )
        .unwrap();
        assert_eq!(parent["id"], 1);
        assert_eq!(parent["status"], "todo");
        assert_eq!(parent["priority"], "high");

        call(
            &mut engine,
            "task_create",
            json!({ "title": "Child", "parent_id": 1, "type": "bug" }),
        )
        .unwrap();

        let next = call(&mut engine, "task_next", Value::Null).unwrap();
        assert_eq!(next["id"], 2);

        let top = call(&mut engine, "task_list", json!({ "parent_id": 0 })).unwrap();
        assert_eq!(top.as_array().unwrap().len(), 1);

        call(&mut engine, "task_start", json!({ "id": 2 })).unwrap();
        let done = call(&mut engine, "task_complete", json!({ "id": 2 })).unwrap();
        assert_eq!(done["status"], "done");

        let with_subtasks =
            call(&mut engine, "task_get", json!({ "id": 1, "include_subtasks": true })).unwrap();
        assert_eq!(with_subtasks["status"], "done");
        assert_eq!(with_subtasks["subtasks"][0]["id"], 2);

        let err = call(&mut engine, "task_delete", json!({ "id": 1 })).unwrap_err();
        assert!(err.starts_with("state_conflict:"));
        let deleted = call(&mut engine, "task_delete", json!({ "id": 1, "cascade": true })).unwrap();
        assert_eq!(deleted, json!({ "deleted": [2, 1] }));

        assert_eq!(call(&mut engine, "task_next", Value::Null).unwrap(), Value::Null);
        let err = call(&mut engine, "task_get", json!({ "id": 1 })).unwrap_err();
        assert_eq!(err, "not_found: Task not found: 1");
    }

    #[test]
    fn relation_tools_round_trip() {
        let (_temp, mut engine) = engine();
        call(&mut engine, "task_create", json!({ "title": "A" })).unwrap();
        call(&mut engine, "task_create", json!({ "title": "B" })).unwrap();

        let task = call(
            &mut engine,
            "relation_add",
            json!({ "source_id": 2, "type": "blocked_by", "target_id": 1 }),
        )
        .unwrap();
        assert_eq!(task["relations"][0]["type"], "blocked_by");
        assert_eq!(task["relations"][0]["target"], 1);

        let err = call(&mut engine, "task_start", json!({ "id": 2 })).unwrap_err();
        assert!(err.starts_with("state_conflict:"));

        call(
            &mut engine,
            "relation_remove",
            json!({ "source_id": 2, "type": "blocked_by", "target_id": 1 }),
        )
        .unwrap();
        let err = call(
            &mut engine,
            "relation_remove",
            json!({ "source_id": 2, "type": "blocked_by", "target_id": 1 }),
        )
        .unwrap_err();
        assert!(err.starts_with("state_conflict:"));
    }
}
