//! taskline init command implementation
//!
//! Writes a default config and creates the task directory at the project root.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::index::INDEX_FILE;
use crate::output::{emit_success, HumanOutput};

use super::CommandContext;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    tasks_dir: PathBuf,
    created: InitCreated,
    updated: InitUpdated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    tasks_dir: bool,
}

#[derive(serde::Serialize)]
struct InitUpdated {
    gitignore: bool,
}

pub fn run(ctx: &CommandContext) -> Result<()> {
    let root = ctx.project.root.clone();
    let tasks_dir = ctx.project.tasks_dir();

    let created_config = ensure_config(&root)?;
    let created_tasks_dir = ensure_dir(&tasks_dir)?;
    let index_pattern = format!("{}/{}", ctx.project.config.tasks_dir.trim_end_matches('/'), INDEX_FILE);
    let updated_gitignore = ensure_gitignore(&root, &index_pattern)?;

    let report = InitReport {
        root: root.clone(),
        tasks_dir: tasks_dir.clone(),
        created: InitCreated {
            config: created_config,
            tasks_dir: created_tasks_dir,
        },
        updated: InitUpdated {
            gitignore: updated_gitignore,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_tasks_dir {
        created_items.push(format!("{}/", ctx.project.config.tasks_dir));
    }

    let header = if created_items.is_empty() && !updated_gitignore {
        "taskline init: nothing to do"
    } else {
        "taskline init: initialized project"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_summary(
        "updated",
        if updated_gitignore { ".gitignore" } else { "none" },
    );
    human.push_next_step("taskline new <title>");

    emit_success(ctx.output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::InvalidConfig(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(root)?;
    Config::default().save(&config_path)?;
    Ok(true)
}

/// Keep the derived index out of version control
fn ensure_gitignore(root: &Path, pattern: &str) -> Result<bool> {
    let path = root.join(".gitignore");
    if path.exists() && !path.is_file() {
        return Err(Error::Validation(format!(
            ".gitignore exists but is not a file: {}",
            path.display()
        )));
    }

    let existing = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        String::new()
    };

    if has_ignore(&existing, pattern) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(pattern);
    updated.push('\n');
    std::fs::write(&path, updated)?;
    Ok(true)
}

fn has_ignore(contents: &str, pattern: &str) -> bool {
    let dir = pattern.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(pattern);
    contents.lines().any(|line| {
        let trimmed = line.trim().trim_start_matches('/');
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        trimmed == pattern || trimmed == dir || trimmed == format!("{dir}/")
    })
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::Validation(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_detection_accepts_dir_or_file_patterns() {
        assert!(has_ignore(".tasks/index.json\n", ".tasks/index.json"));
        assert!(has_ignore("target\n/.tasks/\n", ".tasks/index.json"));
        assert!(!has_ignore("# .tasks/index.json\n", ".tasks/index.json"));
        assert!(!has_ignore(".tasks/1.md\n", ".tasks/index.json"));
    }
}
