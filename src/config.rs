//! Configuration loading and management
//!
//! Handles parsing of `.taskline.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};
use crate::task::{Priority, BLOCKED_BY, RELATES_TO};

/// Configuration file name at the project root
pub const CONFIG_FILE: &str = ".taskline.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Task directory, relative to the project root
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: String,

    /// Task field configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Relation type configuration
    #[serde(default)]
    pub relations: RelationsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
            tasks: TasksConfig::default(),
            relations: RelationsConfig::default(),
        }
    }
}

fn default_tasks_dir() -> String {
    crate::storage::TASKS_DIR.to_string()
}

/// Tasks configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Allowed task types
    #[serde(default = "default_task_types")]
    pub types: Vec<String>,

    /// Type for new tasks when none is given
    #[serde(default = "default_task_type")]
    pub default_type: String,

    /// Priority for new tasks when none is given
    #[serde(default = "default_task_priority")]
    pub default_priority: String,
}

fn default_task_types() -> Vec<String> {
    ["task", "bug", "feature", "chore"]
        .iter()
        .map(|kind| kind.to_string())
        .collect()
}

fn default_task_type() -> String {
    "task".to_string()
}

fn default_task_priority() -> String {
    "medium".to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            types: default_task_types(),
            default_type: default_task_type(),
            default_priority: default_task_priority(),
        }
    }
}

/// Relations configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationsConfig {
    /// Allowed relation types
    #[serde(default = "default_relation_types")]
    pub types: Vec<String>,

    /// Relation types mirrored in both directions
    #[serde(default = "default_symmetric_types")]
    pub symmetric: Vec<String>,
}

fn default_relation_types() -> Vec<String> {
    vec![BLOCKED_BY.to_string(), RELATES_TO.to_string()]
}

fn default_symmetric_types() -> Vec<String> {
    vec![RELATES_TO.to_string()]
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            types: default_relation_types(),
            symmetric: default_symmetric_types(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskline.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the project root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    "Ignoring config {}: {}; using defaults",
                    config_path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Trim surrounding whitespace from every configured name
    pub fn normalize(&mut self) {
        fn trim_all(names: &mut [String]) {
            for name in names {
                *name = name.trim().to_string();
            }
        }
        self.tasks_dir = self.tasks_dir.trim().to_string();
        trim_all(&mut self.tasks.types);
        self.tasks.default_type = self.tasks.default_type.trim().to_string();
        self.tasks.default_priority = self.tasks.default_priority.trim().to_string();
        trim_all(&mut self.relations.types);
        trim_all(&mut self.relations.symmetric);
    }

    pub fn validate(&self) -> Result<()> {
        if self.tasks_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("tasks_dir cannot be empty".to_string()));
        }
        self.tasks.validate()?;
        self.relations.validate()?;
        Ok(())
    }

    pub fn default_priority(&self) -> Result<Priority> {
        self.tasks
            .default_priority
            .parse()
            .map_err(|_| invalid_default_priority(&self.tasks.default_priority))
    }

    pub fn is_task_type(&self, kind: &str) -> bool {
        self.tasks.types.iter().any(|allowed| allowed == kind)
    }

    pub fn is_relation_type(&self, kind: &str) -> bool {
        self.relations.types.iter().any(|allowed| allowed == kind)
    }
}

fn invalid_default_priority(value: &str) -> Error {
    Error::InvalidConfig(format!(
        "tasks.default_priority '{value}' is not a priority (expected critical|high|medium|low)"
    ))
}

fn validate_names<'a>(names: &'a [String], field: &str) -> Result<HashSet<&'a str>> {
    if names.is_empty() {
        return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
    }
    let mut seen = HashSet::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{field} cannot include empty entries"
            )));
        }
        if !seen.insert(trimmed) {
            return Err(Error::InvalidConfig(format!(
                "{field} has duplicate entry '{trimmed}'"
            )));
        }
    }
    Ok(seen)
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        let types = validate_names(&self.types, "tasks.types")?;
        if !types.contains(self.default_type.trim()) {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_type '{}' not in tasks.types",
                self.default_type
            )));
        }
        if self.default_priority.parse::<Priority>().is_err() {
            return Err(invalid_default_priority(&self.default_priority));
        }
        Ok(())
    }
}

impl RelationsConfig {
    fn validate(&self) -> Result<()> {
        let types = validate_names(&self.types, "relations.types")?;
        for kind in &self.symmetric {
            let trimmed = kind.trim();
            if !types.contains(trimmed) {
                return Err(Error::InvalidConfig(format!(
                    "relations.symmetric '{trimmed}' not in relations.types"
                )));
            }
            if trimmed == BLOCKED_BY {
                return Err(Error::InvalidConfig(format!(
                    "relations.symmetric cannot include '{BLOCKED_BY}'"
                )));
            }
        }
        Ok(())
    }
}
