//! Locating the project a command operates on.
//!
//! A project root is the nearest ancestor holding a `.taskline.toml` or a
//! task directory. Without either, the root of the enclosing git checkout is
//! used, and failing that the starting directory itself.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{Config, CONFIG_FILE};
use crate::engine::TaskEngine;
use crate::error::Result;
use crate::git;
use crate::storage::TASKS_DIR;

/// Find the project root for `start`
pub fn discover_root(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        if dir.join(CONFIG_FILE).is_file() || dir.join(TASKS_DIR).is_dir() {
            debug!(root = %dir.display(), "found project marker");
            return dir.to_path_buf();
        }
    }
    if let Some(workdir) = git::enclosing_workdir(start) {
        debug!(root = %workdir.display(), "using git checkout as project root");
        return workdir;
    }
    start.to_path_buf()
}

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    /// Use `root` as-is, reading its config (defaults when absent)
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = Config::load_from_root(&root);
        Self { root, config }
    }

    /// Discover the project enclosing `start`
    pub fn discover(start: &Path) -> Self {
        Self::at(discover_root(start))
    }

    /// Resolve an explicit `--root`, or discover from the current directory
    pub fn resolve(root: Option<&Path>) -> Result<Self> {
        match root {
            Some(root) => Ok(Self::at(root)),
            None => Ok(Self::discover(&std::env::current_dir()?)),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join(&self.config.tasks_dir)
    }

    pub fn open_engine(&self) -> Result<TaskEngine> {
        TaskEngine::open(&self.root, self.config.clone())
    }
}
