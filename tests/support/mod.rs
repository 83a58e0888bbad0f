#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Oid, Repository, Signature};
use taskline::config::Config;
use taskline::TaskEngine;
use tempfile::TempDir;

/// A throwaway git checkout for fingerprint-sensitive tests
pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn init() -> Result<Self, git2::Error> {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".taskline.toml", contents)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.path().join(".tasks")
    }

    pub fn open_engine(&self) -> TaskEngine {
        TaskEngine::open(self.path(), Config::load_from_root(self.path())).expect("open engine")
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("taskline-test", "taskline-test@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());

        let oid = match parent {
            Some(parent) => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?,
            None => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        Ok(oid)
    }

    pub fn commit_file(
        &self,
        rel_path: &str,
        contents: &str,
        message: &str,
    ) -> Result<Oid, Box<dyn std::error::Error>> {
        self.write_file(rel_path, contents)?;
        Ok(self.commit_all(message)?)
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }
}

/// A plain temp directory holding a task directory, with a fixed fingerprint
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.path().join(".tasks")
    }

    pub fn engine(&self) -> TaskEngine {
        self.engine_with(Config::default(), "")
    }

    pub fn engine_with(&self, config: Config, fingerprint: &str) -> TaskEngine {
        TaskEngine::with_fingerprint(self.tasks_dir(), config, fingerprint).expect("open engine")
    }
}

/// The taskline binary with logging off and no inherited root
pub fn taskline_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("taskline").expect("taskline binary");
    cmd.env_remove("TASKLINE_ROOT").env_remove("RUST_LOG");
    cmd
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "taskline-test")?;
    cfg.set_str("user.email", "taskline-test@example.com")?;
    Ok(())
}
