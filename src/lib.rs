//! taskline - file-backed task tracking library
//!
//! This library provides the core of the taskline CLI: a durable store of
//! task records, a rebuildable index over them, and the lifecycle rules that
//! keep parents, subtasks and blocking relations consistent.
//!
//! # Core Concepts
//!
//! - **Records**: one human-readable file per task, the only source of truth
//! - **Index**: derived metadata and relation graph, fingerprinted against git HEAD
//! - **Lifecycle**: `todo -> in_progress -> done`, with parent propagation
//! - **Blocking**: `blocked_by` relations hold a task back until its targets are done
//! - **Next task**: open subtasks of active parents first, then priority and age
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskline.toml`
//! - `engine`: Lifecycle operations over the store and index
//! - `error`: Error types and result aliases
//! - `git`: Workspace fingerprint from the enclosing checkout
//! - `graph`: Relation graph with symmetric mirroring
//! - `index`: Index cache persistence and staleness detection
//! - `output`: Human and JSON output envelopes
//! - `project`: Project-root discovery
//! - `selector`: Next-task selection
//! - `storage`: Task record files and atomic writes
//! - `task`: Task data model
//! - `tool`: Tool-calling adapter over the engine

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod graph;
pub mod index;
pub mod output;
pub mod project;
pub mod selector;
pub mod storage;
pub mod task;
pub mod tool;

pub use engine::TaskEngine;
pub use error::{Error, Result};
