//! Command-line interface for taskline
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::project::Project;

mod init;
mod relation;
mod task;
mod tool;

/// taskline - file-backed task tracking
///
/// Tasks live as one record per file under the project's task directory,
/// with a rebuildable index for fast listing and next-task selection.
#[derive(Parser, Debug)]
#[command(name = "taskline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root (defaults to discovery from the current directory)
    #[arg(long, global = true, env = "TASKLINE_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config file and task directory
    Init,

    /// Create a task
    New {
        /// Task title
        title: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Priority: critical, high, medium, low
        #[arg(short, long)]
        priority: Option<String>,

        /// Task type (see tasks.types in .taskline.toml)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Create as a subtask of this task
        #[arg(long)]
        parent: Option<u64>,
    },

    /// List tasks
    List {
        /// Filter by status: todo, in_progress, done
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority
        #[arg(long)]
        priority: Option<String>,

        /// Filter by type
        #[arg(long = "type")]
        kind: Option<String>,

        /// Only subtasks of this task (0 = top-level tasks only)
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Show a task with its description
    Show {
        id: u64,

        /// Include subtasks
        #[arg(long)]
        subtasks: bool,
    },

    /// Edit task fields (status edits skip start/done checks)
    Update {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Delete a task
    Delete {
        id: u64,

        /// Also delete its subtasks
        #[arg(long)]
        cascade: bool,
    },

    /// Start working on a task
    Start { id: u64 },

    /// Mark an in-progress task done
    Done { id: u64 },

    /// Show the task to work on next
    Next,

    /// List every task that can be started, in selection order
    Ready,

    /// Relation management
    #[command(subcommand)]
    Relation(RelationCommands),

    /// Rebuild the index from the task records
    Reindex,

    /// Tool-calling adapter
    #[command(subcommand)]
    Tool(ToolCommands),
}

/// Relation subcommands
#[derive(Subcommand, Debug)]
pub enum RelationCommands {
    /// Add a relation, e.g. `relation add 3 blocked_by 2`
    Add {
        source: u64,
        #[arg(value_name = "TYPE")]
        kind: String,
        target: u64,
    },

    /// Remove a relation
    Remove {
        source: u64,
        #[arg(value_name = "TYPE")]
        kind: String,
        target: u64,
    },

    /// Show the relations of a task
    List { id: u64 },
}

/// Tool subcommands
#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// Print tool definitions
    List,

    /// Call a tool with JSON arguments
    Call {
        name: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Context shared by every command
pub(crate) struct CommandContext {
    pub project: Project,
    pub output: OutputOptions,
}

impl CommandContext {
    fn new(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<Self> {
        Ok(Self {
            project: Project::resolve(root.as_deref())?,
            output: OutputOptions { json, quiet },
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext::new(self.root, self.json, self.quiet)?;
        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::New {
                title,
                description,
                priority,
                kind,
                parent,
            } => task::run_new(
                &ctx,
                task::NewOptions {
                    title,
                    description,
                    priority,
                    kind,
                    parent,
                },
            ),
            Commands::List {
                status,
                priority,
                kind,
                parent,
            } => task::run_list(
                &ctx,
                task::ListOptions {
                    status,
                    priority,
                    kind,
                    parent,
                },
            ),
            Commands::Show { id, subtasks } => task::run_show(&ctx, id, subtasks),
            Commands::Update {
                id,
                title,
                description,
                status,
                priority,
                kind,
            } => task::run_update(
                &ctx,
                id,
                crate::engine::TaskUpdate {
                    title,
                    description,
                    status,
                    priority,
                    kind,
                },
            ),
            Commands::Delete { id, cascade } => task::run_delete(&ctx, id, cascade),
            Commands::Start { id } => task::run_start(&ctx, id),
            Commands::Done { id } => task::run_done(&ctx, id),
            Commands::Next => task::run_next(&ctx),
            Commands::Ready => task::run_ready(&ctx),
            Commands::Reindex => task::run_reindex(&ctx),
            Commands::Relation(cmd) => match cmd {
                RelationCommands::Add {
                    source,
                    kind,
                    target,
                } => relation::run_add(&ctx, source, &kind, target),
                RelationCommands::Remove {
                    source,
                    kind,
                    target,
                } => relation::run_remove(&ctx, source, &kind, target),
                RelationCommands::List { id } => relation::run_list(&ctx, id),
            },
            Commands::Tool(cmd) => match cmd {
                ToolCommands::List => tool::run_list(&ctx),
                ToolCommands::Call { name, args } => tool::run_call(&ctx, &name, &args),
            },
        }
    }
}
