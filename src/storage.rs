//! Durable task storage
//!
//! Every task lives in its own human-readable record under the task
//! directory. The records are the only source of truth; everything else in
//! the directory is derived or bookkeeping.
//!
//! # Directory Structure
//!
//! ```text
//! .tasks/                       # Task directory (tracked)
//!   1.md                        # One record per task, named by ID
//!   2.md
//!   last-id                     # Highest ID ever assigned
//!   index.json                  # Derived index cache (rebuildable)
//! ```
//!
//! # Record Format
//!
//! ```text
//! +++
//! id = 2
//! parent = 1
//! title = "Write docs"
//! status = "todo"
//! priority = "high"
//! type = "task"
//! created = "2026-10-16T10:00:00Z"
//! updated = "2026-10-16T10:00:00Z"
//!
//! [[relations]]
//! type = "blocked_by"
//! target = 3
//! +++
//!
//! Description body.
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{Priority, Relation, Status, Task, TaskId};

/// Default task directory name, relative to the project root
pub const TASKS_DIR: &str = ".tasks";

/// Extension of task record files
pub const RECORD_EXT: &str = "md";

/// Name of the ID high-water mark file
pub const LAST_ID_FILE: &str = "last-id";

const FENCE: &str = "+++";

/// Naive timestamp layouts accepted in addition to RFC 3339, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// File-per-task storage rooted at a task directory
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Create a storage handle. Nothing is touched on disk until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to the task directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the record for a task
    pub fn record_path(&self, id: TaskId) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }

    /// Path to the ID high-water mark
    pub fn last_id_file(&self) -> PathBuf {
        self.dir.join(LAST_ID_FILE)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Create the task directory if needed (idempotent)
    pub fn ensure_ready(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Write a task record atomically, replacing any previous version
    pub fn save(&self, task: &Task) -> Result<()> {
        self.ensure_ready()?;
        let content = render_record(task)?;
        write_atomic(&self.record_path(task.id), content.as_bytes())?;
        debug!(task_id = task.id, "saved task record");
        Ok(())
    }

    /// Load a single task record
    pub fn load(&self, id: TaskId) -> Result<Task> {
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id));
            }
            Err(err) => return Err(err.into()),
        };
        let task = parse_record(&path, &content)?;
        if task.id != id {
            return Err(Error::MalformedRecord {
                path,
                message: format!("record declares id {} but is stored as {id}", task.id),
            });
        }
        Ok(task)
    }

    /// Remove a task record
    pub fn delete(&self, id: TaskId) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => {
                debug!(task_id = id, "deleted task record");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Load every readable record, sorted by ID
    ///
    /// A missing directory is an empty store. Records that fail to parse are
    /// skipped with a warning so one bad file cannot hide the rest.
    pub fn load_all(&self) -> Result<Vec<Task>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut tasks = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            let Some(id) = record_id_from_path(&path) else {
                continue;
            };
            match self.load(id) {
                Ok(task) => tasks.push(task),
                Err(Error::NotFound(_)) => continue,
                Err(err) => {
                    warn!("Skipping task record {}: {}", path.display(), err);
                }
            }
        }

        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    // =========================================================================
    // ID high-water mark
    // =========================================================================

    /// Highest ID ever assigned by this store (0 if none recorded)
    pub fn high_water(&self) -> Result<TaskId> {
        let path = self.last_id_file();
        match fs::read_to_string(&path) {
            Ok(content) => match content.trim().parse::<TaskId>() {
                Ok(id) => Ok(id),
                Err(err) => {
                    warn!("Ignoring unreadable {}: {}", path.display(), err);
                    Ok(0)
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Record that `id` has been assigned; never lowers the mark
    pub fn record_high_water(&self, id: TaskId) -> Result<()> {
        if id <= self.high_water()? {
            return Ok(());
        }
        self.ensure_ready()?;
        write_atomic(&self.last_id_file(), format!("{id}\n").as_bytes())
    }
}

/// Atomically write data to a file
///
/// Writes to a temporary sibling, syncs it, then renames it over the
/// target, so readers see either the old or the new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    Ok(())
}

/// Parse a record file name (`<id>.md`) into its task ID
fn record_id_from_path(path: &Path) -> Option<TaskId> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    stem.parse::<TaskId>().ok().filter(|id| *id > 0)
}

// =============================================================================
// Record encoding
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct RecordHeader {
    id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<TaskId>,
    title: String,
    status: Status,
    priority: Priority,
    #[serde(rename = "type")]
    kind: String,
    created: String,
    updated: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    relations: Vec<Relation>,
}

fn render_record(task: &Task) -> Result<String> {
    let header = RecordHeader {
        id: task.id,
        parent: task.parent_id,
        title: task.title.clone(),
        status: task.status,
        priority: task.priority,
        kind: task.kind.clone(),
        created: format_timestamp(&task.created_at),
        updated: format_timestamp(&task.updated_at),
        relations: task.relations.clone(),
    };
    let header = toml::to_string(&header)?;

    let mut out = String::with_capacity(header.len() + task.description.len() + 16);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&header);
    if !header.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push_str("\n\n");
    out.push_str(&task.description);
    Ok(out)
}

fn parse_record(path: &Path, content: &str) -> Result<Task> {
    let malformed = |message: String| Error::MalformedRecord {
        path: path.to_path_buf(),
        message,
    };

    let rest = strip_fence_line(content)
        .ok_or_else(|| malformed("missing opening +++ fence".to_string()))?;

    // A fence line can also appear inside a multi-line header string, so the
    // header ends at the first fence whose preceding text parses as TOML.
    let mut first_err = None;
    let mut parsed = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if line.trim_end_matches(['\r', '\n']) != FENCE {
            continue;
        }
        match toml::from_str::<RecordHeader>(&rest[..start]) {
            Ok(header) => {
                parsed = Some((header, offset));
                break;
            }
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }
    let (header, body_start) = match (parsed, first_err) {
        (Some(parsed), _) => parsed,
        (None, Some(err)) => return Err(malformed(format!("invalid header: {err}"))),
        (None, None) => return Err(malformed("missing closing +++ fence".to_string())),
    };
    let body = &rest[body_start..];
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    if header.id == 0 {
        return Err(malformed("id must be positive".to_string()));
    }
    if header.title.trim().is_empty() {
        return Err(malformed("title cannot be empty".to_string()));
    }
    let created_at = parse_timestamp(&header.created)
        .ok_or_else(|| malformed(format!("unrecognized created timestamp '{}'", header.created)))?;
    let updated_at = parse_timestamp(&header.updated)
        .ok_or_else(|| malformed(format!("unrecognized updated timestamp '{}'", header.updated)))?;

    Ok(Task {
        id: header.id,
        parent_id: header.parent,
        title: header.title,
        description: body.to_string(),
        status: header.status,
        priority: header.priority,
        kind: header.kind,
        created_at,
        updated_at,
        relations: header.relations,
    })
}

fn strip_fence_line(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix(FENCE)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Format a timestamp the way records store it
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a record timestamp in any of the accepted layouts
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| parsed.and_utc())
}
