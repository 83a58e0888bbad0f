//! Next-task selection over the index cache.
//!
//! Candidates are todo tasks without subtasks and without open blockers.
//! Subtasks whose parent is already in progress form the first tier, so an
//! active subtree is finished before unrelated work is picked up. Each tier
//! is ordered by priority, then creation time, then ID.

use std::cmp::Ordering;

use crate::index::IndexCache;
use crate::task::{IndexEntry, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Subtask of an in-progress parent
    ActiveSubtree,
    Other,
}

/// The head of the ready queue, if any
pub fn next_todo(cache: &IndexCache) -> Option<&IndexEntry> {
    candidates(cache)
        .into_iter()
        .min_by(|a, b| compare(a, b))
        .map(|(_, entry)| entry)
}

/// Every candidate, in selection order
pub fn ready(cache: &IndexCache) -> Vec<&IndexEntry> {
    let mut queue = candidates(cache);
    queue.sort_by(compare);
    queue.into_iter().map(|(_, entry)| entry).collect()
}

pub fn tier_of(cache: &IndexCache, entry: &IndexEntry) -> Tier {
    let parent_active = entry
        .parent_id
        .and_then(|parent| cache.get_entry(parent))
        .map(|parent| parent.status == Status::InProgress)
        .unwrap_or(false);
    if parent_active {
        Tier::ActiveSubtree
    } else {
        Tier::Other
    }
}

fn is_candidate(cache: &IndexCache, entry: &IndexEntry) -> bool {
    entry.status == Status::Todo && !cache.has_subtasks(entry.id) && !cache.is_blocked(entry.id)
}

fn candidates(cache: &IndexCache) -> Vec<(Tier, &IndexEntry)> {
    cache
        .all()
        .into_iter()
        .filter(|entry| is_candidate(cache, entry))
        .map(|entry| (tier_of(cache, entry), entry))
        .collect()
}

fn compare(a: &(Tier, &IndexEntry), b: &(Tier, &IndexEntry)) -> Ordering {
    let (tier_a, a) = a;
    let (tier_b, b) = b;
    tier_a
        .cmp(tier_b)
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
