mod support;

use std::fs;

use serde_json::Value;
use taskline::config::Config;
use taskline::engine::NewTask;
use taskline::git::workspace_fingerprint;
use taskline::index::{CacheStatus, IndexCache, RebuildReason, INDEX_FILE};
use taskline::storage::Storage;
use taskline::task::{BLOCKED_BY, RELATES_TO};

use support::{TestRepo, TestStore};

#[test]
fn deleting_the_index_loses_nothing() {
    let store = TestStore::new();
    let mut engine = store.engine();
    let a = engine.create(NewTask::titled("A")).unwrap().id;
    let b = engine.create(NewTask::titled("B")).unwrap().id;
    engine.add_relation(b, BLOCKED_BY, a).unwrap();
    engine.add_relation(a, RELATES_TO, b).unwrap();
    let entries = engine.list(&Default::default());
    let edges = engine.cache().edges();

    fs::remove_file(store.tasks_dir().join(INDEX_FILE)).unwrap();

    let reopened = store.engine();
    assert_eq!(
        reopened.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::Missing)
    );
    assert_eq!(reopened.list(&Default::default()), entries);
    assert_eq!(reopened.cache().edges(), edges);
    assert!(store.tasks_dir().join(INDEX_FILE).exists());
}

#[test]
fn persisted_index_is_sorted_and_has_no_descriptions() {
    let store = TestStore::new();
    let mut engine = store.engine();
    for title in ["C", "A", "B"] {
        engine
            .create(NewTask {
                description: format!("secret notes for {title}"),
                ..NewTask::titled(title)
            })
            .unwrap();
    }
    engine.add_relation(3, RELATES_TO, 1).unwrap();
    engine.add_relation(2, BLOCKED_BY, 3).unwrap();

    let raw = fs::read_to_string(store.tasks_dir().join(INDEX_FILE)).unwrap();
    assert!(!raw.contains("secret notes"));

    let index: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(index["schema_version"], "taskline.index.v1");
    assert_eq!(index["fingerprint"], "");
    assert_eq!(index["symmetric"], serde_json::json!(["relates_to"]));

    let ids: Vec<u64> = index["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let edges: Vec<(u64, u64, String)> = index["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|edge| {
            (
                edge["source"].as_u64().unwrap(),
                edge["target"].as_u64().unwrap(),
                edge["type"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        edges,
        vec![
            (1, 3, "relates_to".to_string()),
            (2, 3, "blocked_by".to_string()),
            (3, 1, "relates_to".to_string()),
        ]
    );
}

#[test]
fn out_of_band_edit_is_picked_up_after_commit() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    repo.commit_file("README.md", "base\n", "initial commit")?;

    let mut engine = repo.open_engine();
    engine.create(NewTask::titled("Original title"))?;
    drop(engine);
    let committed = repo.commit_all("add task")?;

    // Reopening after the commit restamps the index with the new HEAD.
    let engine = repo.open_engine();
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::FingerprintMismatch)
    );
    assert_eq!(engine.cache().fingerprint(), committed.to_string());
    assert_eq!(engine.cache().fingerprint(), workspace_fingerprint(repo.path()));
    drop(engine);

    let record = repo.tasks_dir().join("1.md");
    let edited = fs::read_to_string(&record)?.replace("Original title", "Edited title");
    fs::write(&record, edited)?;

    // Same HEAD: the index is trusted as-is.
    let engine = repo.open_engine();
    assert_eq!(engine.cache_status(), CacheStatus::Loaded);
    assert_eq!(engine.list(&Default::default())[0].title, "Original title");
    drop(engine);

    let moved = repo.commit_all("edit task")?;
    assert_ne!(committed, moved);

    let engine = repo.open_engine();
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::FingerprintMismatch)
    );
    assert_eq!(engine.list(&Default::default())[0].title, "Edited title");
    assert_eq!(engine.get(1)?.title, "Edited title");
    assert_eq!(engine.cache().fingerprint(), moved.to_string());
    Ok(())
}

#[test]
fn first_commit_invalidates_an_index_built_without_one() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;

    let mut engine = repo.open_engine();
    engine.create(NewTask::titled("before any commit"))?;
    assert_eq!(engine.cache().fingerprint(), "");
    drop(engine);

    repo.commit_all("first")?;
    let engine = repo.open_engine();
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::FingerprintMismatch)
    );
    assert_eq!(engine.list(&Default::default()).len(), 1);
    Ok(())
}

#[test]
fn corrupt_index_is_rebuilt() {
    let store = TestStore::new();
    let mut engine = store.engine();
    engine.create(NewTask::titled("A")).unwrap();
    drop(engine);

    fs::write(store.tasks_dir().join(INDEX_FILE), "{\"schema_version\": 3").unwrap();
    let engine = store.engine();
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::Corrupt)
    );
    assert_eq!(engine.list(&Default::default()).len(), 1);
}

#[test]
fn schema_and_relation_config_changes_force_rebuild() {
    let store = TestStore::new();
    let mut engine = store.engine();
    engine.create(NewTask::titled("A")).unwrap();
    drop(engine);

    let path = store.tasks_dir().join(INDEX_FILE);
    let mut index: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    index["schema_version"] = Value::String("taskline.index.v0".to_string());
    fs::write(&path, serde_json::to_string(&index).unwrap()).unwrap();

    let engine = store.engine();
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::SchemaMismatch)
    );
    drop(engine);

    let mut config = Config::default();
    config.relations.types.push("duplicates".to_string());
    config.relations.symmetric.push("duplicates".to_string());
    let engine = store.engine_with(config, "");
    assert_eq!(
        engine.cache_status(),
        CacheStatus::Rebuilt(RebuildReason::RelationConfigChanged)
    );
}

#[test]
fn rebuild_then_load_matches_a_second_rebuild() {
    let store = TestStore::new();
    let mut engine = store.engine();
    let p = engine.create(NewTask::titled("P")).unwrap().id;
    let c = engine
        .create(NewTask {
            parent_id: Some(p),
            ..NewTask::titled("C")
        })
        .unwrap()
        .id;
    let other = engine.create(NewTask::titled("Other")).unwrap().id;
    engine.add_relation(other, BLOCKED_BY, c).unwrap();
    engine.add_relation(c, RELATES_TO, other).unwrap();
    engine.start(c).unwrap();
    assert_eq!(engine.rebuild_index().unwrap(), 3);

    let mut loaded = IndexCache::open(Storage::new(store.tasks_dir()), [RELATES_TO], "");
    assert_eq!(loaded.load().unwrap(), CacheStatus::Loaded);

    let mut rebuilt = IndexCache::open(Storage::new(store.tasks_dir()), [RELATES_TO], "");
    rebuilt.rebuild().unwrap();

    assert_eq!(loaded.all(), rebuilt.all());
    assert_eq!(loaded.edges(), rebuilt.edges());
    assert_eq!(loaded.next_todo(), rebuilt.next_todo());
}

#[test]
fn hand_written_record_with_dangling_relation_is_tolerated() {
    let store = TestStore::new();
    fs::create_dir_all(store.tasks_dir()).unwrap();
    fs::write(
        store.tasks_dir().join("7.md"),
        r#"+++
id = 7
title = "Imported"
status = "todo"
priority = "high"
type = "task"
created = "2024-03-01 09:30:00"
updated = "2024-03-01"

[[relations]]
type = "blocked_by"
target = 12
+++

Imported from another tracker.
"#,
    )
    .unwrap();
    fs::write(store.tasks_dir().join("notes.txt"), "not a record").unwrap();

    let mut engine = store.engine();
    assert_eq!(engine.list(&Default::default()).len(), 1);
    assert!(engine.cache().get_blockers(7).is_empty());
    assert_eq!(engine.get_next_task().map(|entry| entry.id), Some(7));
    assert_eq!(
        engine.get(7).unwrap().description,
        "Imported from another tracker.\n"
    );

    let next = engine.create(NewTask::titled("after import")).unwrap();
    assert_eq!(next.id, 8);
}
