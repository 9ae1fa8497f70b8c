mod config;
mod executions;
pub mod kv;
mod tasks;
pub mod types;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::platform::{NativePlatform, Platform};
use kv::{KeyValueStore, SqliteKvStore};

pub const TASKS_KEY: &str = "grok_tasks";
pub const EXECUTIONS_KEY: &str = "grok_executions";
pub const API_CONFIG_KEY: &str = "grok_api_config";

/// Most recent executions kept across all tasks.
pub const MAX_EXECUTIONS: usize = 50;

/// Typed access to the task, execution and API-config collections.
///
/// Every collection is stored as one JSON document under its own key and is
/// rewritten whole on each change. Cloning shares the underlying store.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Opens (or creates) `store.db` inside `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        }
        NativePlatform::restrict_dir_permissions(data_dir);

        let db_path = data_dir.join("store.db");
        let kv = SqliteKvStore::open(&db_path)
            .with_context(|| format!("opening store {}", db_path.display()))?;
        info!("Task store opened at {}", db_path.display());
        Ok(Self::new(Arc::new(kv)))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get_item(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("stored entry '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv.set_item(key, &raw)
    }
}

fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// In-memory store for tests.
#[cfg(test)]
pub fn test_store() -> LocalStore {
    LocalStore::new(Arc::new(kv::MemoryKvStore::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kv::MemoryKvStore;
    use types::{ApiConfig, ExecutionStatus, NewExecution, NewTask, TaskStatus, TaskUpdate};

    fn new_task(name: &str) -> NewTask {
        NewTask {
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            prompt: format!("prompt for {}", name),
            schedule: "every morning".to_string(),
            status: TaskStatus::Active,
            template_id: None,
        }
    }

    fn execution_for(task_id: &str, minutes_ago: i64) -> NewExecution {
        NewExecution {
            task_id: task_id.to_string(),
            status: ExecutionStatus::Success,
            result: Some(format!("ran {} minutes ago", minutes_ago)),
            error: None,
            executed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    /// Delegates to a memory store but refuses writes to one key.
    struct FailingWrites {
        inner: MemoryKvStore,
        failing_key: &'static str,
    }

    impl KeyValueStore for FailingWrites {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            if key == self.failing_key {
                anyhow::bail!("quota exceeded");
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.inner.remove_item(key)
        }
    }

    // --- Tasks ---

    #[test]
    fn empty_store_reads_empty_collections() {
        let store = test_store();
        assert!(store.get_tasks().unwrap().is_empty());
        assert!(store.get_executions().unwrap().is_empty());
    }

    #[test]
    fn create_task_assigns_unique_ids_and_active_status() {
        let store = test_store();
        let mut ids = std::collections::HashSet::new();
        for i in 0..20 {
            let task = store.create_task(new_task(&format!("t{}", i))).unwrap();
            assert_eq!(task.status, TaskStatus::Active);
            assert_eq!(task.created_at, task.updated_at);
            assert!(ids.insert(task.id));
        }
        assert_eq!(store.get_tasks().unwrap().len(), 20);
    }

    #[test]
    fn get_task_finds_by_id() {
        let store = test_store();
        let created = store.create_task(new_task("lookup")).unwrap();
        let found = store.get_task(&created.id).unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.get_task("ghost").unwrap().is_none());
    }

    #[test]
    fn update_task_merges_fields_and_bumps_timestamp() {
        let store = test_store();
        let created = store.create_task(new_task("orig")).unwrap();
        let updated = store
            .update_task(
                &created.id,
                TaskUpdate {
                    name: Some("renamed".to_string()),
                    ..TaskUpdate::status(TaskStatus::Paused)
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.status, TaskStatus::Paused);
        assert_eq!(updated.prompt, created.prompt);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.get_task(&created.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn update_unknown_task_returns_none() {
        let store = test_store();
        store.create_task(new_task("only")).unwrap();
        let res = store
            .update_task("ghost", TaskUpdate::status(TaskStatus::Paused))
            .unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn delete_task_cascades_to_its_executions_only() {
        let store = test_store();
        let doomed = store.create_task(new_task("doomed")).unwrap();
        let kept = store.create_task(new_task("kept")).unwrap();
        store.add_execution(execution_for(&doomed.id, 3)).unwrap();
        store.add_execution(execution_for(&doomed.id, 2)).unwrap();
        store.add_execution(execution_for(&kept.id, 1)).unwrap();

        assert!(store.delete_task(&doomed.id).unwrap());

        let tasks = store.get_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, kept.id);
        let execs = store.get_executions().unwrap();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].task_id, kept.id);
    }

    #[test]
    fn delete_unknown_task_returns_false() {
        let store = test_store();
        store.create_task(new_task("stay")).unwrap();
        assert!(!store.delete_task("ghost").unwrap());
        assert_eq!(store.get_tasks().unwrap().len(), 1);
    }

    #[test]
    fn delete_leaves_dangling_executions_when_second_write_fails() {
        let seed = test_store();
        let task = seed.create_task(new_task("half")).unwrap();
        seed.add_execution(execution_for(&task.id, 1)).unwrap();

        // Move the seeded documents into a store that rejects execution writes.
        let failing = FailingWrites {
            inner: MemoryKvStore::new(),
            failing_key: EXECUTIONS_KEY,
        };
        for key in [TASKS_KEY, EXECUTIONS_KEY] {
            let raw = seed.kv.get_item(key).unwrap().unwrap();
            failing.inner.set_item(key, &raw).unwrap();
        }
        let store = LocalStore::new(Arc::new(failing));

        assert!(store.delete_task(&task.id).is_err());
        assert!(store.get_tasks().unwrap().is_empty());
        assert_eq!(store.get_executions().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_collection_is_an_error() {
        let kv = MemoryKvStore::new();
        kv.set_item(TASKS_KEY, "{not json").unwrap();
        let store = LocalStore::new(Arc::new(kv));
        let err = store.get_tasks().unwrap_err();
        assert!(err.to_string().contains(TASKS_KEY));
    }

    // --- Executions ---

    #[test]
    fn task_executions_are_newest_first() {
        let store = test_store();
        store.add_execution(execution_for("a", 10)).unwrap();
        store.add_execution(execution_for("a", 1)).unwrap();
        store.add_execution(execution_for("b", 0)).unwrap();
        store.add_execution(execution_for("a", 5)).unwrap();

        let history = store.get_task_executions("a").unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].executed_at > history[1].executed_at);
        assert!(history[1].executed_at > history[2].executed_at);
    }

    #[test]
    fn fifty_first_execution_evicts_the_oldest() {
        let store = test_store();
        // Oldest first: 100 minutes ago .. 51 minutes ago.
        for minutes_ago in (51..=100).rev() {
            store.add_execution(execution_for("t", minutes_ago)).unwrap();
        }
        assert_eq!(store.get_executions().unwrap().len(), MAX_EXECUTIONS);

        let newest = store.add_execution(execution_for("t", 0)).unwrap();
        let execs = store.get_executions().unwrap();
        assert_eq!(execs.len(), MAX_EXECUTIONS);
        assert!(execs.iter().any(|e| e.id == newest.id));
        assert!(
            !execs
                .iter()
                .any(|e| e.result.as_deref() == Some("ran 100 minutes ago"))
        );
        assert!(
            execs
                .iter()
                .any(|e| e.result.as_deref() == Some("ran 99 minutes ago"))
        );
    }

    #[test]
    fn eviction_follows_timestamps_not_insertion_order() {
        let store = test_store();
        for minutes_ago in 1..=50 {
            store.add_execution(execution_for("t", minutes_ago)).unwrap();
        }
        // Inserted last but stamped earliest: it is the one evicted.
        let skewed = store.add_execution(execution_for("t", 1000)).unwrap();
        let execs = store.get_executions().unwrap();
        assert_eq!(execs.len(), MAX_EXECUTIONS);
        assert!(!execs.iter().any(|e| e.id == skewed.id));
    }

    // --- API config ---

    #[test]
    fn api_config_defaults_on_first_read() {
        let store = test_store();
        assert_eq!(store.get_api_config().unwrap(), ApiConfig::default());
    }

    #[test]
    fn api_config_roundtrip() {
        let store = test_store();
        let cfg = ApiConfig {
            api_key: "sk-test".to_string(),
            api_base: "https://example.test/v1".to_string(),
            model: "grok-beta".to_string(),
        };
        store.save_api_config(&cfg).unwrap();
        assert_eq!(store.get_api_config().unwrap(), cfg);
    }

    #[test]
    fn clear_api_config_removes_the_entry() {
        let store = test_store();
        store
            .save_api_config(&ApiConfig {
                api_key: "sk-test".to_string(),
                ..ApiConfig::default()
            })
            .unwrap();
        store.clear_api_config().unwrap();
        assert!(store.kv.get_item(API_CONFIG_KEY).unwrap().is_none());
        assert_eq!(store.get_api_config().unwrap(), ApiConfig::default());
    }

    #[test]
    fn open_creates_data_dir_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("grok");
        let id = {
            let store = LocalStore::open(&data_dir).unwrap();
            store.create_task(new_task("durable")).unwrap().id
        };
        let store = LocalStore::open(&data_dir).unwrap();
        assert!(store.get_task(&id).unwrap().is_some());
    }
}
