//! Durable state. Every record is one JSON document under a logical key.
//!
//! The typed stores never fail a read: an unreadable or corrupt document is
//! logged and treated as "no prior state". Writes are last-write-wins; there is
//! exactly one writer per profile. Sharing a profile between processes would
//! need version stamps on `kv.updated_at` and is not supported.

#[cfg(test)]
pub mod memory;
pub mod queries;

#[cfg(test)]
pub use memory::MemoryStore;

use crate::badges::Badge;
use crate::catalog::Task;
use crate::progression::UserProgress;
use crate::verification::HistoryEntry;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const PROGRESS_KEY: &str = "user-progress";
pub const HISTORY_KEY: &str = "completion-history";
pub const BADGES_KEY: &str = "earned-badges";
pub const TASKS_PREFIX: &str = "daily-tasks:";
pub const HISTORY_LIMIT: usize = 50;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

pub trait ProgressStore {
    fn load_progress(&self) -> UserProgress;
    fn save_progress(&self, progress: &UserProgress) -> Result<()>;
}

pub trait TaskStore {
    fn load_tasks(&self, date: NaiveDate) -> Option<Vec<Task>>;
    fn save_tasks(&self, date: NaiveDate, tasks: &[Task]) -> Result<()>;
    fn task_dates(&self) -> Vec<NaiveDate>;
}

pub trait HistoryStore {
    /// Newest first.
    fn load_history(&self) -> Vec<HistoryEntry>;
    fn append_history(&self, entry: HistoryEntry) -> Result<()>;
}

pub trait BadgeStore {
    fn load_badges(&self) -> Vec<Badge>;
    fn save_badges(&self, badges: &[Badge]) -> Result<()>;
}

pub fn tasks_key(date: NaiveDate) -> String {
    format!("{TASKS_PREFIX}{}", date.format("%Y-%m-%d"))
}

impl<S: KeyValueStore + ?Sized> ProgressStore for S {
    fn load_progress(&self) -> UserProgress {
        read_json(self, PROGRESS_KEY).unwrap_or_default()
    }

    fn save_progress(&self, progress: &UserProgress) -> Result<()> {
        write_json(self, PROGRESS_KEY, progress)
    }
}

impl<S: KeyValueStore + ?Sized> TaskStore for S {
    fn load_tasks(&self, date: NaiveDate) -> Option<Vec<Task>> {
        read_json(self, &tasks_key(date))
    }

    fn save_tasks(&self, date: NaiveDate, tasks: &[Task]) -> Result<()> {
        write_json(self, &tasks_key(date), &tasks)
    }

    fn task_dates(&self) -> Vec<NaiveDate> {
        self.keys_with_prefix(TASKS_PREFIX)
            .unwrap_or_else(|error| {
                warn!(error = %error, "failed to list daily task keys");
                Vec::new()
            })
            .iter()
            .filter_map(|key| key.strip_prefix(TASKS_PREFIX))
            .filter_map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .collect()
    }
}

impl<S: KeyValueStore + ?Sized> HistoryStore for S {
    fn load_history(&self) -> Vec<HistoryEntry> {
        read_json(self, HISTORY_KEY).unwrap_or_default()
    }

    fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        let history = std::iter::once(entry)
            .chain(self.load_history())
            .take(HISTORY_LIMIT)
            .collect::<Vec<_>>();
        write_json(self, HISTORY_KEY, &history)
    }
}

impl<S: KeyValueStore + ?Sized> BadgeStore for S {
    fn load_badges(&self) -> Vec<Badge> {
        read_json(self, BADGES_KEY).unwrap_or_default()
    }

    fn save_badges(&self, badges: &[Badge]) -> Result<()> {
        write_json(self, BADGES_KEY, &badges)
    }
}

fn read_json<S, T>(store: &S, key: &str) -> Option<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(error) => {
            warn!(key, error = %error, "failed to read record, starting fresh");
            return None;
        }
    };

    serde_json::from_str(&raw)
        .map_err(|error| {
            warn!(key, error = %error, "corrupt record, starting fresh");
        })
        .ok()
}

fn write_json<S, T>(store: &S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let content = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize record: {key}"))?;
    store.put(key, &content)
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(queries::SELECT_KV, params![key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key: {key}"))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                queries::UPSERT_KV,
                params![key, value, Utc::now().timestamp()],
            )
            .with_context(|| format!("Failed to write key: {key}"))?;

        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut statement = self.conn.prepare(queries::SELECT_KEYS_WITH_PREFIX)?;

        let keys = statement
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to list keys")?;

        Ok(keys)
    }
}
