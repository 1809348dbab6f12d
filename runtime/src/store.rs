//! Persistent clip and settings store backed by SQLite.
//!
//! One `kv` table holds JSON values under fixed keys. Writes replace the
//! previous value; there is no history.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use model_relay::{ModelRecord, RelayError, Settings};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Key of the last extracted record.
pub const CLIP_KEY: &str = "clip";

/// Key of the user settings.
pub const SETTINGS_KEY: &str = "settings";

/// Last-write-wins storage for the transfer record.
pub trait RecordStore: Send + Sync {
    /// Persist a record. Records without a title are rejected.
    fn save(&self, record: &ModelRecord) -> Result<()>;
    /// The last saved record, if any.
    fn load(&self) -> Result<Option<ModelRecord>>;
}

/// Storage for user settings.
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or the defaults when none were saved.
    fn load_settings(&self) -> Result<Settings>;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
}

/// SQLite implementation of both stores.
pub struct SqliteStore {
    db: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a store file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::Store(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let db = Connection::open(path).map_err(|e| {
            RelayError::Store(format!("failed to open {}: {e}", path.display()))
        })?;
        Self::init(db, Some(path.to_path_buf()))
    }

    /// A throwaway store that lives as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::init(db, None)
    }

    /// Open the default store at `~/.model-relay/relay.db`.
    pub fn default_store() -> Result<Self> {
        Self::open(&default_store_path())
    }

    fn init(db: Connection, path: Option<PathBuf>) -> Result<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );",
        )
        .context("failed to create kv table")?;
        Ok(Self {
            db: Mutex::new(db),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.lock()
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, saved_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write '{key}'"))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .lock()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read '{key}'"))?;
        Ok(value)
    }

    /// When a key was last written.
    pub fn saved_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .lock()
            .query_row(
                "SELECT saved_at FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    /// Forget the saved record.
    pub fn clear_clip(&self) -> Result<()> {
        self.lock()
            .execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![CLIP_KEY])?;
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn save(&self, record: &ModelRecord) -> Result<()> {
        record.validate()?;
        let json = serde_json::to_string(record)?;
        self.put(CLIP_KEY, &json)?;
        tracing::debug!("saved clip '{}'", record.title);
        Ok(())
    }

    fn load(&self) -> Result<Option<ModelRecord>> {
        match self.get(CLIP_KEY)? {
            Some(json) => {
                let record = serde_json::from_str(&json).context("stored clip is corrupt")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

impl SettingsStore for SqliteStore {
    fn load_settings(&self) -> Result<Settings> {
        match self.get(SETTINGS_KEY)? {
            Some(json) => serde_json::from_str(&json).context("stored settings are corrupt"),
            None => Ok(Settings::default()),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.put(SETTINGS_KEY, &serde_json::to_string(settings)?)
    }
}

/// `~/.model-relay/relay.db`, or under the temp dir without a home.
pub fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".model-relay")
        .join("relay.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ModelRecord {
        ModelRecord {
            title: "Cat Ears".into(),
            trigger_groups: vec![
                vec!["red hair".into(), "blue eyes".into()],
                vec!["masterpiece".into()],
            ],
            ..ModelRecord::default()
        }
    }

    #[test]
    fn test_save_and_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("relay.db")).unwrap();
        assert!(store.load().unwrap().is_none());

        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), Some(record()));
        assert!(store.saved_at(CLIP_KEY).unwrap().is_some());
    }

    #[test]
    fn test_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&record()).unwrap();
        let mut other = record();
        other.title = "Fox Tail".into();
        store.save(&other).unwrap();
        assert_eq!(store.load().unwrap().unwrap().title, "Fox Tail");
    }

    #[test]
    fn test_title_less_record_is_never_persisted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.save(&ModelRecord::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::TitleNotFound)
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_settings_default_then_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("relay.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_settings().unwrap(), Settings::default());

        let settings = Settings {
            target_lang: "ja".into(),
            translate_enabled: false,
            ..Settings::default()
        };
        store.save_settings(&settings).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_settings().unwrap(), settings);
    }

    #[test]
    fn test_unopenable_path_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = SqliteStore::open(&blocker.join("relay.db")).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Store(_))
        ));
    }

    #[test]
    fn test_clear_clip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&record()).unwrap();
        store.clear_clip().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
