//! Content record store: the JSON content database.
//!
//! The [`ContentStore`] owns the single persisted [`ContentDatabase`]. Every
//! mutation rewrites the whole file, so all read-modify-write cycles go
//! through one async mutex: concurrent document workflows queue on the lock
//! instead of overwriting each other's changes.
//!
//! **File format:** `{ "lastUpdated", "entries": { "<relative path>": ... },
//! "config"? }`, paths relative to the directory holding the store file.

mod paths;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use contentcurator_shared::{ContentDatabase, ContentEntry, CurationError, QualityDimensions, Result};

pub use paths::{absolute_key, canonical_key, normalize_path, relative_key};

/// On-disk shape of the database, borrowing from the in-memory one.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRef<'a> {
    last_updated: DateTime<Utc>,
    entries: BTreeMap<String, &'a ContentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Persisted {
    last_updated: DateTime<Utc>,
    #[serde(default)]
    entries: BTreeMap<String, ContentEntry>,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

/// Durable, path-keyed store of per-document state.
pub struct ContentStore {
    path: PathBuf,
    root: PathBuf,
    db: Mutex<ContentDatabase>,
}

impl ContentStore {
    /// Open the store at `path`, creating an empty one if the file does not exist.
    pub async fn open(path: &Path) -> Result<Self> {
        let path = normalize_path(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| CurationError::validation(format!("invalid store path {path:?}")))?;

        let store = Self {
            path,
            root,
            db: Mutex::new(ContentDatabase::default()),
        };
        store.load().await?;
        Ok(store)
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the store file, replacing the in-memory database.
    ///
    /// A missing file is not an error: an empty database is created and
    /// persisted in its place.
    pub async fn load(&self) -> Result<()> {
        let mut db = self.db.lock().await;

        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let persisted: Persisted = serde_json::from_str(&raw).map_err(|e| {
                    CurationError::Storage(format!("failed to parse {}: {e}", self.path.display()))
                })?;
                let entries = persisted
                    .entries
                    .into_iter()
                    .map(|(key, entry)| (absolute_key(&key, &self.root), entry))
                    .collect();
                *db = ContentDatabase {
                    last_updated: persisted.last_updated,
                    entries,
                    config: persisted.config,
                };
                debug!(path = %self.path.display(), entries = db.entries.len(), "content database loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no content database found, creating an empty one");
                self.commit(&mut db, ContentDatabase::default()).await?;
            }
            Err(e) => return Err(CurationError::storage_io(&self.path, e)),
        }
        Ok(())
    }

    /// Persist the in-memory database.
    pub async fn save(&self) -> Result<()> {
        let mut db = self.db.lock().await;
        self.write(&mut db).await
    }

    /// Write the full database to disk. Callers hold the lock.
    async fn write(&self, db: &mut ContentDatabase) -> Result<()> {
        db.last_updated = Utc::now();
        let persisted = PersistedRef {
            last_updated: db.last_updated,
            entries: db
                .entries
                .iter()
                .map(|(key, entry)| (relative_key(Path::new(key), &self.root), entry))
                .collect(),
            config: db.config.as_ref(),
        };
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| CurationError::Storage(format!("failed to serialize database: {e}")))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CurationError::storage_io(&self.root, e))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CurationError::storage_io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CurationError::storage_io(&self.path, e))?;

        debug!(entries = db.entries.len(), "content database saved");
        Ok(())
    }

    /// A copy of the whole database.
    pub async fn snapshot(&self) -> ContentDatabase {
        self.db.lock().await.clone()
    }

    /// The entry for `path`, if any.
    pub async fn get_entry(&self, path: &Path) -> Result<Option<ContentEntry>> {
        let key = canonical_key(path)?;
        Ok(self.db.lock().await.entries.get(&key).cloned())
    }

    /// All entries with their canonical paths, in path order.
    pub async fn entries(&self) -> Vec<(PathBuf, ContentEntry)> {
        self.db
            .lock()
            .await
            .entries
            .iter()
            .map(|(key, entry)| (PathBuf::from(key), entry.clone()))
            .collect()
    }

    /// Create an entry for a newly discovered document. Returns `true` when
    /// the entry was created, `false` when it already existed.
    pub async fn ensure_entry(&self, path: &Path, targets: QualityDimensions) -> Result<bool> {
        let key = canonical_key(path)?;
        let mut db = self.db.lock().await;
        if db.entries.contains_key(&key) {
            return Ok(false);
        }
        let mut next = db.clone();
        next.entries.insert(key, ContentEntry::new(targets));
        self.commit(&mut db, next).await?;
        Ok(true)
    }

    /// Replace the entry at `path` with `update(current)` and persist.
    pub async fn update_entry<F>(&self, path: &Path, update: F) -> Result<ContentEntry>
    where
        F: FnOnce(Option<ContentEntry>) -> ContentEntry,
    {
        let key = canonical_key(path)?;
        let mut db = self.db.lock().await;
        let updated = update(db.entries.get(&key).cloned());
        let mut next = db.clone();
        next.entries.insert(key, updated.clone());
        self.commit(&mut db, next).await?;
        Ok(updated)
    }

    /// Mutate the existing entry at `path` and persist.
    pub async fn modify_entry<F>(&self, path: &Path, modify: F) -> Result<ContentEntry>
    where
        F: FnOnce(&mut ContentEntry),
    {
        let key = canonical_key(path)?;
        let mut db = self.db.lock().await;
        let mut next = db.clone();
        let entry = next
            .entries
            .get_mut(&key)
            .ok_or_else(|| CurationError::entry_not_found(path))?;
        modify(entry);
        let updated = entry.clone();
        self.commit(&mut db, next).await?;
        Ok(updated)
    }

    /// Record the pipeline configuration alongside the entries.
    pub async fn set_config(&self, config: serde_json::Value) -> Result<()> {
        let mut db = self.db.lock().await;
        let mut next = db.clone();
        next.config = Some(config);
        self.commit(&mut db, next).await
    }

    /// Persist `next`, then make it the in-memory database. A failed write
    /// leaves `current` as it was.
    async fn commit(&self, current: &mut ContentDatabase, mut next: ContentDatabase) -> Result<()> {
        self.write(&mut next).await?;
        *current = next;
        Ok(())
    }
}
