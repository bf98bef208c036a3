//! Local key-value persistence for drafts, published guides and caches.
//!
//! Everything the app persists is a JSON document under a string key:
//!
//! | Key                | Content                                   |
//! |--------------------|-------------------------------------------|
//! | `guide-draft`      | the guide being edited                    |
//! | `guide:<id>`       | a published guide                         |
//! | `geocodeCacheV2`   | geocoding cache (see [`crate::geocode`])  |
//! | `guide-users`      | registered owners (see [`crate::accounts`]) |
//! | `guide-session`    | the signed-in owner                       |
//!
//! [`JsonFileStore`] keeps all keys in one JSON object on disk and re-reads
//! it on every operation, so several handles on the same file (the guide
//! store and the geocoding cache, say) never overwrite each other's keys.
//! Writes go to a sibling temp file first and are renamed into place.

use crate::guide::{Guide, now_millis, new_id, parse_guide};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DRAFT_KEY: &str = "guide-draft";
pub const PUBLISHED_PREFIX: &str = "guide:";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store file {0} is not a JSON object")]
    NotAnObject(PathBuf),
}

/// Minimal string-keyed storage, the shape of browser `localStorage`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        (**self).remove(key)
    }
    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

/// In-memory store. Used by tests and by `--offline` runs without a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// All keys in one JSON object file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let serde_json::Value::Object(map) = value else {
            return Err(StoreError::NotAnObject(self.path.clone()));
        };
        // Values are stored as strings; anything else is re-serialized.
        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.load()?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries)?;
        }
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.into_keys().collect())
    }
}

/// Drafts and published guides on top of a [`KeyValueStore`].
pub struct GuideStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> GuideStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Save the working draft, stamping `updatedAt`.
    pub fn save_draft(&mut self, guide: &Guide) -> Result<Guide, StoreError> {
        let mut draft = guide.clone();
        draft.updated_at = now_millis();
        self.store.set(DRAFT_KEY, serde_json::to_string(&draft)?)?;
        Ok(draft)
    }

    /// The working draft, if one exists and parses.
    pub fn load_draft(&self) -> Result<Option<Guide>, StoreError> {
        Ok(self.store.get(DRAFT_KEY)?.and_then(|json| parse_guide(&json)))
    }

    /// Publish a guide under its id, assigning one if missing.
    ///
    /// The published copy is also written back as the draft so the editor
    /// keeps the id. Publishing twice overwrites the earlier snapshot.
    pub fn publish(&mut self, guide: &Guide) -> Result<Guide, StoreError> {
        let mut published = guide.clone();
        let id = match published.guide_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_id(),
        };
        published.guide_id = Some(id.clone());
        published.updated_at = now_millis();
        let json = serde_json::to_string(&published)?;
        self.store.set(&published_key(&id), json.clone())?;
        self.store.set(DRAFT_KEY, json)?;
        tracing::info!(guide_id = %id, "published guide");
        Ok(published)
    }

    /// Store an already-published guide verbatim, e.g. one decoded from a
    /// share link, so it can be reopened without the link.
    pub fn store_published(&mut self, id: &str, guide: &Guide) -> Result<(), StoreError> {
        self.store
            .set(&published_key(id), serde_json::to_string(guide)?)
    }

    pub fn load_published(&self, id: &str) -> Result<Option<Guide>, StoreError> {
        Ok(self
            .store
            .get(&published_key(id))?
            .and_then(|json| parse_guide(&json)))
    }

    /// Published guides, optionally restricted to one owner (matched on
    /// owner id or owner email). Newest first.
    pub fn list_published(&self, owner: Option<&str>) -> Result<Vec<Guide>, StoreError> {
        let mut guides = Vec::new();
        for key in self.store.keys()? {
            if !key.starts_with(PUBLISHED_PREFIX) {
                continue;
            }
            let Some(guide) = self.store.get(&key)?.and_then(|json| parse_guide(&json)) else {
                continue;
            };
            let owned = owner.is_none_or(|o| {
                guide.owner_id.as_deref() == Some(o) || guide.owner_email.as_deref() == Some(o)
            });
            if owned {
                guides.push(guide);
            }
        }
        guides.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(guides)
    }

    pub fn delete_published(&mut self, id: &str) -> Result<bool, StoreError> {
        self.store.remove(&published_key(id))
    }
}

pub fn published_key(id: &str) -> String {
    format!("{PUBLISHED_PREFIX}{id}")
}
