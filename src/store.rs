//! Local persistence of the article cache.
//!
//! The cache is one logical record under a fixed key. Storage technology is
//! abstracted behind [`KeyValueStore`]; [`FileStore`] keeps one JSON file per
//! key in a directory and [`MemoryStore`] keeps everything in process.
//!
//! [`ArticleStore`] is the adapter the refresh pipeline talks to. It never
//! surfaces an error: unreadable data loads as an empty collection and
//! failed writes are only logged.

use crate::error::BoxError;
use crate::models::Article;
use itertools::Itertools;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Key the article collection is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "jctc_articles_cache_v1";

/// Minimal string key-value persistence.
pub trait KeyValueStore {
    /// Read a value; `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError>;
    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), BoxError>;
}

/// Directory-backed store: each key lives in `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "debug", skip_all, fields(dir = %self.dir.display(), %key))]
    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a half-written cache
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), bytes = value.len(), "Wrote cache file");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, mostly useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // a poisoned map is still a usable map
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Article collection persisted under a single key.
#[derive(Debug)]
pub struct ArticleStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> ArticleStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Load the cached collection.
    ///
    /// Never fails: a read error from the backend, an absent key or a value
    /// that is not a JSON array all yield an empty list (logged).
    /// Individually malformed entries are skipped and repeated ids keep
    /// their first occurrence.
    ///
    /// # Returns
    ///
    /// The stored articles in stored order. Use [`ArticleStore::stored`] for
    /// the newest-first view.
    #[instrument(level = "debug", skip_all, fields(key = %self.key))]
    pub async fn load(&self) -> Vec<Article> {
        let raw = match self.backend.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No cached articles");
                return Vec::new();
            }
            Err(e) => {
                error!(error = %e, "Failed to read cache; treating as empty");
                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Cache is corrupt; treating as empty");
                return Vec::new();
            }
        };

        let total = entries.len();
        let articles: Vec<Article> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Article>(entry) {
                Ok(article) => Some(article),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed cache entry");
                    None
                }
            })
            .unique_by(|a| a.id.clone())
            .collect();

        debug!(total, loaded = articles.len(), "Loaded cached articles");
        articles
    }

    /// Cached collection, newest first.
    pub async fn stored(&self) -> Vec<Article> {
        let mut articles = self.load().await;
        articles.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));
        articles
    }

    /// Persist the collection. Failures are logged, never returned.
    #[instrument(level = "debug", skip_all, fields(key = %self.key, count = articles.len()))]
    pub async fn save(&self, articles: &[Article]) {
        let json = match serde_json::to_string(articles) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize cache");
                return;
            }
        };
        match self.backend.set(&self.key, &json).await {
            Ok(()) => debug!("Saved cached articles"),
            Err(e) => error!(error = %e, "Failed to save cache"),
        }
    }

    /// Wipe the stored collection.
    pub async fn clear(&self) {
        match self.backend.remove(&self.key).await {
            Ok(()) => info!(key = %self.key, "Cleared article cache"),
            Err(e) => error!(key = %self.key, error = %e, "Failed to clear cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawArticle, Translation};

    fn article(url: &str, first_seen: i64) -> Article {
        Article::discovered(
            RawArticle {
                title: Some(format!("Title {url}")),
                url: Some(url.to_string()),
                date: Some("2025-05-06".into()),
                ..Default::default()
            },
            first_seen,
        )
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, BoxError> {
            Err("disk on fire".into())
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), BoxError> {
            Err("disk on fire".into())
        }
        async fn remove(&self, _key: &str) -> Result<(), BoxError> {
            Err("disk on fire".into())
        }
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let store = ArticleStore::new(MemoryStore::new());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_is_empty() {
        let store = ArticleStore::new(MemoryStore::new().with_entry(DEFAULT_STORAGE_KEY, "{not json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_malformed_entries_and_duplicates() {
        let raw = r#"[
            {"id": "a", "title": "A", "url": "https://x/a", "date": "", "first_seen": 2, "last_updated": 2},
            {"id": 42},
            {"id": "a", "title": "A again", "url": "https://x/a", "date": "", "first_seen": 9, "last_updated": 9},
            {"title": "B", "url": "https://x/b", "date": "", "first_seen": 1, "last_updated": 1}
        ]"#;
        let store = ArticleStore::new(MemoryStore::new().with_entry(DEFAULT_STORAGE_KEY, raw));
        let loaded = store.load().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].title, "A");
        assert_eq!(loaded[1].id, "https://x/b");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = ArticleStore::new(MemoryStore::new());
        let mut enriched = article("https://x/a", 5);
        enriched.apply_translation(
            Translation {
                summary_cn: "总结".into(),
                ..Default::default()
            },
            6,
        );
        let articles = vec![enriched, article("https://x/b", 4)];
        store.save(&articles).await;
        assert_eq!(store.load().await, articles);
    }

    #[tokio::test]
    async fn test_stored_is_newest_first() {
        let store = ArticleStore::new(MemoryStore::new());
        store
            .save(&[article("https://x/a", 1), article("https://x/c", 3), article("https://x/b", 2)])
            .await;
        let ids: Vec<String> = store.stored().await.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["https://x/c", "https://x/b", "https://x/a"]);
    }

    #[tokio::test]
    async fn test_clear_removes_collection() {
        let store = ArticleStore::new(MemoryStore::new());
        store.save(&[article("https://x/a", 1)]).await;
        store.clear().await;
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_broken_backend_never_errors() {
        let store = ArticleStore::new(BrokenStore);
        assert!(store.load().await.is_empty());
        store.save(&[article("https://x/a", 1)]).await;
        store.clear().await;
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStore::new(dir.path().join("nested"));
        assert_eq!(backend.get("k").await.unwrap(), None);

        backend.set("k", "[]").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested/k.json").exists());
        assert!(!dir.path().join("nested/.k.json.tmp").exists());

        backend.remove("k").await.unwrap();
        backend.remove("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_article_store_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArticleStore::with_key(FileStore::new(dir.path()), "custom");
        store.save(&[article("https://x/a", 1)]).await;
        assert!(dir.path().join("custom.json").exists());
        assert_eq!(store.load().await.len(), 1);
    }
}
