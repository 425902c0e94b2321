//! Single-document file store

use super::{ConfigStore, UpsertAtomicity, check_lookup, check_scope, prepare_upsert};
use crate::entry::{ConfigEntry, Entries};
use crate::error::{Error, Result};
use crate::format::{FileFormat, JsonFormat};
use crate::security;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use time::OffsetDateTime;
use tokio::sync::{Mutex, OnceCell};

const DOCUMENT_VERSION: u32 = 1;

/// Write locks shared by every store in this process, keyed by absolute path
static WRITE_LOCKS: LazyLock<DashMap<PathBuf, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

impl StoreDocument {
    fn empty() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            updated_at: OffsetDateTime::now_utc(),
            entries: Vec::new(),
        }
    }

    fn merge(&mut self, batch: Vec<ConfigEntry>) {
        for entry in batch {
            match self
                .entries
                .iter_mut()
                .find(|e| e.key() == entry.key() && e.scope() == entry.scope())
            {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Store that keeps every entry in one document file.
///
/// A save rewrites the whole file through a temp file and rename, so readers
/// see either the previous or the new document. Saves through any `FileStore`
/// on the same path in this process are serialized; separate processes
/// writing one file are not coordinated. The file is readable by its owner
/// only (Unix).
///
/// # Example
///
/// ```rust,no_run
/// use confstore::store::FileStore;
///
/// let store = FileStore::new("/var/lib/my-app/config.json");
/// ```
pub struct FileStore<F: FileFormat = JsonFormat> {
    path: Arc<PathBuf>,
    format: F,
    lock_key: PathBuf,
    write_lock: Arc<Mutex<()>>,
    dir_ready: OnceCell<()>,
}

impl FileStore<JsonFormat> {
    /// JSON-backed store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_format(path, JsonFormat::new())
    }
}

impl<F: FileFormat> FileStore<F> {
    /// Store at `path` using the given file format
    pub fn with_format(path: impl Into<PathBuf>, format: F) -> Self {
        let path = path.into();
        let lock_key = lock_key(&path);
        let write_lock = WRITE_LOCKS.entry(lock_key.clone()).or_default().clone();
        Self {
            path: Arc::new(path),
            format,
            lock_key,
            write_lock,
            dir_ready: OnceCell::new(),
        }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreDocument> {
        let path = Arc::clone(&self.path);
        let format = self.format.clone();
        let document = run_blocking(move || format.read::<StoreDocument>(&path)).await?;

        match document {
            Some(doc) if doc.version > DOCUMENT_VERSION => Err(Error::Parse(format!(
                "'{}' has document version {}, newer than supported version {}",
                self.path.display(),
                doc.version,
                DOCUMENT_VERSION
            ))),
            Some(doc) => Ok(doc),
            None => Ok(StoreDocument::empty()),
        }
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        self.dir_ready
            .get_or_try_init(|| async {
                let Some(parent) = self.path.parent().map(Path::to_path_buf) else {
                    return Ok(());
                };
                if parent.as_os_str().is_empty() {
                    return Ok(());
                }
                run_blocking(move || {
                    if !parent.exists() {
                        info!("Creating configuration directory {}", parent.display());
                    }
                    security::ensure_secure_dir(&parent)
                })
                .await
            })
            .await
            .map(|_| ())
    }
}

impl<F: FileFormat> Drop for FileStore<F> {
    fn drop(&mut self) {
        // Last store on this path: the registry holds the only other handle
        WRITE_LOCKS.remove_if(&self.lock_key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

impl<F: FileFormat> std::fmt::Debug for FileStore<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("format", &self.format.extension())
            .finish_non_exhaustive()
    }
}

/// Run blocking file I/O off the async executor
async fn run_blocking<T, W>(work: W) -> Result<T>
where
    T: Send + 'static,
    W: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Runtime(std::io::Error::other(e)))?
}

#[async_trait]
impl<F: FileFormat> ConfigStore for FileStore<F> {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        let scope = check_lookup(key, scope)?;
        let document = self.load().await?;
        Ok(document
            .entries
            .into_iter()
            .find(|e| e.key() == key && e.scope() == scope))
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        let scope = check_scope(scope)?;
        let document = self.load().await?;
        Ok(document
            .entries
            .into_iter()
            .filter(|e| e.scope() == scope)
            .map(|e| (e.key().to_string(), e))
            .collect())
    }

    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()> {
        let batch = prepare_upsert(entries, scope)?;
        if batch.is_empty() {
            return Ok(());
        }

        self.ensure_parent_dir().await?;
        let _guard = self.write_lock.lock().await;

        let mut document = self.load().await?;
        let count = batch.len();
        document.merge(batch);

        let path = Arc::clone(&self.path);
        let format = self.format.clone();
        run_blocking(move || format.write(&path, &document)).await?;

        debug!(
            "Wrote {count} configuration entries to {}",
            self.path.display()
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn atomicity(&self) -> UpsertAtomicity {
        UpsertAtomicity::Transactional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("config.json"));

        assert!(store.get_all(None).await.unwrap().is_empty());
        assert!(store.get("a.b", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/config.json");
        let store = FileStore::new(&path);

        store
            .upsert(&[ConfigEntry::new("a.b", "1")], Some("prod"))
            .await
            .unwrap();

        assert!(path.exists());
        let entry = store.get("a.b", Some("prod")).await.unwrap().unwrap();
        assert_eq!(entry.value(), "1");
    }

    #[tokio::test]
    async fn test_entries_survive_new_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        FileStore::new(&path)
            .upsert(&[ConfigEntry::new("a.b", "1"), ConfigEntry::new("a.c", "2")], None)
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        let all = reopened.get_all(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a.c"].value(), "2");
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileStore::new(&path);
        store
            .upsert(&[ConfigEntry::new("a.b", "true")], None)
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert!(raw["updated_at"].is_string());
        assert_eq!(raw["entries"][0]["key"], "a.b");
        assert!(raw["entries"][0].get("scope").is_none());
    }

    #[tokio::test]
    async fn test_newer_document_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "updated_at": "2024-01-01T00:00:00Z", "entries": []}"#,
        )
        .unwrap();

        let err = FileStore::new(&path).get_all(None).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_stores_on_one_path_keep_every_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let first = Arc::new(FileStore::new(&path));
        let second = Arc::new(FileStore::new(&path));

        let handles: Vec<_> = [("first", first), ("second", second)]
            .into_iter()
            .map(|(name, store)| {
                tokio::spawn(async move {
                    for round in 0..25 {
                        let key = format!("{name}.r{round}");
                        store
                            .upsert(&[ConfigEntry::new(key, round.to_string())], None)
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let all = FileStore::new(&path).get_all(None).await.unwrap();
        assert_eq!(all.len(), 50);
        assert_eq!(all["first.r24"].value(), "24");
        assert_eq!(all["second.r24"].value(), "24");
    }

    #[test]
    fn test_stores_on_one_path_share_a_write_lock() {
        let dir = tempdir().unwrap();
        let a = FileStore::new(dir.path().join("config.json"));
        let b = FileStore::new(dir.path().join("config.json"));
        let other = FileStore::new(dir.path().join("other.json"));

        assert!(Arc::ptr_eq(&a.write_lock, &b.write_lock));
        assert!(!Arc::ptr_eq(&a.write_lock, &other.write_lock));
    }

    #[cfg(feature = "toml")]
    #[tokio::test]
    async fn test_toml_format() {
        use crate::format::TomlFormat;

        let dir = tempdir().unwrap();
        let store = FileStore::with_format(dir.path().join("config.toml"), TomlFormat);
        store
            .upsert(&[ConfigEntry::new("a.b", "\"x\"")], Some("s"))
            .await
            .unwrap();
        let entry = store.get("a.b", Some("s")).await.unwrap().unwrap();
        assert_eq!(entry.value(), "\"x\"");
    }
}
