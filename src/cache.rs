//! Disk-backed per-engine cache stores.
//!
//! Each engine owns one [`CacheStore`] per project root. The store is a JSON
//! map written atomically (tmp file + rename) under an exclusive lock file, so
//! concurrent invocations never see a torn file. Updates merge at entry
//! granularity: the last writer of a given key wins.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{QualityError, Result};

/// Bumped when the on-disk layout changes; older files are discarded.
const CACHE_VERSION: u32 = 2;

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// Stable short key for a project root.
pub fn project_key(project_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_root.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// SHA-256 of file content, hex encoded.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile<V> {
    version: u32,
    project_root: PathBuf,
    updated_at: DateTime<Utc>,
    entries: BTreeMap<String, V>,
}

/// A JSON map persisted for one engine and one project root.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    namespace: String,
    project_root: PathBuf,
}

impl CacheStore {
    /// Creates a store under `dir` for `namespace` (usually the engine name).
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, namespace: &str, project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            namespace: namespace.to_string(),
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the cache file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.json",
            self.namespace,
            project_key(&self.project_root)
        ))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut p = self.path().into_os_string();
        p.push(TMP_SUFFIX);
        PathBuf::from(p)
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path().into_os_string();
        p.push(LOCK_SUFFIX);
        PathBuf::from(p)
    }

    fn open_lock(&self) -> Result<File> {
        fs::create_dir_all(&self.dir)?;
        let lock_path = self.lock_path();
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| QualityError::cache(lock_path, e.to_string()))
    }

    /// Reads every entry. Missing, corrupted or incompatible files yield an empty map.
    pub fn load<V: DeserializeOwned>(&self) -> BTreeMap<String, V> {
        let path = self.path();
        if !path.exists() {
            return BTreeMap::new();
        }

        let lock = match self.open_lock() {
            Ok(lock) => lock,
            Err(e) => {
                warn!("Cache unavailable: {}", e);
                return BTreeMap::new();
            }
        };
        if let Err(e) = FileExt::lock_shared(&lock) {
            warn!("Failed to acquire cache lock {}: {}", path.display(), e);
            return BTreeMap::new();
        }

        let entries = self.read_unlocked(&path);
        let _ = FileExt::unlock(&lock);
        entries
    }

    fn read_unlocked<V: DeserializeOwned>(&self, path: &Path) -> BTreeMap<String, V> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read cache {}: {}", path.display(), e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str::<CacheFile<V>>(&content) {
            Ok(file) if file.version == CACHE_VERSION => file.entries,
            Ok(file) => {
                debug!(
                    "Discarding cache {} with version {} (current: {})",
                    path.display(),
                    file.version,
                    CACHE_VERSION
                );
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    "Corrupted cache file at {}: {}. Starting fresh.",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        }
    }

    /// Reads one entry. Callers looking up many keys should [`load`](Self::load) once.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.load::<V>().remove(key)
    }

    /// Inserts or replaces one entry, merging with whatever is on disk now.
    pub fn put<V: Serialize + DeserializeOwned>(&self, key: &str, value: V) -> Result<()> {
        self.put_many([(key.to_string(), value)])
    }

    /// Inserts or replaces several entries under one lock and one write.
    pub fn put_many<V, I>(&self, updates: I) -> Result<()>
    where
        V: Serialize + DeserializeOwned,
        I: IntoIterator<Item = (String, V)>,
    {
        let mut updates = updates.into_iter().peekable();
        if updates.peek().is_none() {
            return Ok(());
        }

        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)
            .map_err(|e| QualityError::cache(self.lock_path(), e.to_string()))?;

        let path = self.path();
        let mut entries: BTreeMap<String, V> = self.read_unlocked(&path);
        entries.extend(updates);

        let file = CacheFile {
            version: CACHE_VERSION,
            project_root: self.project_root.clone(),
            updated_at: Utc::now(),
            entries,
        };
        let json = serde_json::to_string(&file)?;

        let tmp_path = self.tmp_path();
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, &path)?;

        let _ = FileExt::unlock(&lock);
        Ok(())
    }

    /// Removes the cache file for this project.
    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if !path.exists() {
            return Ok(());
        }
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)
            .map_err(|e| QualityError::cache(self.lock_path(), e.to_string()))?;
        fs::remove_file(&path)?;
        let _ = FileExt::unlock(&lock);
        Ok(())
    }
}
