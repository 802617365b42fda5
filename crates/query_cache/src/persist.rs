//! Durable snapshots of selected cache entries.
//!
//! Only navigation-level keys are written: the leagues-with-teams
//! payload, league fixture lists and hot fixtures. Storage failures are
//! logged and never reach callers.

use chrono::{DateTime, Utc};
use common::config::PersistenceConfig;
use common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::keys::{CacheKey, ResourceKind};

/// Bump when the envelope layout changes; older blobs are discarded.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Resource kinds whose entries are written to storage.
pub const PERSISTED_KINDS: [ResourceKind; 3] = [
    ResourceKind::LeaguesWithTeams,
    ResourceKind::League,
    ResourceKind::HotFixtures,
];

/// A raw blob read back from storage.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Storage-level name, passed back to [`SnapshotStore::delete`].
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Backing storage for snapshots.
pub trait SnapshotStore: Send + Sync {
    fn read_all(&self) -> Result<Vec<StoredBlob>, Error>;
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error>;
    fn delete(&self, name: &str) -> Result<(), Error>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn read_all(&self) -> Result<Vec<StoredBlob>, Error> {
        (**self).read_all()
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        (**self).write(key, bytes)
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        (**self).delete(name)
    }
}

/// File name for a key: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read_all(&self) -> Result<Vec<StoredBlob>, Error> {
        let mut blobs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            match fs::read(&path) {
                Ok(bytes) => blobs.push(StoredBlob { name, bytes }),
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }
        Ok(blobs)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.path_for_key(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store keyed by cache key. Counts writes.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place raw bytes under a name, bypassing the envelope.
    pub fn insert_raw(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(name.to_string(), bytes.into());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

fn poisoned() -> Error {
    Error::Storage("snapshot store lock poisoned".into())
}

impl SnapshotStore for MemorySnapshotStore {
    fn read_all(&self) -> Result<Vec<StoredBlob>, Error> {
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(blobs
            .iter()
            .map(|(name, bytes)| StoredBlob {
                name: name.clone(),
                bytes: bytes.clone(),
            })
            .collect())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.remove(name);
        Ok(())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    key: &'a str,
    saved_at: DateTime<Utc>,
    value: &'a Value,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    key: String,
    saved_at: DateTime<Utc>,
    value: Value,
}

/// Counts from one restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub corrupt: usize,
    pub expired: usize,
    pub disallowed: usize,
}

/// Connects the cache to snapshot storage.
pub struct PersistenceBridge {
    store: Option<Box<dyn SnapshotStore>>,
    max_age: Duration,
    pending: Mutex<Vec<JoinHandle<bool>>>,
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("enabled", &self.store.is_some())
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl PersistenceBridge {
    pub fn new(store: Box<dyn SnapshotStore>, max_age: Duration) -> Self {
        Self {
            store: Some(store),
            max_age,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// A bridge that never reads or writes.
    pub fn disabled() -> Self {
        Self {
            store: None,
            max_age: Duration::ZERO,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// File-backed bridge, or a disabled one when storage is off or
    /// cannot be opened.
    pub fn from_config(cfg: &PersistenceConfig) -> Self {
        if !cfg.enabled {
            info!("Snapshot persistence disabled");
            return Self::disabled();
        }
        match FileSnapshotStore::open(&cfg.dir) {
            Ok(store) => {
                info!("Snapshot persistence at {}", cfg.dir);
                Self::new(Box::new(store), Duration::from_secs(cfg.max_age_secs))
            }
            Err(e) => {
                warn!("Snapshot storage unavailable ({}); continuing in memory only", e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_persisted(&self, key: &CacheKey) -> bool {
        !key.is_absent() && key.kind().is_some_and(|kind| PERSISTED_KINDS.contains(&kind))
    }

    /// Write one entry. Returns whether a snapshot was written.
    pub fn persist(&self, key: &CacheKey, value: &Value) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        if !self.is_persisted(key) {
            return false;
        }

        let envelope = EnvelopeRef {
            version: SNAPSHOT_VERSION,
            key: key.as_str(),
            saved_at: Utc::now(),
            value,
        };
        let written = serde_json::to_vec(&envelope)
            .map_err(Error::from)
            .and_then(|bytes| store.write(key.as_str(), &bytes));
        match written {
            Ok(()) => {
                debug!("Persisted snapshot {}", key);
                true
            }
            Err(e) => {
                warn!("Failed to persist snapshot {}: {}", key, e);
                false
            }
        }
    }

    /// Write one entry on the blocking pool so async callers never wait
    /// on storage. Outside a runtime the write happens inline.
    pub fn persist_in_background(self: &Arc<Self>, key: &CacheKey, value: Arc<Value>) {
        if !self.is_enabled() || !self.is_persisted(key) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.persist(key, &value);
            return;
        };

        let bridge = Arc::clone(self);
        let key = key.clone();
        let write = handle.spawn_blocking(move || bridge.persist(&key, &value));
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.retain(|task| !task.is_finished());
                pending.push(write);
            }
            Err(_) => warn!("Snapshot write queue poisoned; write left untracked"),
        }
    }

    /// Wait for background writes started so far. Returns how many
    /// of them wrote a snapshot.
    pub async fn flush(&self) -> usize {
        let tasks = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        };
        let mut written = 0;
        for task in tasks {
            match task.await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!("Snapshot write task failed: {}", e),
            }
        }
        written
    }

    /// Load every usable snapshot into the cache with its original age.
    ///
    /// Unreadable, outdated, expired or non-allow-listed blobs are
    /// deleted and counted.
    pub fn restore(&self, cache: &QueryCache) -> RestoreReport {
        let mut report = RestoreReport::default();
        let Some(store) = self.store.as_ref() else {
            return report;
        };
        let blobs = match store.read_all() {
            Ok(blobs) => blobs,
            Err(e) => {
                warn!("Could not read snapshots: {}", e);
                return report;
            }
        };

        let now = Utc::now();
        for blob in blobs {
            let envelope: SnapshotEnvelope = match serde_json::from_slice(&blob.bytes) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("Discarding unreadable snapshot {}: {}", blob.name, e);
                    report.corrupt += 1;
                    self.discard(store.as_ref(), &blob.name);
                    continue;
                }
            };
            if envelope.version != SNAPSHOT_VERSION {
                warn!(
                    "Discarding snapshot {} with version {}",
                    blob.name, envelope.version
                );
                report.corrupt += 1;
                self.discard(store.as_ref(), &blob.name);
                continue;
            }

            let key = CacheKey::from_raw(envelope.key);
            if !self.is_persisted(&key) {
                report.disallowed += 1;
                self.discard(store.as_ref(), &blob.name);
                continue;
            }

            let age = (now - envelope.saved_at).to_std().unwrap_or(Duration::ZERO);
            if age > self.max_age {
                debug!("Snapshot {} expired ({:?} old)", key, age);
                report.expired += 1;
                self.discard(store.as_ref(), &blob.name);
                continue;
            }

            cache.set_aged(key, envelope.value, age);
            report.restored += 1;
        }

        info!(
            "Restored {} snapshots ({} corrupt, {} expired, {} disallowed)",
            report.restored, report.corrupt, report.expired, report.disallowed
        );
        report
    }

    fn discard(&self, store: &dyn SnapshotStore, name: &str) {
        if let Err(e) = store.delete(name) {
            warn!("Failed to delete snapshot {}: {}", name, e);
        }
    }
}
