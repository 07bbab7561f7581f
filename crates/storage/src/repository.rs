use async_trait::async_trait;
use companion_core::model::{ChapterId, ChapterProgress};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Every known chapter record for the current user, keyed by chapter.
pub type ProgressMap = BTreeMap<ChapterId, ChapterProgress>;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Which persistence path a backend represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Durable storage on this device; the whole map is rewritten per update.
    Local,
    /// Hosted record store keyed by `(user_id, chapter_id)`.
    Remote,
}

/// Persistence contract for chapter progress.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Read every stored record for the session's user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached or returns
    /// data that cannot be decoded.
    async fn load_all(&self) -> Result<ProgressMap, StorageError>;

    /// Persist `changed`. Local backends write `all` wholesale; remote
    /// backends upsert only `changed`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write is rejected or cannot be sent.
    async fn save(&self, changed: &ChapterProgress, all: &ProgressMap)
    -> Result<(), StorageError>;
}

/// String-keyed blob storage (the device-local "local storage").
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Simple in-memory blob store for tests and throwaway sessions.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// In-memory backend that records every save, with switchable failures.
///
/// Stands in for either persistence path in tests.
#[derive(Clone)]
pub struct InMemoryProgressBackend {
    kind: BackendKind,
    records: Arc<Mutex<ProgressMap>>,
    saves: Arc<Mutex<Vec<ChapterProgress>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryProgressBackend {
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            records: Arc::new(Mutex::new(ProgressMap::new())),
            saves: Arc::new(Mutex::new(Vec::new())),
            fail_loads: Arc::new(AtomicBool::new(false)),
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed the backend as if a previous session had saved `records`.
    #[must_use]
    pub fn with_records(self, records: impl IntoIterator<Item = ChapterProgress>) -> Self {
        if let Ok(mut guard) = self.records.lock() {
            for record in records {
                guard.insert(record.chapter_id, record);
            }
        }
        self
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Every record successfully saved, in arrival order.
    #[must_use]
    pub fn saved(&self) -> Vec<ChapterProgress> {
        self.saves.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Current persisted state.
    #[must_use]
    pub fn stored(&self) -> ProgressMap {
        self.records.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProgressBackend for InMemoryProgressBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn load_all(&self) -> Result<ProgressMap, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("simulated read failure".into()));
        }
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(
        &self,
        changed: &ChapterProgress,
        all: &ProgressMap,
    ) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                status: 503,
                body: "simulated write failure".into(),
            });
        }
        {
            let mut guard = self
                .records
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            match self.kind {
                BackendKind::Local => guard.clone_from(all),
                BackendKind::Remote => {
                    guard.insert(changed.chapter_id, changed.clone());
                }
            }
        }
        self.saves
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .push(changed.clone());
        Ok(())
    }
}

/// The progress backend chosen for one session, behind a trait object for
/// easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressBackend>,
}

impl Storage {
    #[must_use]
    pub fn in_memory(kind: BackendKind) -> Self {
        Self {
            progress: Arc::new(InMemoryProgressBackend::new(kind)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.progress.kind()
    }
}
