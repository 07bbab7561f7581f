use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use companion_core::model::{
    ChapterId, ChapterProgress, ProgressConfig, ProgressPatch, ProgressSummary,
};
use companion_core::summarize;
use storage::repository::{BackendKind, ProgressBackend, ProgressMap, StorageError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Outcome of persistence attempts so far, for an "unsaved changes" indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    /// Remote writes queued but not yet attempted.
    pub pending: usize,
    /// Writes that failed over the lifetime of the store.
    pub failed_writes: u64,
    /// Error of the most recent write, cleared by the next successful one.
    pub last_error: Option<String>,
}

impl SaveStatus {
    /// True when every update so far has reached the backend.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pending == 0 && self.last_error.is_none()
    }

    fn record(&mut self, result: &Result<(), StorageError>) {
        match result {
            Ok(()) => self.last_error = None,
            Err(err) => {
                self.failed_writes = self.failed_writes.saturating_add(1);
                self.last_error = Some(err.to_string());
            }
        }
    }
}

enum WriteCommand {
    Save(ChapterProgress),
    Flush(oneshot::Sender<()>),
}

/// Single background task that sends remote upserts one at a time, in the
/// order they were issued.
struct RemoteWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl RemoteWriter {
    fn spawn(backend: Arc<dyn ProgressBackend>, status: Arc<Mutex<SaveStatus>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let empty = ProgressMap::new();
            while let Some(command) = rx.recv().await {
                match command {
                    WriteCommand::Save(record) => {
                        let result = backend.save(&record, &empty).await;
                        if let Err(err) = &result {
                            error!(
                                chapter = %record.chapter_id,
                                error = %err,
                                "remote progress write failed; update kept in memory only"
                            );
                        }
                        let mut current = lock(&status);
                        current.pending = current.pending.saturating_sub(1);
                        current.record(&result);
                    }
                    WriteCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single source of truth for per-chapter progress within one session.
///
/// Reads are served from memory. Updates are applied to memory first and then
/// persisted best-effort: persistence failures are logged and reflected in
/// [`SaveStatus`], never returned to the caller.
pub struct ProgressStore {
    records: Mutex<ProgressMap>,
    backend: Arc<dyn ProgressBackend>,
    config: ProgressConfig,
    status: Arc<Mutex<SaveStatus>>,
    writer: Option<RemoteWriter>,
    local_writes: tokio::sync::Mutex<()>,
    load_failed: bool,
}

impl ProgressStore {
    /// Load the record set once and build the store around `backend`.
    ///
    /// A failed read starts the session empty; see [`ProgressStore::load_failed`].
    /// Must be called inside a Tokio runtime when `backend` is remote.
    pub async fn open(backend: Arc<dyn ProgressBackend>, config: ProgressConfig) -> Self {
        let (records, load_failed) = match backend.load_all().await {
            Ok(records) => (records, false),
            Err(err) => {
                error!(error = %err, "failed to load saved progress; starting empty");
                (ProgressMap::new(), true)
            }
        };
        debug!(records = records.len(), kind = ?backend.kind(), "progress store opened");

        let status = Arc::new(Mutex::new(SaveStatus::default()));
        let writer = match backend.kind() {
            BackendKind::Remote => Some(RemoteWriter::spawn(
                Arc::clone(&backend),
                Arc::clone(&status),
            )),
            BackendKind::Local => None,
        };

        Self {
            records: Mutex::new(records),
            backend,
            config,
            status,
            writer,
            local_writes: tokio::sync::Mutex::new(()),
            load_failed,
        }
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// True if the initial read failed and the empty state is a fallback
    /// rather than a genuinely new user.
    #[must_use]
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// The stored record, or the default record for `chapter_id`.
    #[must_use]
    pub fn chapter_progress(&self, chapter_id: ChapterId) -> ChapterProgress {
        lock(&self.records)
            .get(&chapter_id)
            .cloned()
            .unwrap_or_else(|| ChapterProgress::new_default(chapter_id))
    }

    /// Snapshot of every record touched so far.
    #[must_use]
    pub fn records(&self) -> ProgressMap {
        lock(&self.records).clone()
    }

    /// Merge `patch` onto the chapter's record and persist the result.
    ///
    /// The in-memory record is updated before any I/O. Local backends are
    /// written before this returns; remote writes are queued behind earlier
    /// ones. Returns the merged record.
    pub async fn update_progress(
        &self,
        chapter_id: ChapterId,
        patch: ProgressPatch,
    ) -> ChapterProgress {
        self.update_with(chapter_id, |_| Some(patch)).await
    }

    /// Read-modify-write: `build` sees the current (or default) record and
    /// returns the patch to apply, all under the records lock. `None` leaves
    /// the record untouched and nothing is persisted.
    pub async fn update_with<F>(&self, chapter_id: ChapterId, build: F) -> ChapterProgress
    where
        F: FnOnce(&ChapterProgress) -> Option<ProgressPatch>,
    {
        let (record, changed) = {
            let mut records = lock(&self.records);
            let current = records
                .get(&chapter_id)
                .cloned()
                .unwrap_or_else(|| ChapterProgress::new_default(chapter_id));
            match build(&current) {
                Some(patch) => {
                    let merged = current.merged(patch);
                    records.insert(chapter_id, merged.clone());
                    (merged, true)
                }
                None => (current, false),
            }
        };

        if changed {
            match &self.writer {
                Some(writer) => self.enqueue_remote(writer, &record),
                None => self.write_local(&record).await,
            }
        }
        record
    }

    /// Cross-chapter summary, recomputed from the current records.
    #[must_use]
    pub fn total_progress(&self) -> ProgressSummary {
        summarize(lock(&self.records).values(), &self.config)
    }

    #[must_use]
    pub fn save_status(&self) -> SaveStatus {
        lock(&self.status).clone()
    }

    /// Wait until every queued remote write has been attempted. Returns
    /// immediately for local backends.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if writer.tx.send(WriteCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn enqueue_remote(&self, writer: &RemoteWriter, record: &ChapterProgress) {
        lock(&self.status).pending += 1;
        if writer.tx.send(WriteCommand::Save(record.clone())).is_err() {
            warn!(chapter = %record.chapter_id, "remote writer stopped; update kept in memory only");
            let mut status = lock(&self.status);
            status.pending = status.pending.saturating_sub(1);
            status.record(&Err(StorageError::Connection("writer stopped".into())));
        }
    }

    async fn write_local(&self, changed: &ChapterProgress) {
        // Snapshot under the write lock so the last writer persists the newest map.
        let _guard = self.local_writes.lock().await;
        let snapshot = self.records();
        let result = self.backend.save(changed, &snapshot).await;
        if let Err(err) = &result {
            error!(
                chapter = %changed.chapter_id,
                error = %err,
                "local progress write failed; update kept in memory only"
            );
        }
        lock(&self.status).record(&result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_core::model::ToolId;
    use storage::repository::InMemoryProgressBackend;

    async fn store_with(backend: &InMemoryProgressBackend) -> ProgressStore {
        ProgressStore::open(Arc::new(backend.clone()), ProgressConfig::default()).await
    }

    #[tokio::test]
    async fn untouched_chapter_reads_as_default() {
        let backend = InMemoryProgressBackend::new(BackendKind::Local);
        let store = store_with(&backend).await;

        let record = store.chapter_progress(ChapterId::new(42));
        assert_eq!(record, ChapterProgress::new_default(ChapterId::new(42)));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn update_merges_onto_existing_record() {
        let seeded = ChapterProgress::new_default(ChapterId::new(1))
            .merged(ProgressPatch::new().quiz_score(3).time_spent(10.0));
        let backend = InMemoryProgressBackend::new(BackendKind::Local).with_records([seeded]);
        let store = store_with(&backend).await;

        let merged = store
            .update_progress(ChapterId::new(1), ProgressPatch::new().completed(true))
            .await;

        assert!(merged.completed);
        assert_eq!(merged.quiz_score, 3);
        assert!((merged.time_spent - 10.0).abs() < f64::EPSILON);
        assert_eq!(store.chapter_progress(ChapterId::new(1)), merged);
    }

    #[tokio::test]
    async fn local_backend_receives_whole_map_before_return() {
        let backend = InMemoryProgressBackend::new(BackendKind::Local);
        let store = store_with(&backend).await;

        store
            .update_progress(ChapterId::new(1), ProgressPatch::new().completed(true))
            .await;
        store
            .update_progress(ChapterId::new(2), ProgressPatch::new().quiz_score(4))
            .await;

        assert_eq!(backend.stored(), store.records());
        assert_eq!(backend.saved().len(), 2);
        assert!(store.save_status().is_clean());
    }

    #[tokio::test]
    async fn failed_local_write_keeps_memory_and_marks_status() {
        let backend = InMemoryProgressBackend::new(BackendKind::Local);
        let store = store_with(&backend).await;
        backend.fail_saves(true);

        let merged = store
            .update_progress(ChapterId::new(3), ProgressPatch::new().notes("draft"))
            .await;

        assert_eq!(store.chapter_progress(ChapterId::new(3)), merged);
        assert!(backend.stored().is_empty());
        let status = store.save_status();
        assert_eq!(status.failed_writes, 1);
        assert!(!status.is_clean());

        backend.fail_saves(false);
        store
            .update_progress(ChapterId::new(3), ProgressPatch::new().notes("final"))
            .await;
        assert!(store.save_status().is_clean());
        assert_eq!(store.save_status().failed_writes, 1);
    }

    #[tokio::test]
    async fn remote_writes_arrive_in_issue_order() {
        let backend = InMemoryProgressBackend::new(BackendKind::Remote);
        let store = store_with(&backend).await;

        for score in 1..=5 {
            store
                .update_progress(ChapterId::new(1), ProgressPatch::new().quiz_score(score))
                .await;
        }
        store.flush().await;

        let scores: Vec<u32> = backend.saved().iter().map(|r| r.quiz_score).collect();
        assert_eq!(scores, vec![1, 2, 3, 4, 5]);
        assert_eq!(backend.stored()[&ChapterId::new(1)].quiz_score, 5);
        assert_eq!(store.save_status().pending, 0);
    }

    #[tokio::test]
    async fn failed_remote_write_is_swallowed() {
        let backend = InMemoryProgressBackend::new(BackendKind::Remote);
        let store = store_with(&backend).await;
        backend.fail_saves(true);

        let merged = store
            .update_progress(ChapterId::new(2), ProgressPatch::new().completed(true))
            .await;
        store.flush().await;

        assert!(store.chapter_progress(ChapterId::new(2)).completed);
        assert_eq!(merged.chapter_id, ChapterId::new(2));
        let status = store.save_status();
        assert_eq!(status.failed_writes, 1);
        assert!(status.last_error.is_some());
        assert!(backend.stored().is_empty());
    }

    #[tokio::test]
    async fn failed_load_starts_empty_and_is_flagged() {
        let backend = InMemoryProgressBackend::new(BackendKind::Remote).with_records([
            ChapterProgress::new_default(ChapterId::new(1))
                .merged(ProgressPatch::new().completed(true)),
        ]);
        backend.fail_loads(true);
        let store = store_with(&backend).await;

        assert!(store.load_failed());
        assert!(store.records().is_empty());
        assert_eq!(store.total_progress().completed_chapters, 0);
    }

    #[tokio::test]
    async fn summary_reflects_latest_records() {
        let backend = InMemoryProgressBackend::new(BackendKind::Local);
        let store = store_with(&backend).await;
        let audit = ToolId::new("audit").unwrap();

        for (id, completed, score) in [(1, true, 5), (2, false, 3), (3, true, 5)] {
            store
                .update_progress(
                    ChapterId::new(id),
                    ProgressPatch::new()
                        .completed(completed)
                        .quiz_score(score)
                        .tools_used(vec![audit.clone()]),
                )
                .await;
        }

        let summary = store.total_progress();
        assert_eq!(summary.completed_chapters, 2);
        assert_eq!(summary.overall_progress, 52);
        assert_eq!(summary.tools_used, 1);
    }

    #[tokio::test]
    async fn flush_on_local_store_returns_immediately() {
        let backend = InMemoryProgressBackend::new(BackendKind::Local);
        let store = store_with(&backend).await;
        store.flush().await;
        assert_eq!(store.backend_kind(), BackendKind::Local);
    }
}
