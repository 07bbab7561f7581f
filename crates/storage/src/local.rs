//! Device-local persistence: the whole progress map lives in one JSON blob.

use async_trait::async_trait;
use companion_core::model::{ChapterId, ChapterProgress};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::repository::{BackendKind, BlobStore, ProgressBackend, ProgressMap, StorageError};

/// Key the progress blob is stored under.
pub const DEFAULT_PROGRESS_KEY: &str = "book-progress";

/// Serialize the record set to its blob form: a JSON object mapping
/// chapter id to record.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_progress_map(records: &ProgressMap) -> Result<String, StorageError> {
    serde_json::to_string(records).map_err(|err| StorageError::Serialization(err.to_string()))
}

/// Parse a blob written by [`encode_progress_map`].
///
/// The map key wins over a record's own `chapterId` when they disagree.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the blob is not a valid map.
pub fn decode_progress_map(raw: &str) -> Result<ProgressMap, StorageError> {
    let parsed: BTreeMap<ChapterId, ChapterProgress> =
        serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(parsed
        .into_iter()
        .map(|(id, mut record)| {
            record.chapter_id = id;
            (id, record)
        })
        .collect())
}

/// Progress backend over a [`BlobStore`].
#[derive(Clone)]
pub struct LocalProgressBackend<B> {
    blobs: B,
    key: String,
}

impl<B: BlobStore> LocalProgressBackend<B> {
    #[must_use]
    pub fn new(blobs: B) -> Self {
        Self::with_key(blobs, DEFAULT_PROGRESS_KEY)
    }

    #[must_use]
    pub fn with_key(blobs: B, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }
}

#[async_trait]
impl<B: BlobStore> ProgressBackend for LocalProgressBackend<B> {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn load_all(&self) -> Result<ProgressMap, StorageError> {
        let Some(raw) = self.blobs.get(&self.key).await? else {
            return Ok(ProgressMap::new());
        };

        match decode_progress_map(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                // A corrupt blob means "nothing saved yet"; the next update overwrites it.
                warn!(key = %self.key, error = %err, "discarding unreadable local progress");
                Ok(ProgressMap::new())
            }
        }
    }

    async fn save(
        &self,
        changed: &ChapterProgress,
        all: &ProgressMap,
    ) -> Result<(), StorageError> {
        let blob = encode_progress_map(all)?;
        self.blobs.put(&self.key, &blob).await?;
        debug!(chapter = %changed.chapter_id, records = all.len(), "wrote local progress");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryBlobStore;
    use companion_core::model::{ProgressPatch, ToolId};

    fn sample_map() -> ProgressMap {
        let mut map = ProgressMap::new();
        for (id, patch) in [
            (1, ProgressPatch::new().completed(true).time_spent(15.0)),
            (
                3,
                ProgressPatch::new()
                    .quiz_score(4)
                    .quiz_completed(true)
                    .tools_used(vec![ToolId::new("audit").unwrap()])
                    .notes("revisit pricing"),
            ),
        ] {
            let record = ChapterProgress::new_default(ChapterId::new(id)).merged(patch);
            map.insert(record.chapter_id, record);
        }
        map
    }

    #[test]
    fn blob_round_trip_reproduces_map() {
        let map = sample_map();
        let blob = encode_progress_map(&map).unwrap();
        assert!(blob.starts_with("{\"1\":"));
        assert_eq!(decode_progress_map(&blob).unwrap(), map);
    }

    #[test]
    fn map_key_overrides_embedded_id() {
        let decoded = decode_progress_map(r#"{"2":{"chapterId":7,"completed":true}}"#).unwrap();
        let record = &decoded[&ChapterId::new(2)];
        assert_eq!(record.chapter_id, ChapterId::new(2));
        assert!(record.completed);
    }

    #[tokio::test]
    async fn missing_blob_loads_empty() {
        let backend = LocalProgressBackend::new(InMemoryBlobStore::new());
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_blob_loads_empty() {
        let blobs = InMemoryBlobStore::new();
        blobs.put(DEFAULT_PROGRESS_KEY, "{not json").await.unwrap();
        let backend = LocalProgressBackend::new(blobs);
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_survives_reload() {
        let blobs = InMemoryBlobStore::new();
        let map = sample_map();
        let changed = map[&ChapterId::new(3)].clone();

        LocalProgressBackend::new(blobs.clone())
            .save(&changed, &map)
            .await
            .unwrap();

        let reloaded = LocalProgressBackend::new(blobs).load_all().await.unwrap();
        assert_eq!(reloaded, map);
    }

    #[tokio::test]
    async fn custom_key_is_isolated() {
        let blobs = InMemoryBlobStore::new();
        let map = sample_map();
        let changed = map[&ChapterId::new(1)].clone();
        LocalProgressBackend::with_key(blobs.clone(), "other")
            .save(&changed, &map)
            .await
            .unwrap();

        assert!(LocalProgressBackend::new(blobs.clone()).load_all().await.unwrap().is_empty());
        assert!(blobs.get("other").await.unwrap().is_some());
    }
}
