use std::sync::Arc;

use companion_core::model::{ChapterCatalog, ChapterId, ChapterInfo, ChapterProgress, ProgressPatch};

use crate::error::ChapterError;
use crate::progress_store::ProgressStore;

/// A catalog chapter joined with the reader's progress on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterOverview {
    pub info: ChapterInfo,
    pub progress: ChapterProgress,
}

/// Reading-side flows: marking chapters complete and keeping notes.
#[derive(Clone)]
pub struct ChapterService {
    catalog: Arc<ChapterCatalog>,
    store: Arc<ProgressStore>,
}

impl ChapterService {
    #[must_use]
    pub fn new(catalog: Arc<ChapterCatalog>, store: Arc<ProgressStore>) -> Self {
        Self { catalog, store }
    }

    /// Mark a chapter read, crediting its estimated read time.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError::UnknownChapter` if the catalog has no such chapter.
    pub async fn mark_complete(
        &self,
        chapter_id: ChapterId,
    ) -> Result<ChapterProgress, ChapterError> {
        let info = self.info(chapter_id)?;
        let patch = ProgressPatch::new()
            .completed(true)
            .time_spent(info.estimated_minutes);
        Ok(self.store.update_progress(chapter_id, patch).await)
    }

    /// Replace the chapter's notes.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError::UnknownChapter` if the catalog has no such chapter.
    pub async fn save_notes(
        &self,
        chapter_id: ChapterId,
        notes: impl Into<String>,
    ) -> Result<ChapterProgress, ChapterError> {
        self.info(chapter_id)?;
        Ok(self
            .store
            .update_progress(chapter_id, ProgressPatch::new().notes(notes))
            .await)
    }

    /// Every catalog chapter in order, with progress (default if untouched).
    #[must_use]
    pub fn overview(&self) -> Vec<ChapterOverview> {
        self.catalog
            .iter()
            .map(|info| ChapterOverview {
                info: info.clone(),
                progress: self.store.chapter_progress(info.id),
            })
            .collect()
    }

    fn info(&self, chapter_id: ChapterId) -> Result<&ChapterInfo, ChapterError> {
        self.catalog
            .get(chapter_id)
            .ok_or(ChapterError::UnknownChapter(chapter_id))
    }
}
