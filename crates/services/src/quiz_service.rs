use std::sync::Arc;

use companion_core::model::{ChapterCatalog, ChapterId, ChapterProgress, ProgressPatch, QuizOutcome};

use crate::error::QuizError;
use crate::progress_store::ProgressStore;

/// Quiz submission flow. Each submission replaces the chapter's previous score.
#[derive(Clone)]
pub struct QuizService {
    catalog: Arc<ChapterCatalog>,
    store: Arc<ProgressStore>,
}

impl QuizService {
    #[must_use]
    pub fn new(catalog: Arc<ChapterCatalog>, store: Arc<ProgressStore>) -> Self {
        Self { catalog, store }
    }

    /// Grade `answers` against the chapter's key and record the score.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownChapter` or `QuizError::NoAnswerKey`.
    pub async fn submit_answers(
        &self,
        chapter_id: ChapterId,
        answers: &[u8],
    ) -> Result<QuizOutcome, QuizError> {
        let info = self
            .catalog
            .get(chapter_id)
            .ok_or(QuizError::UnknownChapter(chapter_id))?;
        let key = info
            .quiz
            .as_ref()
            .ok_or(QuizError::NoAnswerKey(chapter_id))?;

        let outcome = key.grade(answers);
        self.record(chapter_id, outcome.correct).await;
        Ok(outcome)
    }

    /// Record a score graded elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownChapter`, or `QuizError::ScoreOutOfRange`
    /// if `score` exceeds the chapter's question count.
    pub async fn submit_score(
        &self,
        chapter_id: ChapterId,
        score: u32,
    ) -> Result<ChapterProgress, QuizError> {
        let info = self
            .catalog
            .get(chapter_id)
            .ok_or(QuizError::UnknownChapter(chapter_id))?;
        if score > info.question_count {
            return Err(QuizError::ScoreOutOfRange {
                chapter: chapter_id,
                score,
                max: info.question_count,
            });
        }
        Ok(self.record(chapter_id, score).await)
    }

    async fn record(&self, chapter_id: ChapterId, score: u32) -> ChapterProgress {
        let patch = ProgressPatch::new().quiz_score(score).quiz_completed(true);
        self.store.update_progress(chapter_id, patch).await
    }
}
