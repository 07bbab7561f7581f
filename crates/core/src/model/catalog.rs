use std::collections::HashSet;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChapterId, QuizKey};

const FIVE: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);

/// Fixed content constants the aggregator divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    total_chapters: NonZeroU32,
    questions_per_chapter: NonZeroU32,
}

impl ProgressConfig {
    #[must_use]
    pub const fn new(total_chapters: NonZeroU32, questions_per_chapter: NonZeroU32) -> Self {
        Self {
            total_chapters,
            questions_per_chapter,
        }
    }

    #[must_use]
    pub fn total_chapters(&self) -> u32 {
        self.total_chapters.get()
    }

    #[must_use]
    pub fn questions_per_chapter(&self) -> u32 {
        self.questions_per_chapter.get()
    }

    /// Highest attainable sum of quiz scores. Never zero.
    #[must_use]
    pub fn max_score(&self) -> u64 {
        u64::from(self.total_chapters.get()) * u64::from(self.questions_per_chapter.get())
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self::new(FIVE, FIVE)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog has no chapters")]
    Empty,
    #[error("chapter ids start at 1")]
    ZeroChapterId,
    #[error("duplicate chapter id {0}")]
    DuplicateChapter(ChapterId),
    #[error("chapter {id} has an invalid estimated read time: {minutes}")]
    InvalidReadTime { id: ChapterId, minutes: f64 },
    #[error("chapter {id} quiz has {key_len} answers but {question_count} questions")]
    QuizLengthMismatch {
        id: ChapterId,
        key_len: usize,
        question_count: u32,
    },
    #[error("too many chapters: {0}")]
    TooManyChapters(usize),
    #[error("invalid catalog json: {0}")]
    Json(String),
}

/// Static description of one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfo {
    pub id: ChapterId,
    pub title: String,
    /// Minutes credited to `time_spent` when the chapter is marked complete.
    pub estimated_minutes: f64,
    pub question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizKey>,
}

/// Ordered list of chapters making up the book.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChapterCatalog {
    chapters: Vec<ChapterInfo>,
}

impl ChapterCatalog {
    /// Build a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for empty catalogs, id 0, duplicate ids,
    /// negative or non-finite read times, and quiz keys of the wrong length.
    pub fn new(chapters: Vec<ChapterInfo>) -> Result<Self, CatalogError> {
        if chapters.is_empty() {
            return Err(CatalogError::Empty);
        }
        if u32::try_from(chapters.len()).is_err() {
            return Err(CatalogError::TooManyChapters(chapters.len()));
        }

        let mut seen = HashSet::with_capacity(chapters.len());
        for chapter in &chapters {
            if chapter.id.value() == 0 {
                return Err(CatalogError::ZeroChapterId);
            }
            if !seen.insert(chapter.id) {
                return Err(CatalogError::DuplicateChapter(chapter.id));
            }
            if !chapter.estimated_minutes.is_finite() || chapter.estimated_minutes < 0.0 {
                return Err(CatalogError::InvalidReadTime {
                    id: chapter.id,
                    minutes: chapter.estimated_minutes,
                });
            }
            if let Some(quiz) = &chapter.quiz {
                if quiz.len() != chapter.question_count as usize {
                    return Err(CatalogError::QuizLengthMismatch {
                        id: chapter.id,
                        key_len: quiz.len(),
                        question_count: chapter.question_count,
                    });
                }
            }
        }

        Ok(Self { chapters })
    }

    /// Parse and validate a catalog from its JSON array form.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Json` on malformed input, or any validation error.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let chapters: Vec<ChapterInfo> =
            serde_json::from_str(raw).map_err(|err| CatalogError::Json(err.to_string()))?;
        Self::new(chapters)
    }

    /// The five chapters shipped with the book.
    #[must_use]
    pub fn builtin() -> Self {
        let chapter = |id: u32, title: &str, minutes: f64, key: [u8; 5]| ChapterInfo {
            id: ChapterId::new(id),
            title: title.to_owned(),
            estimated_minutes: minutes,
            question_count: 5,
            quiz: Some(QuizKey::new(key.to_vec())),
        };
        Self {
            chapters: vec![
                chapter(1, "Knowing Your Audience", 15.0, [1, 0, 2, 3, 1]),
                chapter(2, "Pricing With Confidence", 20.0, [2, 2, 0, 1, 3]),
                chapter(3, "Measuring Return", 18.0, [0, 3, 1, 1, 2]),
                chapter(4, "Planning the Launch", 25.0, [3, 1, 0, 2, 0]),
                chapter(5, "Campaigns That Compound", 22.0, [1, 2, 3, 0, 2]),
            ],
        }
    }

    #[must_use]
    pub fn get(&self, id: ChapterId) -> Option<&ChapterInfo> {
        self.chapters.iter().find(|chapter| chapter.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterInfo> {
        self.chapters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Aggregation constants implied by this catalog: its chapter count and
    /// its largest per-chapter question count.
    #[must_use]
    pub fn progress_config(&self) -> ProgressConfig {
        let total = u32::try_from(self.chapters.len())
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MIN);
        let questions = self
            .chapters
            .iter()
            .map(|chapter| chapter.question_count)
            .max()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MIN);
        ProgressConfig::new(total, questions)
    }
}

impl Default for ChapterCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, minutes: f64) -> ChapterInfo {
        ChapterInfo {
            id: ChapterId::new(id),
            title: format!("Chapter {id}"),
            estimated_minutes: minutes,
            question_count: 3,
            quiz: None,
        }
    }

    #[test]
    fn builtin_matches_default_config() {
        let catalog = ChapterCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.progress_config(), ProgressConfig::default());
        assert_eq!(ProgressConfig::default().max_score(), 25);
        // builtin goes through the same checks as loaded catalogs
        assert!(ChapterCatalog::new(catalog.iter().cloned().collect()).is_ok());
    }

    #[test]
    fn rejects_duplicates_and_zero_ids() {
        assert_eq!(
            ChapterCatalog::new(vec![info(1, 5.0), info(1, 6.0)]),
            Err(CatalogError::DuplicateChapter(ChapterId::new(1)))
        );
        assert_eq!(
            ChapterCatalog::new(vec![info(0, 5.0)]),
            Err(CatalogError::ZeroChapterId)
        );
        assert_eq!(ChapterCatalog::new(Vec::new()), Err(CatalogError::Empty));
    }

    #[test]
    fn rejects_bad_read_time_and_quiz_length() {
        assert!(matches!(
            ChapterCatalog::new(vec![info(1, f64::NAN)]),
            Err(CatalogError::InvalidReadTime { .. })
        ));

        let mut chapter = info(1, 5.0);
        chapter.quiz = Some(QuizKey::new(vec![0, 1]));
        assert!(matches!(
            ChapterCatalog::new(vec![chapter]),
            Err(CatalogError::QuizLengthMismatch { key_len: 2, .. })
        ));
    }

    #[test]
    fn loads_from_json() {
        let raw = r#"[
            {"id": 1, "title": "Intro", "estimatedMinutes": 12, "questionCount": 2, "quiz": [0, 1]},
            {"id": 2, "title": "Next", "estimatedMinutes": 8.5, "questionCount": 4}
        ]"#;
        let catalog = ChapterCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.len(), 2);
        let config = catalog.progress_config();
        assert_eq!(config.total_chapters(), 2);
        assert_eq!(config.questions_per_chapter(), 4);
        assert!(catalog.get(ChapterId::new(2)).unwrap().quiz.is_none());
        assert!(catalog.get(ChapterId::new(3)).is_none());
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            ChapterCatalog::from_json("{"),
            Err(CatalogError::Json(_))
        ));
    }
}
