use serde::{Deserialize, Serialize};

use crate::model::{ChapterId, ToolId};

/// Per-user, per-chapter progress.
///
/// A chapter that has never been touched is represented by
/// [`ChapterProgress::new_default`] rather than being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub chapter_id: ChapterId,
    #[serde(default)]
    pub completed: bool,
    /// Correct answers on the latest quiz attempt. Not bounded here.
    #[serde(default)]
    pub quiz_score: u32,
    #[serde(default)]
    pub quiz_completed: bool,
    /// Minutes.
    #[serde(default)]
    pub time_spent: f64,
    /// May contain duplicates; uniqueness is resolved by the aggregator.
    #[serde(default)]
    pub tools_used: Vec<ToolId>,
    #[serde(default)]
    pub notes: String,
}

impl ChapterProgress {
    /// The zero-valued record for a chapter nobody has touched yet.
    #[must_use]
    pub fn new_default(chapter_id: ChapterId) -> Self {
        Self {
            chapter_id,
            completed: false,
            quiz_score: 0,
            quiz_completed: false,
            time_spent: 0.0,
            tools_used: Vec::new(),
            notes: String::new(),
        }
    }

    /// Overwrite exactly the fields present in `patch`.
    pub fn apply(&mut self, patch: ProgressPatch) {
        let ProgressPatch {
            completed,
            quiz_score,
            quiz_completed,
            time_spent,
            tools_used,
            notes,
        } = patch;

        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(quiz_score) = quiz_score {
            self.quiz_score = quiz_score;
        }
        if let Some(quiz_completed) = quiz_completed {
            self.quiz_completed = quiz_completed;
        }
        if let Some(time_spent) = time_spent {
            self.time_spent = sanitize_minutes(time_spent);
        }
        if let Some(tools_used) = tools_used {
            self.tools_used = tools_used;
        }
        if let Some(notes) = notes {
            self.notes = notes;
        }
    }

    /// Consuming variant of [`ChapterProgress::apply`].
    #[must_use]
    pub fn merged(mut self, patch: ProgressPatch) -> Self {
        self.apply(patch);
        self
    }

    #[must_use]
    pub fn has_used_tool(&self, tool: &ToolId) -> bool {
        self.tools_used.contains(tool)
    }
}

// Minutes are non-negative; NaN and negatives collapse to zero.
fn sanitize_minutes(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Partial update for a [`ChapterProgress`]: every field is optional and
/// only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProgressPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<ToolId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProgressPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    #[must_use]
    pub fn quiz_score(mut self, score: u32) -> Self {
        self.quiz_score = Some(score);
        self
    }

    #[must_use]
    pub fn quiz_completed(mut self, done: bool) -> Self {
        self.quiz_completed = Some(done);
        self
    }

    #[must_use]
    pub fn time_spent(mut self, minutes: f64) -> Self {
        self.time_spent = Some(minutes);
        self
    }

    #[must_use]
    pub fn tools_used(mut self, tools: Vec<ToolId>) -> Self {
        self.tools_used = Some(tools);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True when applying this patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Cross-chapter statistics derived from the current record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub completed_chapters: u32,
    pub total_time_spent: f64,
    /// Distinct tool ids across all chapters.
    pub tools_used: u32,
    /// Percentage in `0..=100`.
    pub overall_progress: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolId {
        ToolId::new(name).unwrap()
    }

    #[test]
    fn default_record_is_zero_valued() {
        let record = ChapterProgress::new_default(ChapterId::new(4));
        assert_eq!(record.chapter_id, ChapterId::new(4));
        assert!(!record.completed);
        assert_eq!(record.quiz_score, 0);
        assert!(!record.quiz_completed);
        assert!(record.time_spent.abs() < f64::EPSILON);
        assert!(record.tools_used.is_empty());
        assert!(record.notes.is_empty());
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut record = ChapterProgress::new_default(ChapterId::new(1));
        record.quiz_score = 3;
        record.time_spent = 10.0;
        record.notes = "keep me".into();

        record.apply(ProgressPatch::new().completed(true));

        assert!(record.completed);
        assert_eq!(record.quiz_score, 3);
        assert!((record.time_spent - 10.0).abs() < f64::EPSILON);
        assert_eq!(record.notes, "keep me");
    }

    #[test]
    fn applying_same_patch_twice_is_idempotent() {
        let patch = ProgressPatch::new()
            .quiz_score(4)
            .quiz_completed(true)
            .tools_used(vec![tool("audit")]);

        let once = ChapterProgress::new_default(ChapterId::new(2)).merged(patch.clone());
        let twice = once.clone().merged(patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn quiz_score_is_replaced_not_accumulated() {
        let record = ChapterProgress::new_default(ChapterId::new(1))
            .merged(ProgressPatch::new().quiz_score(2))
            .merged(ProgressPatch::new().quiz_score(5));
        assert_eq!(record.quiz_score, 5);
    }

    #[test]
    fn negative_minutes_collapse_to_zero() {
        let record = ChapterProgress::new_default(ChapterId::new(1))
            .merged(ProgressPatch::new().time_spent(-3.0));
        assert!(record.time_spent.abs() < f64::EPSILON);
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = serde_json::from_str::<ProgressPatch>(r#"{"completed":true,"bogus":1}"#);
        assert!(err.is_err());

        let patch: ProgressPatch =
            serde_json::from_str(r#"{"quizScore":3,"quizCompleted":true}"#).unwrap();
        assert_eq!(patch, ProgressPatch::new().quiz_score(3).quiz_completed(true));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ProgressPatch::new().is_empty());
        assert!(!ProgressPatch::new().notes("").is_empty());
    }

    #[test]
    fn record_reads_camel_case_with_missing_fields() {
        let record: ChapterProgress =
            serde_json::from_str(r#"{"chapterId":2,"quizScore":4,"extra":"ignored"}"#).unwrap();
        assert_eq!(record.chapter_id, ChapterId::new(2));
        assert_eq!(record.quiz_score, 4);
        assert!(!record.completed);
        assert!(record.tools_used.is_empty());
    }
}
