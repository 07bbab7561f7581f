//! Derivation of [`ProgressSummary`] from per-chapter records.
//!
//! Recomputed on every read; the record set is small and bounded by the
//! chapter count.

use std::collections::HashSet;

use crate::model::{ChapterProgress, ProgressConfig, ProgressSummary};

/// Summarize a set of chapter records.
///
/// Chapters absent from `records` contribute zero to every figure.
/// `overall_progress` is the rounded share of attainable quiz points, capped
/// at 100 even if the records exceed what `config` allows.
#[must_use]
pub fn summarize<'a, I>(records: I, config: &ProgressConfig) -> ProgressSummary
where
    I: IntoIterator<Item = &'a ChapterProgress>,
{
    let mut completed_chapters = 0_u32;
    let mut total_time_spent = 0.0_f64;
    let mut quiz_points = 0_u64;
    let mut tools = HashSet::new();

    for record in records {
        if record.completed {
            completed_chapters = completed_chapters.saturating_add(1);
        }
        total_time_spent += record.time_spent;
        quiz_points = quiz_points.saturating_add(u64::from(record.quiz_score));
        tools.extend(record.tools_used.iter());
    }

    ProgressSummary {
        completed_chapters,
        total_time_spent,
        tools_used: u32::try_from(tools.len()).unwrap_or(u32::MAX),
        overall_progress: overall_percent(quiz_points, config.max_score()),
    }
}

// Half-up rounding in integer arithmetic; `max_score` is non-zero by construction.
fn overall_percent(points: u64, max_score: u64) -> u32 {
    let pct = points
        .saturating_mul(200)
        .saturating_add(max_score)
        / max_score.saturating_mul(2);
    u32::try_from(pct.min(100)).unwrap_or(100)
}
