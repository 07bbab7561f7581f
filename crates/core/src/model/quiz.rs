use serde::{Deserialize, Serialize};

/// Correct option index for each question of a chapter quiz, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizKey(Vec<u8>);

impl QuizKey {
    #[must_use]
    pub fn new(answers: Vec<u8>) -> Self {
        Self(answers)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Score a submission. Missing answers count as wrong; answers past the
    /// last question are ignored.
    #[must_use]
    pub fn grade(&self, answers: &[u8]) -> QuizOutcome {
        let correct = self
            .0
            .iter()
            .zip(answers)
            .filter(|(expected, given)| expected == given)
            .count();
        QuizOutcome {
            correct: u32::try_from(correct).unwrap_or(u32::MAX),
            total: u32::try_from(self.0.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Result of grading one quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub correct: u32,
    pub total: u32,
}

impl QuizOutcome {
    /// Rounded percentage of correct answers; 0 for an empty quiz.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let correct = u64::from(self.correct);
        let total = u64::from(self.total);
        let pct = (correct * 200 + total) / (2 * total);
        u32::try_from(pct).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}
