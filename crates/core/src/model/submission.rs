use chrono::{DateTime, Utc};

use crate::model::answer::Answer;
use crate::model::ids::StudentId;

/// Score returned by the grading server for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    /// Number of fully correct questions.
    pub score: u32,
}

impl Grade {
    #[must_use]
    pub fn new(score: u32) -> Self {
        Self { score }
    }
}

/// Server-graded record of a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    student_id: StudentId,
    answers: Vec<Answer>,
    score: u32,
    submitted_at: DateTime<Utc>,
}

impl Submission {
    #[must_use]
    pub fn new(
        student_id: StudentId,
        answers: Vec<Answer>,
        score: u32,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            answers,
            score,
            submitted_at,
        }
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Score as a rounded percentage of `question_count`.
    #[must_use]
    pub fn percent_of(&self, question_count: usize) -> u32 {
        percent(self.score, question_count)
    }
}

/// `round(score / question_count * 100)`, or 0 for an empty quiz.
#[must_use]
pub fn percent(score: u32, question_count: usize) -> u32 {
    if question_count == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let pct = (f64::from(score) / question_count as f64 * 100.0).round() as u32;
    pct
}
