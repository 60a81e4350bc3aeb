use serde::Serialize;

/// Where a quiz is in its attempt lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    /// Answers may be changed.
    InProgress,
    /// Answers were sent for grading and the result is pending.
    Submitting,
    /// Graded; read-only until reset.
    Submitted,
}

/// Aggregated view of one quiz attempt, useful for UI badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub phase: QuizPhase,
    pub can_submit: bool,
    /// Only set once submitted.
    pub percent: Option<u32>,
}
