//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{AnswerError, QuizId};
use storage::RemoteError;

/// A quiz, question or option that is not part of the loaded session.
///
/// Seeing one of these means the view and the controller disagree about what
/// is on screen; it is not something to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidIndex {
    #[error("quiz {0} is not loaded")]
    Quiz(QuizId),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Errors emitted by the quiz session controller and workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("invalid index: {0}")]
    InvalidIndex(#[from] InvalidIndex),
    #[error("quiz {quiz} was already submitted")]
    AlreadySubmitted { quiz: QuizId },
    #[error("quiz {quiz} is being submitted")]
    SubmissionInFlight { quiz: QuizId },
    #[error("quiz {quiz} has {unanswered} unanswered questions")]
    Incomplete { quiz: QuizId, unanswered: usize },
    #[error("submission for quiz {quiz} was superseded by a reset")]
    StaleSubmission { quiz: QuizId },
    #[error("grading failed: {0}")]
    GradingFailed(#[source] RemoteError),
    #[error("could not load quizzes: {0}")]
    Catalog(#[source] RemoteError),
}

impl QuizSessionError {
    pub(crate) fn unknown_quiz(quiz: &QuizId) -> Self {
        Self::InvalidIndex(InvalidIndex::Quiz(quiz.clone()))
    }

    /// True for failures the student can act on (show a message, let them retry).
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::GradingFailed(_) | Self::Catalog(_) | Self::Incomplete { .. }
        )
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error("missing setting {0}")]
    MissingSetting(&'static str),
    #[error("invalid value for {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
