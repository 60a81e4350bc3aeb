use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, QuizId, StudentId};
use crate::model::submission::Submission;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Validation failures when building quizzes from catalog data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("question {index} has empty text")]
    EmptyQuestionText { index: usize },
    #[error("question {index} has no options")]
    NoOptions { index: usize },
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// Whether a question accepts exactly one option or a set of options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

/// A quiz item with positional options.
///
/// Options are identified by their index. Correct answers never reach the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: Vec<String>,
    kind: QuestionKind,
}

impl Question {
    /// Build a question; `index` is only used to label validation errors.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the text is blank or there are no options.
    pub fn new(
        index: usize,
        text: impl Into<String>,
        options: Vec<String>,
        kind: QuestionKind,
    ) -> Result<Self, QuizError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuizError::EmptyQuestionText { index });
        }
        if options.is_empty() {
            return Err(QuizError::NoOptions { index });
        }
        Ok(Self {
            text,
            options,
            kind,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// A named, ordered set of questions belonging to a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    course_id: CourseId,
    title: String,
    questions: Vec<Question>,
    submissions: Vec<Submission>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `QuizError` if the title is blank or the quiz has no questions.
    pub fn new(
        id: QuizId,
        course_id: CourseId,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(Self {
            id,
            course_id,
            title,
            questions,
            submissions: Vec::new(),
        })
    }

    /// Attach submissions already recorded by the server.
    #[must_use]
    pub fn with_submissions(mut self, submissions: Vec<Submission>) -> Self {
        self.submissions = submissions;
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuizId {
        &self.id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// The latest submission made by `student`, if the server returned one.
    #[must_use]
    pub fn submission_for(&self, student: &StudentId) -> Option<&Submission> {
        self.submissions
            .iter()
            .filter(|s| s.student_id() == student)
            .max_by_key(|s| s.submitted_at())
    }
}
