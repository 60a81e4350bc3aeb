use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::quiz::{Question, QuestionKind};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Answers that do not fit the questions they belong to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("expected {expected} answers, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("question index {index} out of range (quiz has {len} questions)")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("option index {option} out of range for question {question} ({len} options)")]
    OptionOutOfRange {
        question: usize,
        option: usize,
        len: usize,
    },
    #[error("answer for question {question} does not match its kind")]
    KindMismatch { question: usize },
}

//
// ─── ANSWER ───────────────────────────────────────────────────────────────────
//

/// A student's current selection for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// `None` means unanswered.
    Single(Option<usize>),
    /// Empty means unanswered.
    Multiple(BTreeSet<usize>),
}

impl Answer {
    #[must_use]
    pub fn unanswered(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Single => Answer::Single(None),
            QuestionKind::Multiple => Answer::Multiple(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            Answer::Single(_) => QuestionKind::Single,
            Answer::Multiple(_) => QuestionKind::Multiple,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Single(choice) => choice.is_some(),
            Answer::Multiple(set) => !set.is_empty(),
        }
    }

    /// Single answers are replaced; multiple answers toggle `option`.
    pub fn select(&mut self, option: usize) {
        match self {
            Answer::Single(choice) => *choice = Some(option),
            Answer::Multiple(set) => {
                if !set.remove(&option) {
                    set.insert(option);
                }
            }
        }
    }

    /// Selected option indices in ascending order.
    #[must_use]
    pub fn selected(&self) -> Vec<usize> {
        match self {
            Answer::Single(choice) => choice.iter().copied().collect(),
            Answer::Multiple(set) => set.iter().copied().collect(),
        }
    }
}

//
// ─── ANSWER SHEET ─────────────────────────────────────────────────────────────
//

/// Answers for one quiz, positionally aligned with its questions.
///
/// The sheet remembers each question's option count so selections can be
/// range-checked without holding the questions themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSheet {
    answers: Vec<Answer>,
    option_counts: Vec<usize>,
}

impl AnswerSheet {
    /// Every entry starts unanswered according to its question's kind.
    #[must_use]
    pub fn for_questions(questions: &[Question]) -> Self {
        Self {
            answers: questions
                .iter()
                .map(|q| Answer::unanswered(q.kind()))
                .collect(),
            option_counts: questions.iter().map(Question::option_count).collect(),
        }
    }

    /// Rebuild a sheet from answers recorded elsewhere (e.g. a prior submission).
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the answers do not line up with the questions
    /// by count, kind, or option range.
    pub fn from_answers(questions: &[Question], answers: Vec<Answer>) -> Result<Self, AnswerError> {
        if answers.len() != questions.len() {
            return Err(AnswerError::LengthMismatch {
                expected: questions.len(),
                found: answers.len(),
            });
        }
        for (index, (question, answer)) in questions.iter().zip(&answers).enumerate() {
            if question.kind() != answer.kind() {
                return Err(AnswerError::KindMismatch { question: index });
            }
            if let Some(&option) = answer
                .selected()
                .iter()
                .find(|&&o| o >= question.option_count())
            {
                return Err(AnswerError::OptionOutOfRange {
                    question: index,
                    option,
                    len: question.option_count(),
                });
            }
        }
        Ok(Self {
            answers,
            option_counts: questions.iter().map(Question::option_count).collect(),
        })
    }

    /// Apply a selection to the answer at `question`.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` when either index is out of range; the sheet is untouched.
    pub fn select(&mut self, question: usize, option: usize) -> Result<(), AnswerError> {
        let len = self.answers.len();
        let option_count = *self
            .option_counts
            .get(question)
            .ok_or(AnswerError::QuestionOutOfRange {
                index: question,
                len,
            })?;
        if option >= option_count {
            return Err(AnswerError::OptionOutOfRange {
                question,
                option,
                len: option_count,
            });
        }
        self.answers[question].select(option);
        Ok(())
    }

    /// Put every answer back to unanswered.
    pub fn clear(&mut self) {
        for answer in &mut self.answers {
            *answer = Answer::unanswered(answer.kind());
        }
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_answered()).count()
    }

    /// True when every question has an answer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answers.iter().all(Answer::is_answered)
    }
}
