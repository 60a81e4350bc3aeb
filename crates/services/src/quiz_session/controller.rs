use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use course_core::model::{
    Answer, AnswerSheet, Grade, Question, Quiz, QuizId, StudentId, Submission, percent,
};
use storage::RemoteError;

use super::progress::{QuizPhase, QuizProgress};
use crate::error::{InvalidIndex, QuizSessionError};

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct QuizAttempt {
    questions: Vec<Question>,
    sheet: AnswerSheet,
    phase: QuizPhase,
    score: u32,
    submitted_at: Option<DateTime<Utc>>,
    // Bumped on every reset so late grading results can be recognised.
    generation: u64,
}

impl QuizAttempt {
    fn fresh(quiz: &Quiz, generation: u64) -> Self {
        Self {
            questions: quiz.questions().to_vec(),
            sheet: AnswerSheet::for_questions(quiz.questions()),
            phase: QuizPhase::InProgress,
            score: 0,
            submitted_at: None,
            generation,
        }
    }

    fn can_submit(&self) -> bool {
        self.phase == QuizPhase::InProgress && self.sheet.is_complete()
    }

    fn ensure_editable(&self, quiz: &QuizId) -> Result<(), QuizSessionError> {
        match self.phase {
            QuizPhase::InProgress => Ok(()),
            QuizPhase::Submitting => Err(QuizSessionError::SubmissionInFlight { quiz: quiz.clone() }),
            QuizPhase::Submitted => Err(QuizSessionError::AlreadySubmitted { quiz: quiz.clone() }),
        }
    }
}

//
// ─── SUBMIT TICKET ─────────────────────────────────────────────────────────────
//

/// Snapshot handed out by [`QuizSessionController::begin_submit`].
///
/// Carries the answers to send for grading and must be handed back to
/// [`QuizSessionController::complete_submit`] with the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SubmitTicket {
    quiz_id: QuizId,
    generation: u64,
    answers: Vec<Answer>,
}

impl SubmitTicket {
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Tracks one student's answers across the quizzes shown together.
///
/// Every quiz moves `InProgress -> Submitting -> Submitted`; `reset` returns it
/// to `InProgress` from any phase. Quizzes are independent of each other.
///
/// Selecting an answer on a submitted quiz is rejected with
/// `QuizSessionError::AlreadySubmitted` and leaves the answers unchanged.
#[derive(Clone)]
pub struct QuizSessionController {
    student_id: StudentId,
    order: Vec<QuizId>,
    attempts: HashMap<QuizId, QuizAttempt>,
}

impl QuizSessionController {
    #[must_use]
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            order: Vec::new(),
            attempts: HashMap::new(),
        }
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    /// Start a fresh attempt for each quiz.
    ///
    /// Quizzes already present are reinitialized without carrying over answers;
    /// quizzes not in `quizzes` are left alone.
    pub fn initialize(&mut self, quizzes: &[Quiz]) {
        for quiz in quizzes {
            let id = quiz.id();
            let generation = match self.attempts.get(id) {
                Some(previous) => previous.generation + 1,
                None => {
                    self.order.push(id.clone());
                    0
                }
            };
            self.attempts
                .insert(id.clone(), QuizAttempt::fresh(quiz, generation));
        }
    }

    /// Mark a quiz as submitted using a submission the server already holds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if the quiz is not loaded or the stored answers
    /// do not fit its questions.
    pub fn restore_submission(
        &mut self,
        quiz_id: &QuizId,
        submission: &Submission,
    ) -> Result<(), QuizSessionError> {
        let attempt = self.attempt_mut(quiz_id)?;
        let sheet = AnswerSheet::from_answers(&attempt.questions, submission.answers().to_vec())
            .map_err(InvalidIndex::from)?;

        attempt.sheet = sheet;
        attempt.phase = QuizPhase::Submitted;
        attempt.score = submission.score();
        attempt.submitted_at = Some(submission.submitted_at());
        attempt.generation += 1;
        Ok(())
    }

    /// Apply a student's click on an option.
    ///
    /// # Errors
    ///
    /// - `InvalidIndex` for an unknown quiz, question or option.
    /// - `AlreadySubmitted` once the quiz is graded.
    /// - `SubmissionInFlight` while grading is pending.
    pub fn select_answer(
        &mut self,
        quiz_id: &QuizId,
        question: usize,
        option: usize,
    ) -> Result<(), QuizSessionError> {
        let attempt = self.attempt_mut(quiz_id)?;
        attempt.ensure_editable(quiz_id)?;
        attempt
            .sheet
            .select(question, option)
            .map_err(InvalidIndex::from)?;
        Ok(())
    }

    /// True iff every question is answered and the quiz is still in progress.
    #[must_use]
    pub fn can_submit(&self, quiz_id: &QuizId) -> bool {
        self.attempts
            .get(quiz_id)
            .is_some_and(QuizAttempt::can_submit)
    }

    /// Move the quiz to `Submitting` and snapshot the answers for grading.
    ///
    /// # Errors
    ///
    /// Fails unless `can_submit` would return true; the state is unchanged.
    pub fn begin_submit(&mut self, quiz_id: &QuizId) -> Result<SubmitTicket, QuizSessionError> {
        let attempt = self.attempt_mut(quiz_id)?;
        attempt.ensure_editable(quiz_id)?;

        let unanswered = attempt.sheet.len() - attempt.sheet.answered_count();
        if unanswered > 0 {
            return Err(QuizSessionError::Incomplete {
                quiz: quiz_id.clone(),
                unanswered,
            });
        }

        attempt.phase = QuizPhase::Submitting;
        Ok(SubmitTicket {
            quiz_id: quiz_id.clone(),
            generation: attempt.generation,
            answers: attempt.sheet.answers().to_vec(),
        })
    }

    /// Record the grading outcome for a ticket from `begin_submit`.
    ///
    /// On success the score is copied verbatim and the quiz becomes read-only.
    /// On failure the quiz goes back to `InProgress` with its answers intact.
    ///
    /// # Errors
    ///
    /// - `GradingFailed` carrying the collaborator error.
    /// - `StaleSubmission` if the quiz was reset or reloaded after the ticket
    ///   was issued; the outcome is dropped and the state is unchanged.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<Grade, RemoteError>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submission, QuizSessionError> {
        let stale = || QuizSessionError::StaleSubmission {
            quiz: ticket.quiz_id.clone(),
        };
        let Some(attempt) = self.attempts.get_mut(&ticket.quiz_id) else {
            return Err(stale());
        };
        if attempt.generation != ticket.generation || attempt.phase != QuizPhase::Submitting {
            tracing::debug!(quiz = %ticket.quiz_id, "dropping grading result for superseded attempt");
            return Err(stale());
        }

        match outcome {
            Ok(grade) => {
                attempt.score = grade.score;
                attempt.submitted_at = Some(submitted_at);
                attempt.phase = QuizPhase::Submitted;
                Ok(Submission::new(
                    self.student_id.clone(),
                    ticket.answers,
                    grade.score,
                    submitted_at,
                ))
            }
            Err(err) => {
                attempt.phase = QuizPhase::InProgress;
                Err(QuizSessionError::GradingFailed(err))
            }
        }
    }

    /// Start the quiz over ("retake"). Valid from any phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if the quiz is not loaded.
    pub fn reset(&mut self, quiz_id: &QuizId) -> Result<(), QuizSessionError> {
        let attempt = self.attempt_mut(quiz_id)?;
        attempt.sheet.clear();
        attempt.phase = QuizPhase::InProgress;
        attempt.score = 0;
        attempt.submitted_at = None;
        attempt.generation += 1;
        Ok(())
    }

    /// Rounded percentage score; `None` unless the quiz is submitted.
    #[must_use]
    pub fn percent_score(&self, quiz_id: &QuizId) -> Option<u32> {
        let attempt = self.attempts.get(quiz_id)?;
        (attempt.phase == QuizPhase::Submitted).then(|| percent(attempt.score, attempt.sheet.len()))
    }

    #[must_use]
    pub fn answers(&self, quiz_id: &QuizId) -> Option<&[Answer]> {
        self.attempts.get(quiz_id).map(|a| a.sheet.answers())
    }

    #[must_use]
    pub fn phase(&self, quiz_id: &QuizId) -> Option<QuizPhase> {
        self.attempts.get(quiz_id).map(|a| a.phase)
    }

    /// Score as last reported by the grader; 0 before submission.
    #[must_use]
    pub fn score(&self, quiz_id: &QuizId) -> Option<u32> {
        self.attempts.get(quiz_id).map(|a| a.score)
    }

    /// The graded attempt, once submitted.
    #[must_use]
    pub fn submission(&self, quiz_id: &QuizId) -> Option<Submission> {
        let attempt = self.attempts.get(quiz_id)?;
        if attempt.phase != QuizPhase::Submitted {
            return None;
        }
        Some(Submission::new(
            self.student_id.clone(),
            attempt.sheet.answers().to_vec(),
            attempt.score,
            attempt.submitted_at?,
        ))
    }

    #[must_use]
    pub fn progress(&self, quiz_id: &QuizId) -> Option<QuizProgress> {
        let attempt = self.attempts.get(quiz_id)?;
        Some(QuizProgress {
            total: attempt.sheet.len(),
            answered: attempt.sheet.answered_count(),
            phase: attempt.phase,
            can_submit: attempt.can_submit(),
            percent: self.percent_score(quiz_id),
        })
    }

    /// Loaded quizzes in the order they were first initialized.
    pub fn quiz_ids(&self) -> impl Iterator<Item = &QuizId> {
        self.order.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    fn attempt_mut(&mut self, quiz_id: &QuizId) -> Result<&mut QuizAttempt, QuizSessionError> {
        self.attempts
            .get_mut(quiz_id)
            .ok_or_else(|| QuizSessionError::unknown_quiz(quiz_id))
    }
}

impl fmt::Debug for QuizSessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSessionController")
            .field("student_id", &self.student_id)
            .field("quizzes", &self.order)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
