use std::sync::Arc;

use course_core::model::{CourseId, Quiz, QuizId, StudentId, Submission};
use storage::{GradingService, QuizCatalog, Remote};

use super::controller::QuizSessionController;
use crate::Clock;
use crate::error::QuizSessionError;

/// Quizzes of one course together with the student's session over them.
#[derive(Debug, Clone)]
pub struct LoadedCourse {
    pub course_id: CourseId,
    pub quizzes: Vec<Quiz>,
    pub session: QuizSessionController,
}

impl LoadedCourse {
    #[must_use]
    pub fn quiz(&self, quiz_id: &QuizId) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id() == quiz_id)
    }
}

/// Orchestrates catalog loading and grading around a `QuizSessionController`.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    student_id: StudentId,
    catalog: Arc<dyn QuizCatalog>,
    grading: Arc<dyn GradingService>,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        student_id: StudentId,
        catalog: Arc<dyn QuizCatalog>,
        grading: Arc<dyn GradingService>,
    ) -> Self {
        Self {
            clock,
            student_id,
            catalog,
            grading,
        }
    }

    #[must_use]
    pub fn from_remote(clock: Clock, student_id: StudentId, remote: &Remote) -> Self {
        Self::new(
            clock,
            student_id,
            Arc::clone(&remote.catalog),
            Arc::clone(&remote.grading),
        )
    }

    /// Fetch a course's quizzes and start a session over them.
    ///
    /// Quizzes the student already submitted come back in the `Submitted` phase.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Catalog` if the quizzes cannot be fetched.
    pub async fn load_course(&self, course_id: &CourseId) -> Result<LoadedCourse, QuizSessionError> {
        let quizzes = self.fetch(course_id).await?;
        let session = self.build_session(&quizzes);
        Ok(LoadedCourse {
            course_id: course_id.clone(),
            quizzes,
            session,
        })
    }

    /// Refetch the catalog and start every quiz over.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Catalog` on fetch failure; `course` is left as it was.
    pub async fn refresh(&self, course: &mut LoadedCourse) -> Result<(), QuizSessionError> {
        let quizzes = self.fetch(&course.course_id).await?;
        course.session = self.build_session(&quizzes);
        course.quizzes = quizzes;
        Ok(())
    }

    /// Send the quiz's answers for grading and record the result.
    ///
    /// No retry is attempted; on `GradingFailed` the answers stay as they were
    /// and the student can submit again.
    ///
    /// # Errors
    ///
    /// Returns the `begin_submit` precondition errors, `GradingFailed`, or
    /// `StaleSubmission`.
    pub async fn submit(
        &self,
        session: &mut QuizSessionController,
        quiz_id: &QuizId,
    ) -> Result<Submission, QuizSessionError> {
        let ticket = session.begin_submit(quiz_id)?;
        let outcome = self
            .grading
            .grade(ticket.quiz_id(), &self.student_id, ticket.answers())
            .await;

        match &outcome {
            Ok(grade) => tracing::info!(quiz = %quiz_id, score = grade.score, "quiz graded"),
            Err(err) => tracing::warn!(quiz = %quiz_id, error = %err, "grading failed"),
        }

        session.complete_submit(ticket, outcome, self.clock.now())
    }

    async fn fetch(&self, course_id: &CourseId) -> Result<Vec<Quiz>, QuizSessionError> {
        let quizzes = self
            .catalog
            .list_quizzes(course_id, &self.student_id)
            .await
            .map_err(QuizSessionError::Catalog)?;
        tracing::info!(course = %course_id, quizzes = quizzes.len(), "loaded course quizzes");
        Ok(quizzes)
    }

    fn build_session(&self, quizzes: &[Quiz]) -> QuizSessionController {
        let mut session = QuizSessionController::new(self.student_id.clone());
        session.initialize(quizzes);

        for quiz in quizzes {
            let Some(prior) = quiz.submission_for(&self.student_id) else {
                continue;
            };
            // A stored submission that no longer fits the quiz (questions edited
            // since) leaves the quiz open for a new attempt.
            if let Err(err) = session.restore_submission(quiz.id(), prior) {
                tracing::warn!(quiz = %quiz.id(), error = %err, "ignoring prior submission");
            }
        }
        session
    }
}
