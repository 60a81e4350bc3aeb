use async_trait::async_trait;
use course_core::Clock;
use course_core::model::{Answer, CourseId, Grade, Quiz, QuizId, StudentId, Submission};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by the course API adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("not found")]
    NotFound,

    /// The server refused the request; `message` is meant for the student.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read-only access to the quizzes of a course.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// Fetch the ordered quizzes of a course, including `student`'s prior submissions.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the course is unknown, or other transport errors.
    async fn list_quizzes(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<Quiz>, RemoteError>;
}

/// The authority that scores an attempt.
#[async_trait]
pub trait GradingService: Send + Sync {
    /// Grade the full answer sequence for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Rejected` for validation failures (e.g. unanswered
    /// questions), or transport errors.
    async fn grade(
        &self,
        quiz_id: &QuizId,
        student_id: &StudentId,
        answers: &[Answer],
    ) -> Result<Grade, RemoteError>;
}

const UNPROCESSABLE: u16 = 422;

/// In-process stand-in for the course API, for tests and the demo command.
///
/// Holds answer keys, grades by exact set match per question and remembers
/// submissions so later catalog fetches return them.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    clock: Clock,
    courses: Arc<Mutex<HashMap<CourseId, Vec<QuizId>>>>,
    quizzes: Arc<Mutex<HashMap<QuizId, StoredQuiz>>>,
}

#[derive(Clone)]
struct StoredQuiz {
    quiz: Quiz,
    key: Vec<BTreeSet<usize>>,
    submissions: Vec<Submission>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RemoteError {
    RemoteError::Connection(e.to_string())
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register a quiz with its answer key (correct option indices per question).
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Rejected` if the key does not cover every question
    /// or names options that do not exist.
    pub fn insert_quiz(&self, quiz: Quiz, key: Vec<Vec<usize>>) -> Result<(), RemoteError> {
        if key.len() != quiz.question_count() {
            return Err(RemoteError::Rejected {
                status: UNPROCESSABLE,
                message: format!(
                    "answer key has {} entries for {} questions",
                    key.len(),
                    quiz.question_count()
                ),
            });
        }
        for (index, (question, correct)) in quiz.questions().iter().zip(&key).enumerate() {
            if correct.is_empty() || correct.iter().any(|&o| o >= question.option_count()) {
                return Err(RemoteError::Rejected {
                    status: UNPROCESSABLE,
                    message: format!("invalid answer key for question {index}"),
                });
            }
        }

        let key = key.into_iter().map(|k| k.into_iter().collect()).collect();
        let quiz_id = quiz.id().clone();
        let course_id = quiz.course_id().clone();

        {
            let mut courses = self.courses.lock().map_err(poisoned)?;
            let ids = courses.entry(course_id).or_default();
            if !ids.contains(&quiz_id) {
                ids.push(quiz_id.clone());
            }
        }
        let mut quizzes = self.quizzes.lock().map_err(poisoned)?;
        quizzes.insert(
            quiz_id,
            StoredQuiz {
                quiz,
                key,
                submissions: Vec::new(),
            },
        );
        Ok(())
    }

    /// Every submission recorded for a quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the quiz is unknown.
    pub fn submissions(&self, quiz_id: &QuizId) -> Result<Vec<Submission>, RemoteError> {
        let quizzes = self.quizzes.lock().map_err(poisoned)?;
        quizzes
            .get(quiz_id)
            .map(|stored| stored.submissions.clone())
            .ok_or(RemoteError::NotFound)
    }
}

fn is_fully_correct(answer: &Answer, correct: &BTreeSet<usize>) -> bool {
    match answer {
        Answer::Single(Some(choice)) => correct.len() == 1 && correct.contains(choice),
        Answer::Single(None) => false,
        Answer::Multiple(selected) => selected == correct,
    }
}

#[async_trait]
impl QuizCatalog for InMemoryBackend {
    async fn list_quizzes(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<Quiz>, RemoteError> {
        let ids = {
            let courses = self.courses.lock().map_err(poisoned)?;
            courses.get(course_id).cloned().ok_or(RemoteError::NotFound)?
        };
        let quizzes = self.quizzes.lock().map_err(poisoned)?;
        ids.iter()
            .map(|id| -> Result<Quiz, RemoteError> {
                let stored = quizzes.get(id).ok_or(RemoteError::NotFound)?;
                let own: Vec<Submission> = stored
                    .submissions
                    .iter()
                    .filter(|s| s.student_id() == student_id)
                    .cloned()
                    .collect();
                Ok(stored.quiz.clone().with_submissions(own))
            })
            .collect()
    }
}

#[async_trait]
impl GradingService for InMemoryBackend {
    async fn grade(
        &self,
        quiz_id: &QuizId,
        student_id: &StudentId,
        answers: &[Answer],
    ) -> Result<Grade, RemoteError> {
        let mut quizzes = self.quizzes.lock().map_err(poisoned)?;
        let stored = quizzes.get_mut(quiz_id).ok_or(RemoteError::NotFound)?;

        if answers.len() != stored.key.len() || !answers.iter().all(Answer::is_answered) {
            return Err(RemoteError::Rejected {
                status: UNPROCESSABLE,
                message: "please answer all questions before submitting".into(),
            });
        }

        let correct = answers
            .iter()
            .zip(&stored.key)
            .filter(|(answer, key)| is_fully_correct(answer, key))
            .count();
        let score = u32::try_from(correct)
            .map_err(|_| RemoteError::Serialization("score overflow".into()))?;

        stored.submissions.push(Submission::new(
            student_id.clone(),
            answers.to_vec(),
            score,
            self.clock.now(),
        ));
        Ok(Grade::new(score))
    }
}

/// Catalog and grading collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Remote {
    pub catalog: Arc<dyn QuizCatalog>,
    pub grading: Arc<dyn GradingService>,
}

impl Remote {
    #[must_use]
    pub fn in_memory(backend: InMemoryBackend) -> Self {
        let catalog: Arc<dyn QuizCatalog> = Arc::new(backend.clone());
        let grading: Arc<dyn GradingService> = Arc::new(backend);
        Self { catalog, grading }
    }
}
