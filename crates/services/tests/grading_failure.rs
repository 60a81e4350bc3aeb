use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_core::model::{Answer, CourseId, Grade, Question, QuestionKind, Quiz, QuizId, StudentId};
use course_core::time::fixed_now;
use services::{Clock, QuizPhase, QuizSessionError, QuizSessionService};
use storage::{GradingService, InMemoryBackend, QuizCatalog, RemoteError};

/// Grader that fails until `fail_times` calls have been made, then returns `score`.
struct FlakyGrader {
    fail_times: usize,
    score: u32,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Answer>>>,
}

impl FlakyGrader {
    fn new(fail_times: usize, score: u32) -> Self {
        Self {
            fail_times,
            score,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GradingService for FlakyGrader {
    async fn grade(
        &self,
        _quiz_id: &QuizId,
        _student_id: &StudentId,
        answers: &[Answer],
    ) -> Result<Grade, RemoteError> {
        self.seen.lock().unwrap().push(answers.to_vec());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            return Err(RemoteError::Rejected {
                status: 503,
                message: "grading is temporarily unavailable".into(),
            });
        }
        Ok(Grade::new(self.score))
    }
}

fn catalog() -> Arc<dyn QuizCatalog> {
    let backend = InMemoryBackend::new();
    let quiz = Quiz::new(
        QuizId::new("q1").unwrap(),
        CourseId::new("c1").unwrap(),
        "Traits",
        vec![
            Question::new(0, "Pick one", vec!["a".into(), "b".into()], QuestionKind::Single)
                .unwrap(),
        ],
    )
    .unwrap();
    backend.insert_quiz(quiz, vec![vec![0]]).unwrap();
    Arc::new(backend)
}

#[tokio::test]
async fn failed_grading_leaves_state_untouched_and_does_not_retry() {
    let grader = Arc::new(FlakyGrader::new(1, 1));
    let svc = QuizSessionService::new(
        Clock::fixed(fixed_now()),
        StudentId::new("s1").unwrap(),
        catalog(),
        grader.clone(),
    );
    let quiz = QuizId::new("q1").unwrap();
    let mut course = svc.load_course(&CourseId::new("c1").unwrap()).await.unwrap();
    course.session.select_answer(&quiz, 0, 1).unwrap();
    let before = course.session.answers(&quiz).unwrap().to_vec();

    let err = svc.submit(&mut course.session, &quiz).await.unwrap_err();
    let QuizSessionError::GradingFailed(RemoteError::Rejected { message, .. }) = &err else {
        panic!("expected grading failure, got {err:?}");
    };
    assert_eq!(message, "grading is temporarily unavailable");
    assert_eq!(grader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(course.session.phase(&quiz), Some(QuizPhase::InProgress));
    assert_eq!(course.session.answers(&quiz).unwrap(), before.as_slice());
    assert_eq!(course.session.score(&quiz), Some(0));

    // The student retries by hand.
    let submission = svc.submit(&mut course.session, &quiz).await.unwrap();
    assert_eq!(submission.score(), 1);
    assert_eq!(grader.calls.load(Ordering::SeqCst), 2);
    assert_eq!(course.session.phase(&quiz), Some(QuizPhase::Submitted));

    let seen = grader.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[before.clone(), before]);
}

#[tokio::test]
async fn shared_session_rejects_overlapping_submit() {
    let grader = Arc::new(FlakyGrader::new(0, 1));
    let svc = QuizSessionService::new(
        Clock::fixed(fixed_now()),
        StudentId::new("s1").unwrap(),
        catalog(),
        grader.clone(),
    );
    let quiz = QuizId::new("q1").unwrap();
    let mut course = svc.load_course(&CourseId::new("c1").unwrap()).await.unwrap();
    course.session.select_answer(&quiz, 0, 0).unwrap();

    // A view that shares the controller takes a ticket, then a second click arrives.
    let ticket = course.session.begin_submit(&quiz).unwrap();
    let err = svc.submit(&mut course.session, &quiz).await.unwrap_err();
    assert!(matches!(err, QuizSessionError::SubmissionInFlight { .. }));
    assert_eq!(grader.calls.load(Ordering::SeqCst), 0);

    let grade = grader
        .grade(ticket.quiz_id(), &StudentId::new("s1").unwrap(), ticket.answers())
        .await;
    course
        .session
        .complete_submit(ticket, grade, fixed_now())
        .unwrap();
    assert_eq!(course.session.percent_score(&quiz), Some(100));
}
