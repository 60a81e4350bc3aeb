use std::collections::BTreeSet;

use course_core::model::{Answer, CourseId, Question, QuestionKind, Quiz, QuizId, StudentId};
use course_core::time::fixed_now;
use services::{Clock, QuizPhase, QuizSessionError, QuizSessionService};
use storage::{InMemoryBackend, Remote};

fn course() -> CourseId {
    CourseId::new("rust-101").unwrap()
}

fn student() -> StudentId {
    StudentId::new("stu-1").unwrap()
}

fn two_question_quiz() -> Quiz {
    Quiz::new(
        QuizId::new("ownership").unwrap(),
        course(),
        "Ownership",
        vec![
            Question::new(
                0,
                "Which one moves?",
                vec!["A".into(), "B".into(), "C".into()],
                QuestionKind::Single,
            )
            .unwrap(),
            Question::new(
                1,
                "Which are Copy?",
                vec!["X".into(), "Y".into()],
                QuestionKind::Multiple,
            )
            .unwrap(),
        ],
    )
    .unwrap()
}

fn backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new().with_clock(Clock::fixed(fixed_now()));
    backend
        .insert_quiz(two_question_quiz(), vec![vec![1], vec![0, 1]])
        .unwrap();
    backend
}

fn service(backend: InMemoryBackend) -> QuizSessionService {
    QuizSessionService::from_remote(
        Clock::fixed(fixed_now()),
        student(),
        &Remote::in_memory(backend),
    )
}

#[tokio::test]
async fn answer_and_submit_full_quiz() {
    let backend = backend();
    let svc = service(backend.clone());
    let mut course = svc.load_course(&course()).await.unwrap();
    let quiz = QuizId::new("ownership").unwrap();
    let session = &mut course.session;

    assert_eq!(
        session.answers(&quiz).unwrap(),
        &[Answer::Single(None), Answer::Multiple(BTreeSet::new())]
    );

    session.select_answer(&quiz, 0, 1).unwrap();
    assert_eq!(
        session.answers(&quiz).unwrap(),
        &[Answer::Single(Some(1)), Answer::Multiple(BTreeSet::new())]
    );
    assert!(!session.can_submit(&quiz));

    session.select_answer(&quiz, 1, 0).unwrap();
    session.select_answer(&quiz, 1, 1).unwrap();
    assert_eq!(
        session.answers(&quiz).unwrap(),
        &[Answer::Single(Some(1)), Answer::Multiple(BTreeSet::from([0, 1]))]
    );
    assert!(session.can_submit(&quiz));

    let submission = svc.submit(session, &quiz).await.unwrap();
    assert_eq!(submission.score(), 2);
    assert_eq!(submission.submitted_at(), fixed_now());
    assert_eq!(session.phase(&quiz), Some(QuizPhase::Submitted));
    assert_eq!(session.score(&quiz), Some(2));
    assert_eq!(session.percent_score(&quiz), Some(100));

    assert_eq!(backend.submissions(&quiz).unwrap().len(), 1);
}

#[tokio::test]
async fn partial_credit_and_retake() {
    let svc = service(backend());
    let mut course = svc.load_course(&course()).await.unwrap();
    let quiz = QuizId::new("ownership").unwrap();
    let session = &mut course.session;

    session.select_answer(&quiz, 0, 2).unwrap();
    session.select_answer(&quiz, 1, 1).unwrap();
    let submission = svc.submit(session, &quiz).await.unwrap();
    assert_eq!(submission.score(), 0);
    assert_eq!(session.percent_score(&quiz), Some(0));

    let err = session.select_answer(&quiz, 0, 1).unwrap_err();
    assert!(matches!(err, QuizSessionError::AlreadySubmitted { .. }));

    session.reset(&quiz).unwrap();
    assert_eq!(session.phase(&quiz), Some(QuizPhase::InProgress));
    assert_eq!(session.score(&quiz), Some(0));
    assert!(session.answers(&quiz).unwrap().iter().all(|a| !a.is_answered()));

    session.select_answer(&quiz, 0, 1).unwrap();
    session.select_answer(&quiz, 1, 0).unwrap();
    let submission = svc.submit(session, &quiz).await.unwrap();
    assert_eq!(submission.score(), 1);
    assert_eq!(session.percent_score(&quiz), Some(50));
}

#[tokio::test]
async fn incomplete_quiz_never_reaches_grader() {
    let backend = backend();
    let svc = service(backend.clone());
    let mut course = svc.load_course(&course()).await.unwrap();
    let quiz = QuizId::new("ownership").unwrap();

    course.session.select_answer(&quiz, 0, 0).unwrap();
    let err = svc.submit(&mut course.session, &quiz).await.unwrap_err();
    assert!(matches!(
        err,
        QuizSessionError::Incomplete { unanswered: 1, .. }
    ));
    assert!(backend.submissions(&quiz).unwrap().is_empty());
}

#[tokio::test]
async fn reload_restores_prior_submission() {
    let backend = backend();
    let svc = service(backend.clone());
    let quiz = QuizId::new("ownership").unwrap();

    let mut first = svc.load_course(&course()).await.unwrap();
    first.session.select_answer(&quiz, 0, 1).unwrap();
    first.session.select_answer(&quiz, 1, 0).unwrap();
    svc.submit(&mut first.session, &quiz).await.unwrap();

    let second = svc.load_course(&course()).await.unwrap();
    assert_eq!(second.session.phase(&quiz), Some(QuizPhase::Submitted));
    assert_eq!(second.session.score(&quiz), Some(1));
    assert_eq!(
        second.session.answers(&quiz).unwrap(),
        &[Answer::Single(Some(1)), Answer::Multiple(BTreeSet::from([0]))]
    );

    // Another student sees a fresh quiz.
    let other = QuizSessionService::from_remote(
        Clock::fixed(fixed_now()),
        StudentId::new("stu-2").unwrap(),
        &Remote::in_memory(backend),
    );
    let theirs = other.load_course(&course()).await.unwrap();
    assert_eq!(theirs.session.phase(&quiz), Some(QuizPhase::InProgress));
}

#[tokio::test]
async fn refresh_reinitializes_in_progress_answers() {
    let svc = service(backend());
    let quiz = QuizId::new("ownership").unwrap();
    let mut course = svc.load_course(&course()).await.unwrap();
    course.session.select_answer(&quiz, 0, 1).unwrap();

    svc.refresh(&mut course).await.unwrap();
    assert_eq!(course.quizzes.len(), 1);
    assert!(course.quiz(&quiz).is_some());
    assert_eq!(course.session.answers(&quiz).unwrap()[0], Answer::Single(None));
}

#[tokio::test]
async fn unknown_course_is_a_catalog_error() {
    let svc = service(backend());
    let err = svc
        .load_course(&CourseId::new("missing").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QuizSessionError::Catalog(_)));
    assert!(err.is_user_facing());
}
