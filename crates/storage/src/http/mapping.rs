use chrono::{DateTime, Utc};
use course_core::model::{
    Answer, CourseId, Question, QuestionKind, Quiz, QuizId, StudentId, Submission,
};
use serde::{Deserialize, Serialize};

use crate::repository::RemoteError;

fn ser<E: core::fmt::Display>(e: E) -> RemoteError {
    RemoteError::Serialization(e.to_string())
}

/// Wire form of an answer: `-1` / index for single questions, index list for multiple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireAnswer {
    Index(i64),
    Set(Vec<usize>),
}

impl From<&Answer> for WireAnswer {
    fn from(answer: &Answer) -> Self {
        match answer {
            Answer::Single(None) => WireAnswer::Index(-1),
            Answer::Single(Some(choice)) => {
                WireAnswer::Index(i64::try_from(*choice).unwrap_or(i64::MAX))
            }
            Answer::Multiple(set) => WireAnswer::Set(set.iter().copied().collect()),
        }
    }
}

pub(crate) fn answer_from_wire(
    question: usize,
    kind: QuestionKind,
    wire: WireAnswer,
) -> Result<Answer, RemoteError> {
    match (kind, wire) {
        (QuestionKind::Single, WireAnswer::Index(i)) if i < 0 => Ok(Answer::Single(None)),
        (QuestionKind::Single, WireAnswer::Index(i)) => {
            Ok(Answer::Single(Some(usize::try_from(i).map_err(ser)?)))
        }
        (QuestionKind::Multiple, WireAnswer::Set(items)) => {
            Ok(Answer::Multiple(items.into_iter().collect()))
        }
        (QuestionKind::Multiple, WireAnswer::Index(i)) if i < 0 => {
            Ok(Answer::unanswered(QuestionKind::Multiple))
        }
        _ => Err(RemoteError::Serialization(format!(
            "answer for question {question} does not match its type"
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(alias = "courseId")]
    pub course: String,
    pub questions: Vec<QuestionDto>,
    #[serde(default)]
    pub submissions: Vec<SubmissionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionDto {
    #[serde(alias = "text")]
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: QuestionKind,
}

fn default_kind() -> QuestionKind {
    QuestionKind::Single
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionDto {
    pub student: String,
    pub answers: Vec<WireAnswer>,
    pub score: u32,
    pub submitted_at: DateTime<Utc>,
}

impl QuizDto {
    pub(crate) fn into_quiz(self) -> Result<Quiz, RemoteError> {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, q)| Question::new(index, q.question, q.options, q.kind).map_err(ser))
            .collect::<Result<Vec<_>, _>>()?;
        let kinds: Vec<QuestionKind> = questions.iter().map(Question::kind).collect();

        // A submission recorded against an older revision of the quiz is dropped.
        let quiz_id = self.id;
        let submissions = self
            .submissions
            .into_iter()
            .filter_map(|s| match s.into_submission(&kinds) {
                Ok(submission) => Some(submission),
                Err(err) => {
                    tracing::warn!(quiz = %quiz_id, error = %err, "dropping unreadable submission");
                    None
                }
            })
            .collect();

        let quiz = Quiz::new(
            QuizId::new(quiz_id).map_err(ser)?,
            CourseId::new(self.course).map_err(ser)?,
            self.title,
            questions,
        )
        .map_err(ser)?;
        Ok(quiz.with_submissions(submissions))
    }
}

/// Map a catalog payload, skipping entries that fail validation.
pub(crate) fn quizzes_from_wire(dtos: Vec<QuizDto>) -> Vec<Quiz> {
    dtos.into_iter()
        .filter_map(|dto| {
            let id = dto.id.clone();
            match dto.into_quiz() {
                Ok(quiz) => Some(quiz),
                Err(err) => {
                    tracing::warn!(quiz = %id, error = %err, "skipping invalid quiz");
                    None
                }
            }
        })
        .collect()
}

impl SubmissionDto {
    fn into_submission(self, kinds: &[QuestionKind]) -> Result<Submission, RemoteError> {
        if self.answers.len() != kinds.len() {
            return Err(RemoteError::Serialization(format!(
                "submission has {} answers for {} questions",
                self.answers.len(),
                kinds.len()
            )));
        }
        let answers = kinds
            .iter()
            .zip(self.answers)
            .enumerate()
            .map(|(index, (kind, wire))| answer_from_wire(index, *kind, wire))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Submission::new(
            StudentId::new(self.student).map_err(ser)?,
            answers,
            self.score,
            self.submitted_at,
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeRequest {
    pub student_id: String,
    pub answers: Vec<WireAnswer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeResponse {
    pub score: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const QUIZ_JSON: &str = r#"{
        "_id": "q1",
        "title": "Ownership",
        "course": "rust-101",
        "questions": [
            { "question": "Which moves?", "options": ["A", "B", "C"], "type": "single" },
            { "question": "Which copy?", "options": ["X", "Y"], "type": "multiple" }
        ],
        "submissions": [
            { "student": "s1", "answers": [1, [0, 1]], "score": 2,
              "submittedAt": "2023-11-14T22:13:20Z" }
        ]
    }"#;

    #[test]
    fn quiz_dto_maps_to_domain() {
        let dto: QuizDto = serde_json::from_str(QUIZ_JSON).unwrap();
        let quiz = dto.into_quiz().unwrap();

        assert_eq!(quiz.id().as_str(), "q1");
        assert_eq!(quiz.course_id().as_str(), "rust-101");
        assert_eq!(quiz.question_count(), 2);
        assert_eq!(quiz.questions()[1].kind(), QuestionKind::Multiple);

        let submission = quiz
            .submission_for(&StudentId::new("s1").unwrap())
            .unwrap();
        assert_eq!(submission.score(), 2);
        assert_eq!(
            submission.answers(),
            &[
                Answer::Single(Some(1)),
                Answer::Multiple(BTreeSet::from([0, 1]))
            ]
        );
    }

    #[test]
    fn question_type_defaults_to_single() {
        let dto: QuestionDto =
            serde_json::from_str(r#"{ "text": "Q", "options": ["a"] }"#).unwrap();
        assert_eq!(dto.kind, QuestionKind::Single);
    }

    #[test]
    fn unanswered_single_is_minus_one_on_the_wire() {
        let request = GradeRequest {
            student_id: "s1".into(),
            answers: vec![
                WireAnswer::from(&Answer::Single(None)),
                WireAnswer::from(&Answer::Single(Some(2))),
                WireAnswer::from(&Answer::Multiple(BTreeSet::from([2, 0]))),
            ],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"studentId":"s1","answers":[-1,2,[0,2]]}"#);
    }

    #[test]
    fn mismatched_answer_shape_is_rejected() {
        let err = answer_from_wire(0, QuestionKind::Single, WireAnswer::Set(vec![1])).unwrap_err();
        assert!(matches!(err, RemoteError::Serialization(_)));
        assert_eq!(
            answer_from_wire(1, QuestionKind::Multiple, WireAnswer::Index(-1)).unwrap(),
            Answer::Multiple(BTreeSet::new())
        );
    }

    #[test]
    fn invalid_quiz_payload_surfaces_serialization_error() {
        let dto: QuizDto = serde_json::from_str(
            r#"{ "_id": "q1", "title": "T", "course": "c", "questions": [] }"#,
        )
        .unwrap();
        assert!(matches!(
            dto.into_quiz().unwrap_err(),
            RemoteError::Serialization(_)
        ));
    }

    #[test]
    fn stale_submission_is_dropped_and_quiz_still_loads() {
        let dtos: Vec<QuizDto> = serde_json::from_str(
            r#"[
                { "_id": "q1", "title": "Ownership", "course": "rust-101",
                  "questions": [ { "question": "Q", "options": ["a", "b"] } ] },
                { "_id": "q2", "title": "Traits", "course": "rust-101",
                  "questions": [
                      { "question": "Q1", "options": ["a", "b"] },
                      { "question": "Q2", "options": ["x", "y"], "type": "multiple" }
                  ],
                  "submissions": [
                      { "student": "s1", "answers": [1], "score": 1,
                        "submittedAt": "2023-11-14T22:13:20Z" }
                  ] }
            ]"#,
        )
        .unwrap();

        let quizzes = quizzes_from_wire(dtos);
        assert_eq!(quizzes.len(), 2);
        assert_eq!(quizzes[1].id().as_str(), "q2");
        assert!(quizzes[1].submissions().is_empty());
        assert!(
            quizzes[1]
                .submission_for(&StudentId::new("s1").unwrap())
                .is_none()
        );
    }

    #[test]
    fn invalid_quiz_is_skipped_from_catalog() {
        let dtos: Vec<QuizDto> = serde_json::from_str(
            r#"[
                { "_id": "q1", "title": "Ownership", "course": "rust-101",
                  "questions": [ { "question": "Q", "options": ["a"] } ] },
                { "_id": "q2", "title": "Draft", "course": "rust-101", "questions": [] },
                { "_id": "q3", "title": "Broken", "course": "rust-101",
                  "questions": [ { "question": "Q", "options": [] } ] }
            ]"#,
        )
        .unwrap();

        let quizzes = quizzes_from_wire(dtos);
        let ids: Vec<&str> = quizzes.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, ["q1"]);
    }
}
