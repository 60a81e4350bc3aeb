mod answer;
mod ids;
mod quiz;
mod submission;

pub use answer::{Answer, AnswerError, AnswerSheet};
pub use ids::{CourseId, ParseIdError, QuizId, StudentId};
pub use quiz::{Question, QuestionKind, Quiz, QuizError};
pub use submission::{Grade, Submission, percent};
