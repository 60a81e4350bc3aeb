use thiserror::Error;

use crate::model::{AnswerError, ParseIdError, QuizError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
