#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod quiz_session;

pub use course_core::Clock;

pub use app_services::{AppConfig, AppServices};
pub use error::{AppServicesError, InvalidIndex, QuizSessionError};
pub use quiz_session::{
    LoadedCourse, QuizPhase, QuizProgress, QuizSessionController, QuizSessionService,
    SubmitTicket,
};
