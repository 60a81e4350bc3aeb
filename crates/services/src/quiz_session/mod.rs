mod controller;
mod progress;
mod workflow;

// Public API of the quiz session subsystem.
pub use crate::error::{InvalidIndex, QuizSessionError};
pub use controller::{QuizSessionController, SubmitTicket};
pub use progress::{QuizPhase, QuizProgress};
pub use workflow::{LoadedCourse, QuizSessionService};
