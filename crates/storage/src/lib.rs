#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{HttpBackend, HttpConfig};
pub use repository::{GradingService, InMemoryBackend, QuizCatalog, Remote, RemoteError};
