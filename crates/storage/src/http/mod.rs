//! REST adapter for the course API.

mod mapping;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use course_core::model::{Answer, CourseId, Grade, Quiz, QuizId, StudentId};
use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::repository::{GradingService, QuizCatalog, Remote, RemoteError};
use mapping::{ErrorBody, GradeRequest, GradeResponse, QuizDto, WireAnswer, quizzes_from_wire};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| RemoteError::Connection(format!("invalid api url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(RemoteError::Connection(format!(
                "api url must be http(s): {base_url}"
            )));
        }
        Ok(Self {
            base_url,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Connection("api url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Talks to the course API over HTTP. Catalog reads and grading both go here.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl Remote {
    /// Both collaborators backed by one shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if the HTTP client cannot be built.
    pub fn http(config: HttpConfig) -> Result<Self, RemoteError> {
        let backend = HttpBackend::new(config)?;
        let catalog: Arc<dyn QuizCatalog> = Arc::new(backend.clone());
        let grading: Arc<dyn GradingService> = Arc::new(backend);
        Ok(Self { catalog, grading })
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    if e.is_decode() {
        RemoteError::Serialization(e.to_string())
    } else {
        RemoteError::Connection(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    let body: ErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    tracing::warn!(status = status.as_u16(), %message, "course api rejected request");
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl QuizCatalog for HttpBackend {
    async fn list_quizzes(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Vec<Quiz>, RemoteError> {
        let url = self
            .config
            .endpoint(&["courses", course_id.as_str(), "quizzes"])?;
        tracing::debug!(%url, "fetching quizzes");

        let request = self
            .client
            .get(url)
            .query(&[("student", student_id.as_str())]);
        let response = self.authorize(request).send().await.map_err(transport)?;
        let dtos: Vec<QuizDto> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;

        Ok(quizzes_from_wire(dtos))
    }
}

#[async_trait]
impl GradingService for HttpBackend {
    async fn grade(
        &self,
        quiz_id: &QuizId,
        student_id: &StudentId,
        answers: &[Answer],
    ) -> Result<Grade, RemoteError> {
        let url = self
            .config
            .endpoint(&["quizzes", quiz_id.as_str(), "submit"])?;
        let payload = GradeRequest {
            student_id: student_id.to_string(),
            answers: answers.iter().map(WireAnswer::from).collect(),
        };
        tracing::debug!(%url, answers = answers.len(), "submitting answers for grading");

        let request = self.client.post(url).json(&payload);
        let response = self.authorize(request).send().await.map_err(transport)?;
        let body: GradeResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;

        Ok(Grade::new(body.score))
    }
}
