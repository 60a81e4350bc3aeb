use std::env;
use std::sync::Arc;
use std::time::Duration;

use course_core::model::{CourseId, StudentId};
use storage::{HttpConfig, InMemoryBackend, Remote};

use crate::Clock;
use crate::error::AppServicesError;
use crate::quiz_session::QuizSessionService;

pub const ENV_API_URL: &str = "COURSE_API_URL";
pub const ENV_API_TOKEN: &str = "COURSE_API_TOKEN";
pub const ENV_STUDENT_ID: &str = "COURSE_STUDENT_ID";
pub const ENV_COURSE_ID: &str = "COURSE_ID";
pub const ENV_TIMEOUT_SECS: &str = "COURSE_API_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Settings for talking to the course API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_token: None,
            student_id: None,
            course_id: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Read settings from `COURSE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::InvalidSetting` for ids or timeouts that do not parse.
    pub fn from_env() -> Result<Self, AppServicesError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::InvalidSetting` for ids or timeouts that do not parse.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, AppServicesError> {
        let get = |name| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url;
        }
        config.api_token = get(ENV_API_TOKEN);
        config.student_id = get(ENV_STUDENT_ID)
            .map(|raw| parse_setting(ENV_STUDENT_ID, &raw))
            .transpose()?;
        config.course_id = get(ENV_COURSE_ID)
            .map(|raw| parse_setting(ENV_COURSE_ID, &raw))
            .transpose()?;
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_setting(ENV_TIMEOUT_SECS, &raw)?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Parse a raw setting, naming it in the error.
///
/// # Errors
///
/// Returns `AppServicesError::InvalidSetting` when `raw` does not parse as `T`.
pub fn parse_setting<T>(name: &'static str, raw: &str) -> Result<T, AppServicesError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| AppServicesError::InvalidSetting {
            name,
            message: e.to_string(),
        })
}

/// Assembles app-facing services.
#[derive(Clone)]
pub struct AppServices {
    course_id: Option<CourseId>,
    quiz_sessions: Arc<QuizSessionService>,
}

impl AppServices {
    /// Build services backed by the HTTP course API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if no student is configured or the API URL is invalid.
    pub fn http(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let student_id = config
            .student_id
            .clone()
            .ok_or(AppServicesError::MissingSetting(ENV_STUDENT_ID))?;
        let http = HttpConfig::new(&config.api_url)?
            .with_token(config.api_token.clone())
            .with_timeout(config.request_timeout);
        let remote = Remote::http(http)?;
        tracing::debug!(api = %config.api_url, student = %student_id, "course api configured");

        Ok(Self {
            course_id: config.course_id.clone(),
            quiz_sessions: Arc::new(QuizSessionService::from_remote(clock, student_id, &remote)),
        })
    }

    /// Build services backed by an in-process backend.
    #[must_use]
    pub fn in_memory(
        backend: InMemoryBackend,
        student_id: StudentId,
        course_id: Option<CourseId>,
        clock: Clock,
    ) -> Self {
        let remote = Remote::in_memory(backend);
        Self {
            course_id,
            quiz_sessions: Arc::new(QuizSessionService::from_remote(clock, student_id, &remote)),
        }
    }

    /// Course to open by default, if configured.
    #[must_use]
    pub fn course_id(&self) -> Option<&CourseId> {
        self.course_id.as_ref()
    }

    #[must_use]
    pub fn quiz_sessions(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.quiz_sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api_url, "http://localhost:5000/api");
    }

    #[test]
    fn reads_all_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://lms.example.com/api"),
            (ENV_API_TOKEN, "secret"),
            (ENV_STUDENT_ID, "stu-1"),
            (ENV_COURSE_ID, "rust-101"),
            (ENV_TIMEOUT_SECS, "3"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://lms.example.com/api");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.student_id, Some(StudentId::new("stu-1").unwrap()));
        assert_eq!(config.course_id, Some(CourseId::new("rust-101").unwrap()));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_timeout_names_the_setting() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(
            err,
            AppServicesError::InvalidSetting {
                name: ENV_TIMEOUT_SECS,
                ..
            }
        ));
    }

    #[test]
    fn http_services_need_a_student() {
        let Err(err) = AppServices::http(&AppConfig::default(), Clock::default_clock()) else {
            panic!("expected missing student error");
        };
        assert!(matches!(
            err,
            AppServicesError::MissingSetting(ENV_STUDENT_ID)
        ));
    }

    #[test]
    fn in_memory_services_keep_the_default_course() {
        let course = CourseId::new("rust-101").unwrap();
        let services = AppServices::in_memory(
            InMemoryBackend::new(),
            StudentId::new("stu-1").unwrap(),
            Some(course.clone()),
            Clock::default_clock(),
        );
        assert_eq!(services.course_id(), Some(&course));
    }
}
