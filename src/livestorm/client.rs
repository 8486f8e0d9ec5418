/// Livestorm HTTP client implementation.
///
/// Lists session questions from the Livestorm JSON:API endpoint.
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default Livestorm API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.livestorm.co";

const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Errors that can occur when listing questions.
#[derive(Debug, Error)]
pub enum LivestormError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// The response body was not the expected JSON:API document
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Token or session id missing
    #[error("Missing Livestorm {0}")]
    MissingCredential(&'static str),
}

impl LivestormError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }
}

/// An audience question as reported by the question source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Identifier assigned by the source, stable across polls.
    pub id: String,
    /// The question text.
    pub text: String,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A remote list of questions that can be fetched repeatedly.
///
/// Implemented by `LivestormClient`; tests provide scripted sources.
pub trait QuestionSource: Send + Sync {
    /// Fetches the current question list, in the order the source returns it.
    fn fetch_questions(&self) -> Result<Vec<Question>, LivestormError>;
}

#[derive(Debug, Deserialize)]
struct QuestionDocument {
    #[serde(default)]
    data: Vec<QuestionResource>,
}

#[derive(Debug, Deserialize)]
struct QuestionResource {
    id: String,
    attributes: QuestionAttributes,
}

#[derive(Debug, Deserialize)]
struct QuestionAttributes {
    question: String,
}

/// Parses a JSON:API questions document into questions, preserving order.
pub(crate) fn parse_questions(body: &[u8]) -> Result<Vec<Question>, LivestormError> {
    let document: QuestionDocument =
        serde_json::from_slice(body).map_err(LivestormError::Serialization)?;

    Ok(document
        .data
        .into_iter()
        .map(|item| Question {
            id: item.id,
            text: item.attributes.question,
        })
        .collect())
}

/// Builder for constructing `LivestormClient` instances.
#[derive(Debug, Default)]
pub struct LivestormClientBuilder {
    api_token: Option<String>,
    session_id: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl LivestormClientBuilder {
    /// Creates a new `LivestormClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API token sent verbatim in the `Authorization` header.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the session whose questions are listed.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the base URL for the Livestorm API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the overall request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `LivestormClient`.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` when the token or session id is empty and
    /// `InvalidUrl` when the resulting questions URL does not parse.
    pub fn build(self) -> Result<LivestormClient, LivestormError> {
        let api_token = self
            .api_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(LivestormError::MissingCredential("API token"))?;
        let session_id = self
            .session_id
            .filter(|s| !s.trim().is_empty())
            .ok_or(LivestormError::MissingCredential("session id"))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut url = reqwest::Url::parse(&base_url)
            .map_err(|e| LivestormError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        url.path_segments_mut()
            .map_err(|()| LivestormError::InvalidUrl(base_url.clone()))?
            .pop_if_empty()
            .extend(["v1", "sessions", session_id.as_str(), "questions"]);
        url.query_pairs_mut()
            .append_pair("include", "asker")
            .append_pair("include", "responder");
        let questions_url = url.to_string();

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LivestormError::Network)?;

        Ok(LivestormClient {
            client,
            api_token,
            questions_url,
        })
    }
}

/// Synchronous client for the Livestorm session questions endpoint.
pub struct LivestormClient {
    client: reqwest::blocking::Client,
    api_token: String,
    questions_url: String,
}

impl LivestormClient {
    /// Returns the URL polled for questions.
    pub fn questions_url(&self) -> &str {
        &self.questions_url
    }
}

impl QuestionSource for LivestormClient {
    fn fetch_questions(&self) -> Result<Vec<Question>, LivestormError> {
        let response = self
            .client
            .get(&self.questions_url)
            .header(reqwest::header::ACCEPT, JSON_API_MEDIA_TYPE)
            .header(reqwest::header::AUTHORIZATION, &self.api_token)
            .send()
            .map_err(LivestormError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LivestormError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(LivestormError::from_reqwest)?;
        parse_questions(&body)
    }
}
