/// Mistral HTTP client implementation.
///
/// This module provides `MistralClient` for making synchronous HTTP requests to the
/// Mistral file and chat APIs, along with error types and a builder for configuration.
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;
use tracing::debug;

use super::types::{ChatMessage, ChatRequest, ChatResponse, SignedUrl, UploadedFile};

/// Default Mistral API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Errors that can occur when interacting with the Mistral API.
#[derive(Debug, Error)]
pub enum MistralError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code and the response body, if any
    #[error("HTTP error: status {status}{}", fmt_body(.body))]
    Http { status: u16, body: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Mistral API-specific errors
    #[error("Mistral API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No API key was configured
    #[error("Missing Mistral API key")]
    MissingApiKey,
}

fn fmt_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({body})")
    }
}

impl MistralError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }
}

/// Builder for constructing `MistralClient` instances.
///
/// # Examples
///
/// ```
/// use butterfly::mistral::MistralClientBuilder;
///
/// let client = MistralClientBuilder::new()
///     .api_key("secret")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.base_url(), "https://api.mistral.ai");
/// ```
#[derive(Debug, Default)]
pub struct MistralClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    signed_url_expiry_hours: Option<u32>,
}

impl MistralClientBuilder {
    /// Creates a new `MistralClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key sent as a bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL for the Mistral API.
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL (e.g., "https://api.mistral.ai")
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the overall request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how long signed document URLs stay valid, in hours. Defaults to 24.
    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.signed_url_expiry_hours = Some(hours);
        self
    }

    /// Builds the `MistralClient` with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns `MistralError::MissingApiKey` if no key (or an empty key) was set,
    /// and `MistralError::InvalidUrl` if the base URL does not parse.
    pub fn build(self) -> Result<MistralClient, MistralError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(MistralError::MissingApiKey)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let base = reqwest::Url::parse(&base_url)
            .map_err(|e| MistralError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(MistralError::InvalidUrl(base_url));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(MistralError::Network)?;

        Ok(MistralClient {
            client,
            api_key,
            base,
            base_url,
            signed_url_expiry_hours: self.signed_url_expiry_hours.unwrap_or(24),
        })
    }
}

/// Synchronous HTTP client for the Mistral API.
///
/// It should be constructed using `MistralClientBuilder`.
pub struct MistralClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base: reqwest::Url,
    base_url: String,
    signed_url_expiry_hours: u32,
}

/// Trait for the Mistral operations the answering pipeline depends on.
///
/// This trait enables test doubles for the answer engine.
pub trait MistralClientTrait: Send + Sync {
    /// Uploads raw file bytes under `file_name` with the given purpose tag
    /// (e.g. `"ocr"`), returning the stored file.
    fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        purpose: &str,
    ) -> Result<UploadedFile, MistralError>;

    /// Requests a time-limited URL for a previously uploaded file.
    fn get_signed_url(&self, file_id: &str) -> Result<SignedUrl, MistralError>;

    /// Runs a chat completion and returns the text of the first choice.
    fn chat_complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, MistralError>;
}

impl MistralClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the signed URL lifetime in hours.
    pub fn signed_url_expiry_hours(&self) -> u32 {
        self.signed_url_expiry_hours
    }

    /// Appends `segments` to the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, MistralError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| MistralError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, MistralError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(MistralError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MistralError::Http {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(response)
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, MistralError> {
        let bytes = response.bytes().map_err(MistralError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(MistralError::Serialization)
    }
}

impl MistralClientTrait for MistralClient {
    fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        purpose: &str,
    ) -> Result<UploadedFile, MistralError> {
        let url = self.endpoint(&["v1", "files"])?;
        debug!(file_name, bytes = content.len(), purpose, "uploading file");

        let form = Form::new()
            .text("purpose", purpose.to_string())
            .part("file", Part::bytes(content).file_name(file_name.to_string()));

        let response = self.send(self.client.post(url).multipart(form))?;
        Self::read_json(response)
    }

    fn get_signed_url(&self, file_id: &str) -> Result<SignedUrl, MistralError> {
        let url = self.endpoint(&["v1", "files", file_id, "url"])?;
        debug!(file_id, "requesting signed url");

        let response = self.send(
            self.client
                .get(url)
                .query(&[("expiry", self.signed_url_expiry_hours)]),
        )?;
        Self::read_json(response)
    }

    fn chat_complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, MistralError> {
        let url = self.endpoint(&["v1", "chat", "completions"])?;
        let body = ChatRequest { model, messages };

        let response = self.send(self.client.post(url).json(&body))?;
        let parsed: ChatResponse = Self::read_json(response)?;
        parsed.into_first_text()
    }
}
