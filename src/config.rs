//! Runtime configuration loaded from the environment and `.env` files.
//!
//! The core types take credentials as plain strings; this module is the only
//! place that reads environment variables.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::answerer::{AnswerEngine, AnswerEngineBuilder, DEFAULT_MODEL};
use crate::livestorm::{LivestormClient, LivestormClientBuilder};
use crate::mistral::{MistralClient, MistralClientBuilder};
use crate::poller::{DEFAULT_POLL_INTERVAL, PollerBuilder, StopOnError};

pub const MISTRAL_API_KEY: &str = "MISTRAL_API_KEY";
pub const MISTRAL_MODEL: &str = "MISTRAL_MODEL";
pub const MISTRAL_BASE_URL: &str = "MISTRAL_BASE_URL";
pub const LIVESTORM_API_TOKEN: &str = "LIVESTORM_API_TOKEN";
pub const LIVESTORM_SESSION_ID: &str = "LIVESTORM_SESSION_ID";
pub const LIVESTORM_BASE_URL: &str = "LIVESTORM_BASE_URL";
pub const POLL_INTERVAL_SECS: &str = "BUTTERFLY_POLL_INTERVAL_SECS";
pub const HTTP_TIMEOUT_SECS: &str = "BUTTERFLY_HTTP_TIMEOUT_SECS";
pub const DOC_URL_TTL_SECS: &str = "BUTTERFLY_DOC_URL_TTL_SECS";
pub const DOC_URL_EXPIRY_HOURS: &str = "BUTTERFLY_DOC_URL_EXPIRY_HOURS";
pub const STOP_ON_POLL_ERROR: &str = "BUTTERFLY_STOP_ON_POLL_ERROR";

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mistral_api_key: String,
    pub mistral_model: String,
    pub mistral_base_url: Option<String>,
    pub livestorm_api_token: Option<String>,
    pub livestorm_session_id: Option<String>,
    pub livestorm_base_url: Option<String>,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    /// Lifetime of cached document references; `None` keeps them for the
    /// whole process.
    pub document_ttl: Option<Duration>,
    pub signed_url_expiry_hours: u32,
    pub stop_on_poll_error: bool,
}

impl Config {
    /// Loads `.env` (if present) and reads the configuration from the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `MISTRAL_API_KEY` is missing or a numeric or
    /// boolean variable does not parse.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mistral_api_key = get(MISTRAL_API_KEY)
            .ok_or_else(|| anyhow!("{MISTRAL_API_KEY} not set in environment"))?;

        let poll_interval = match get(POLL_INTERVAL_SECS) {
            Some(v) => Duration::from_secs(parse_positive_secs(POLL_INTERVAL_SECS, &v)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let http_timeout = match get(HTTP_TIMEOUT_SECS) {
            Some(v) => Duration::from_secs(parse_positive_secs(HTTP_TIMEOUT_SECS, &v)?),
            None => Duration::from_secs(60),
        };

        let signed_url_expiry_hours = match get(DOC_URL_EXPIRY_HOURS) {
            Some(v) => {
                let hours = v.parse::<u32>().with_context(|| {
                    format!("{DOC_URL_EXPIRY_HOURS} must be a whole number of hours")
                })?;
                if hours == 0 {
                    anyhow::bail!("{DOC_URL_EXPIRY_HOURS} must be positive");
                }
                hours
            }
            None => 24,
        };

        // A cached reference must not outlive the signed URL it points to.
        let max_ttl_secs = u64::from(signed_url_expiry_hours) * 3600;
        let document_ttl = match get(DOC_URL_TTL_SECS) {
            Some(v) => {
                let secs = parse_positive_secs(DOC_URL_TTL_SECS, &v)?;
                if secs > max_ttl_secs {
                    anyhow::bail!(
                        "{DOC_URL_TTL_SECS} must be at most {max_ttl_secs} (the signed URL lifetime), got {secs}"
                    );
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let stop_on_poll_error = match get(STOP_ON_POLL_ERROR) {
            Some(v) => parse_bool(STOP_ON_POLL_ERROR, &v)?,
            None => false,
        };

        Ok(Self {
            mistral_api_key,
            mistral_model: get(MISTRAL_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            mistral_base_url: get(MISTRAL_BASE_URL),
            livestorm_api_token: get(LIVESTORM_API_TOKEN),
            livestorm_session_id: get(LIVESTORM_SESSION_ID),
            livestorm_base_url: get(LIVESTORM_BASE_URL),
            poll_interval,
            http_timeout,
            document_ttl,
            signed_url_expiry_hours,
            stop_on_poll_error,
        })
    }

    /// Creates the Mistral client.
    pub fn mistral_client(&self) -> Result<MistralClient> {
        let mut builder = MistralClientBuilder::new()
            .api_key(&self.mistral_api_key)
            .timeout(self.http_timeout)
            .signed_url_expiry_hours(self.signed_url_expiry_hours);
        if let Some(url) = &self.mistral_base_url {
            builder = builder.base_url(url);
        }
        builder.build().context("Failed to create Mistral client")
    }

    /// Creates an answer engine backed by a fresh Mistral client.
    pub fn answer_engine(&self) -> Result<AnswerEngine> {
        let client = Arc::new(self.mistral_client()?);
        let mut builder = AnswerEngineBuilder::new(client).model(&self.mistral_model);
        if let Some(ttl) = self.document_ttl {
            builder = builder.document_ttl(ttl);
        }
        Ok(builder.build())
    }

    /// Creates the Livestorm client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or session id is missing.
    pub fn livestorm_client(&self) -> Result<LivestormClient> {
        let token = self
            .livestorm_api_token
            .as_deref()
            .ok_or_else(|| anyhow!("{LIVESTORM_API_TOKEN} not set in environment"))?;
        let session = self
            .livestorm_session_id
            .as_deref()
            .ok_or_else(|| anyhow!("{LIVESTORM_SESSION_ID} not set in environment"))?;

        let mut builder = LivestormClientBuilder::new()
            .api_token(token)
            .session_id(session)
            .timeout(self.http_timeout);
        if let Some(url) = &self.livestorm_base_url {
            builder = builder.base_url(url);
        }
        builder.build().context("Failed to create Livestorm client")
    }

    /// Creates a poller builder over the Livestorm client with the configured
    /// interval and error policy.
    pub fn poller_builder(&self) -> Result<PollerBuilder> {
        let source = Arc::new(self.livestorm_client()?);
        let builder = PollerBuilder::new(source).interval(self.poll_interval);
        Ok(if self.stop_on_poll_error {
            builder.policy(StopOnError)
        } else {
            builder
        })
    }
}

/// Loads variables from a `.env` file in the current directory or its
/// parents, if one exists. Variables already set in the environment win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{value}'"))
}

fn parse_positive_secs(key: &str, value: &str) -> Result<u64> {
    let secs = parse_secs(key, value)?;
    if secs == 0 {
        anyhow::bail!("{key} must be positive");
    }
    Ok(secs)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{key} must be true or false, got '{value}'")),
    }
}

/// Credentials persisted by `save_credentials`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub mistral_api_key: Option<String>,
    pub livestorm_api_token: String,
    pub livestorm_session_id: String,
}

/// Writes credentials to a `.env` file at `path`, replacing its contents.
///
/// The Mistral key line is only written when a key is known.
///
/// # Errors
///
/// Returns an error if the token or session id is empty or the file cannot
/// be written.
pub fn save_credentials(path: &Path, credentials: &Credentials) -> Result<()> {
    if credentials.livestorm_api_token.trim().is_empty()
        || credentials.livestorm_session_id.trim().is_empty()
    {
        anyhow::bail!("Livestorm token and session id cannot be empty");
    }

    let mut contents = String::new();
    if let Some(key) = credentials
        .mistral_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
    {
        writeln!(contents, "{MISTRAL_API_KEY}={}", quote_value(key))?;
    }
    writeln!(
        contents,
        "{LIVESTORM_API_TOKEN}={}",
        quote_value(&credentials.livestorm_api_token)
    )?;
    writeln!(
        contents,
        "{LIVESTORM_SESSION_ID}={}",
        quote_value(&credentials.livestorm_session_id)
    )?;

    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write credentials to {}", path.display()))
}

/// Quotes a value when dotenv parsing would otherwise alter it.
fn quote_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup(&[(MISTRAL_API_KEY, "secret")])).unwrap();

        assert_eq!(config.mistral_api_key, "secret");
        assert_eq!(config.mistral_model, DEFAULT_MODEL);
        assert_eq!(config.poll_interval, Duration::from_secs(6));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert_eq!(config.document_ttl, None);
        assert_eq!(config.signed_url_expiry_hours, 24);
        assert!(!config.stop_on_poll_error);
        assert!(config.livestorm_api_token.is_none());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[(MISTRAL_API_KEY, "  ")])).unwrap_err();
        assert!(err.to_string().contains("MISTRAL_API_KEY not set"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (MISTRAL_MODEL, "mistral-medium-latest"),
            (LIVESTORM_API_TOKEN, "token"),
            (LIVESTORM_SESSION_ID, "session"),
            (POLL_INTERVAL_SECS, "10"),
            (HTTP_TIMEOUT_SECS, "15"),
            (DOC_URL_TTL_SECS, "3600"),
            (DOC_URL_EXPIRY_HOURS, "2"),
            (STOP_ON_POLL_ERROR, "yes"),
        ]))
        .unwrap();

        assert_eq!(config.mistral_model, "mistral-medium-latest");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.document_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.signed_url_expiry_hours, 2);
        assert!(config.stop_on_poll_error);
        assert_eq!(config.livestorm_session_id.as_deref(), Some("session"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (POLL_INTERVAL_SECS, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(POLL_INTERVAL_SECS));

        let err = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (POLL_INTERVAL_SECS, "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));

        let err = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (STOP_ON_POLL_ERROR, "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("true or false"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for key in [HTTP_TIMEOUT_SECS, DOC_URL_TTL_SECS, DOC_URL_EXPIRY_HOURS] {
            let err = Config::from_lookup(lookup(&[(MISTRAL_API_KEY, "secret"), (key, "0")]))
                .unwrap_err();
            assert_eq!(err.to_string(), format!("{key} must be positive"));
        }
    }

    #[test]
    fn document_ttl_cannot_outlive_signed_url() {
        let err = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (DOC_URL_TTL_SECS, "99999999999"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must be at most 86400"));

        let err = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (DOC_URL_EXPIRY_HOURS, "1"),
            (DOC_URL_TTL_SECS, "3601"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must be at most 3600"));

        let config = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (DOC_URL_EXPIRY_HOURS, "1"),
            (DOC_URL_TTL_SECS, "3600"),
        ]))
        .unwrap();
        assert_eq!(config.document_ttl, Some(Duration::from_secs(3600)));
        assert!(config.answer_engine().is_ok());
    }

    #[test]
    fn livestorm_client_requires_credentials() {
        let config = Config::from_lookup(lookup(&[(MISTRAL_API_KEY, "secret")])).unwrap();
        let err = config.livestorm_client().err().unwrap();
        assert!(err.to_string().contains(LIVESTORM_API_TOKEN));

        let config = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (LIVESTORM_API_TOKEN, "token"),
            (LIVESTORM_SESSION_ID, "abc"),
        ]))
        .unwrap();
        let client = config.livestorm_client().unwrap();
        assert!(client.questions_url().contains("/v1/sessions/abc/questions"));
        assert!(config.poller_builder().is_ok());
    }

    #[test]
    fn answer_engine_uses_configured_model_and_ttl() {
        let config = Config::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "secret"),
            (MISTRAL_MODEL, "custom"),
            (DOC_URL_TTL_SECS, "60"),
        ]))
        .unwrap();

        let engine = config.answer_engine().unwrap();
        assert_eq!(engine.model(), "custom");
        assert_eq!(engine.cache().ttl(), Some(Duration::from_secs(60)));
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        unsafe {
            std::env::set_var(MISTRAL_API_KEY, "from-env");
            std::env::set_var(POLL_INTERVAL_SECS, "3");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.mistral_api_key, "from-env");
        assert_eq!(config.poll_interval, Duration::from_secs(3));

        unsafe {
            std::env::remove_var(MISTRAL_API_KEY);
            std::env::remove_var(POLL_INTERVAL_SECS);
        }
    }

    #[test]
    fn save_credentials_round_trips_through_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        save_credentials(
            &path,
            &Credentials {
                mistral_api_key: Some("mk".to_string()),
                livestorm_api_token: "tok en#1".to_string(),
                livestorm_session_id: "sess".to_string(),
            },
        )
        .unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(vars[MISTRAL_API_KEY], "mk");
        assert_eq!(vars[LIVESTORM_API_TOKEN], "tok en#1");
        assert_eq!(vars[LIVESTORM_SESSION_ID], "sess");
    }

    #[test]
    fn save_credentials_skips_unknown_mistral_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        save_credentials(
            &path,
            &Credentials {
                mistral_api_key: None,
                livestorm_api_token: "tok".to_string(),
                livestorm_session_id: "sess".to_string(),
            },
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "LIVESTORM_API_TOKEN=tok\nLIVESTORM_SESSION_ID=sess\n");
    }

    #[test]
    fn save_credentials_rejects_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_credentials(&dir.path().join(".env"), &Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }
}
