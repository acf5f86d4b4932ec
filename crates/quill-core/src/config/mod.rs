//! Client configuration.
//!
//! Values come from `QUILL_*` environment variables (the CLI loads `.env`
//! first). Every value is optional; missing ones fall back to defaults.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::{BackoffConfig, RetryPolicy};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "QUILL_API_BASE_URL";
const ENV_RESOURCE_PATH: &str = "QUILL_RESOURCE_PATH";
const ENV_REQUEST_TIMEOUT_SECS: &str = "QUILL_REQUEST_TIMEOUT_SECS";
const ENV_RETRY_MAX: &str = "QUILL_RETRY_MAX";
const ENV_RETRY_INITIAL_DELAY_SECS: &str = "QUILL_RETRY_INITIAL_DELAY_SECS";
const ENV_RETRY_MAX_DELAY_SECS: &str = "QUILL_RETRY_MAX_DELAY_SECS";
const ENV_POLL_INTERVAL_SECS: &str = "QUILL_POLL_INTERVAL_SECS";

pub const DEFAULT_RESOURCE_PATH: &str = "blogs/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the sync client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, e.g. `https://api.example.com/api`
    pub api_base_url: Option<String>,
    /// Resource collection path relative to the base URL, with a trailing `/`
    pub resource_path: String,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Periodic drain interval while online
    pub poll_interval_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry: RetryPolicy::Manual,
            poll_interval_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    /// The configured base URL, or a config error naming the variable to set.
    pub fn require_api_base_url(&self) -> Result<&str> {
        self.api_base_url
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{ENV_API_BASE_URL} is not set")))
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
    let text = |key: &str| normalize_text_option(lookup(key));
    let defaults = ClientConfig::default();

    let api_base_url = text(ENV_API_BASE_URL)
        .map(|url| normalize_api_base_url(&url))
        .transpose()?;

    let resource_path = text(ENV_RESOURCE_PATH)
        .map_or(defaults.resource_path, |path| normalize_resource_path(&path));

    let request_timeout_secs = match text(ENV_REQUEST_TIMEOUT_SECS) {
        Some(value) => parse_positive(ENV_REQUEST_TIMEOUT_SECS, &value)?,
        None => defaults.request_timeout_secs,
    };

    let poll_interval_secs = text(ENV_POLL_INTERVAL_SECS)
        .map(|value| parse_positive(ENV_POLL_INTERVAL_SECS, &value))
        .transpose()?;

    let retry = parse_retry_policy(&text)?;

    Ok(ClientConfig {
        api_base_url,
        resource_path,
        request_timeout_secs,
        retry,
        poll_interval_secs,
    })
}

fn parse_retry_policy(text: &impl Fn(&str) -> Option<String>) -> Result<RetryPolicy> {
    let initial_delay = text(ENV_RETRY_INITIAL_DELAY_SECS);
    let max_delay = text(ENV_RETRY_MAX_DELAY_SECS);

    let Some(max_retries) = text(ENV_RETRY_MAX) else {
        if initial_delay.is_some() || max_delay.is_some() {
            return Err(Error::Config(format!(
                "retry delays are set but {ENV_RETRY_MAX} is missing"
            )));
        }
        return Ok(RetryPolicy::Manual);
    };

    let max_retries = max_retries.parse::<u32>().map_err(|_| {
        Error::Config(format!(
            "{ENV_RETRY_MAX} must be a non-negative integer, got '{max_retries}'"
        ))
    })?;
    if max_retries == 0 {
        return Ok(RetryPolicy::Manual);
    }

    let mut backoff = BackoffConfig::new(max_retries);
    if let Some(value) = initial_delay {
        let secs = parse_positive(ENV_RETRY_INITIAL_DELAY_SECS, &value)?;
        backoff = backoff.with_initial_delay(Duration::from_secs(secs));
    }
    if let Some(value) = max_delay {
        let secs = parse_positive(ENV_RETRY_MAX_DELAY_SECS, &value)?;
        backoff = backoff.with_max_delay(Duration::from_secs(secs));
    }
    if backoff.max_delay < backoff.initial_delay {
        return Err(Error::Config(format!(
            "{ENV_RETRY_MAX_DELAY_SECS} must not be smaller than the initial delay"
        )));
    }

    Ok(RetryPolicy::Backoff(backoff))
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

fn normalize_api_base_url(url: &str) -> Result<String> {
    if is_http_url(url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "{ENV_API_BASE_URL} must include http:// or https://"
        )))
    }
}

/// `"/blogs"` and `"blogs/"` both become `"blogs/"`.
pub fn normalize_resource_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_RESOURCE_PATH.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        parse_config(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(parse(&[]).unwrap(), ClientConfig::default());
    }

    #[test]
    fn parses_full_environment() {
        let config = parse(&[
            (ENV_API_BASE_URL, " https://api.example.com/api/ "),
            (ENV_RESOURCE_PATH, "/posts"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
            (ENV_RETRY_MAX, "4"),
            (ENV_RETRY_INITIAL_DELAY_SECS, "2"),
            (ENV_RETRY_MAX_DELAY_SECS, "60"),
            (ENV_POLL_INTERVAL_SECS, "30"),
        ])
        .unwrap();

        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com/api"));
        assert_eq!(config.resource_path, "posts/");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.retry,
            RetryPolicy::Backoff(
                BackoffConfig::new(4)
                    .with_initial_delay(Duration::from_secs(2))
                    .with_max_delay(Duration::from_secs(60))
            )
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = parse(&[(ENV_API_BASE_URL, "   "), (ENV_RESOURCE_PATH, "")]).unwrap();
        assert_eq!(config.api_base_url, None);
        assert_eq!(config.resource_path, DEFAULT_RESOURCE_PATH);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(&[(ENV_API_BASE_URL, "api.example.com")]).is_err());
        assert!(parse(&[(ENV_REQUEST_TIMEOUT_SECS, "0")]).is_err());
        assert!(parse(&[(ENV_POLL_INTERVAL_SECS, "soon")]).is_err());
        assert!(parse(&[(ENV_RETRY_MAX, "-1")]).is_err());
        assert!(parse(&[(ENV_RETRY_INITIAL_DELAY_SECS, "5")]).is_err());
        assert!(parse(&[
            (ENV_RETRY_MAX, "3"),
            (ENV_RETRY_INITIAL_DELAY_SECS, "120"),
            (ENV_RETRY_MAX_DELAY_SECS, "60"),
        ])
        .is_err());
    }

    #[test]
    fn zero_retries_means_manual() {
        let config = parse(&[(ENV_RETRY_MAX, "0")]).unwrap();
        assert_eq!(config.retry, RetryPolicy::Manual);
    }

    #[test]
    fn require_api_base_url_names_variable() {
        let error = ClientConfig::default().require_api_base_url().unwrap_err();
        assert!(error.to_string().contains(ENV_API_BASE_URL));
    }

    #[test]
    fn normalize_resource_path_adds_trailing_slash() {
        assert_eq!(normalize_resource_path("blogs"), "blogs/");
        assert_eq!(normalize_resource_path("/api/blogs/"), "api/blogs/");
        assert_eq!(normalize_resource_path("/"), DEFAULT_RESOURCE_PATH);
    }
}
