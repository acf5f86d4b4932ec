//! reqwest-backed JSON transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::Transport;
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

/// HTTP client for the posts API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client for an API base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers at all. Any HTTP status counts as reachable.
    pub async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Server unreachable: {error}");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!("{method} {url}");

        let mut request = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Transport(parse_api_error(status, &text)));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| {
            Error::Transport(format!(
                "invalid response body from {url}: {error} ({})",
                compact_text(&text)
            ))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    detail: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.detail).or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/api/ ".to_string()).unwrap(),
            "https://api.example.com/api"
        );
    }

    #[test]
    fn join_url_keeps_trailing_slash_of_path() {
        assert_eq!(
            join_url("https://api.example.com/api", "/blogs/7/"),
            "https://api.example.com/api/blogs/7/"
        );
        assert_eq!(
            join_url("https://api.example.com/api", "blogs/"),
            "https://api.example.com/api/blogs/"
        );
    }

    #[test]
    fn parse_api_error_prefers_message_fields() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"detail":"title is required"}"#),
            "title is required (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "HTTP 500"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down (502)"
        );
    }

    #[test]
    fn new_uses_normalized_base_url() {
        let transport =
            HttpTransport::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "https://api.example.com");
        assert_eq!(transport.url("blogs/"), "https://api.example.com/blogs/");
    }
}
