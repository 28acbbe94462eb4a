use crate::core::error::{CortexError, ProviderErrorKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 300;

/// Token shapes used by provider keys (`sk-...`, `sk-ant-...`, `AIza...`), masked or not.
static KEY_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sk|pk|rk)-[\w*.-]{4,}|\bAIza[\w*-]{10,}").expect("key pattern compiles")
});

/// How the credential is attached to each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Raw key in a named header, e.g. `x-api-key`
    Header(&'static str),
}

/// Thin wrapper over `reqwest::Client` shared by every provider.
///
/// The credential lives only in the default headers of the inner client, marked sensitive,
/// so it never shows up in URLs, logs or error messages.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        auth: AuthScheme,
        extra_headers: Option<HashMap<String, String>>,
        timeout: Duration,
    ) -> Result<Self, CortexError> {
        let mut headers = HeaderMap::new();

        let (name, value) = match auth {
            AuthScheme::Bearer => (
                HeaderName::from_static("authorization"),
                format!("Bearer {}", api_key.expose_secret()),
            ),
            AuthScheme::Header(name) => (
                HeaderName::from_static(name),
                api_key.expose_secret().to_string(),
            ),
        };
        let mut value = HeaderValue::from_str(&value).map_err(|_| {
            CortexError::Configuration("API key contains invalid header characters".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);

        for (key, value) in extra_headers.unwrap_or_default() {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                CortexError::Configuration(format!("Invalid header name: {}", key))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|_| {
                CortexError::Configuration(format!("Invalid value for header {}", key))
            })?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                CortexError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON payload and return the body of a successful response.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<String, CortexError> {
        let url = self.url(path);
        debug!(path, "Sending provider request");

        let response = self.client.post(&url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if let Some(err) = status_error(path, status, &body) {
            return Err(err);
        }

        if body.trim().is_empty() {
            return Err(CortexError::provider(
                ProviderErrorKind::EmptyResponse,
                "Provider returned an empty body",
            ));
        }

        Ok(body)
    }
}

/// Maps a non-success HTTP status to the provider failure kind; `None` for success.
pub fn classify_status(status: StatusCode) -> Option<ProviderErrorKind> {
    if status.is_success() {
        return None;
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::AuthFailure,
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderErrorKind::Timeout,
        other => ProviderErrorKind::BadStatus(other.as_u16()),
    };
    Some(kind)
}

/// Error for a non-success response, `None` on success.
///
/// Auth failures carry no body: providers echo part of the rejected key there. Other bodies
/// are shortened and scrubbed of anything shaped like a key.
pub fn status_error(path: &str, status: StatusCode, body: &str) -> Option<CortexError> {
    let kind = classify_status(status)?;
    let message = match kind {
        ProviderErrorKind::AuthFailure => format!(
            "{} returned {}: check the API key for this provider",
            path, status
        ),
        _ => format!("{} returned {}: {}", path, status, excerpt(body)),
    };
    Some(CortexError::provider(kind, message))
}

/// Decodes a provider envelope, mapping failures to `InvalidResponse`.
pub fn decode_envelope<'a, T: serde::Deserialize<'a>>(
    provider: &str,
    body: &'a str,
) -> Result<T, CortexError> {
    serde_json::from_str(body).map_err(|e| {
        CortexError::provider(
            ProviderErrorKind::InvalidResponse,
            format!("Failed to decode {} response: {}", provider, e),
        )
    })
}

/// Returns the completion text, or `EmptyResponse` if there is none.
pub fn non_empty(provider: &str, text: Option<String>) -> Result<String, CortexError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CortexError::provider(
            ProviderErrorKind::EmptyResponse,
            format!("No text in {} response", provider),
        )),
    }
}

fn excerpt(body: &str) -> String {
    let body = KEY_LIKE.replace_all(body.trim(), "[REDACTED]");
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(ProviderErrorKind::AuthFailure)
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(ProviderErrorKind::AuthFailure)
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(ProviderErrorKind::RateLimited)
        );
        assert_eq!(
            classify_status(StatusCode::GATEWAY_TIMEOUT),
            Some(ProviderErrorKind::Timeout)
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(ProviderErrorKind::BadStatus(500))
        );
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = HttpClient::new(
            "https://api.example.com/v1/".to_string(),
            SecretString::from("k".to_string()),
            AuthScheme::Bearer,
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url("/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_key_characters_are_rejected_without_echoing_the_key() {
        let err = HttpClient::new(
            "https://api.example.com".to_string(),
            SecretString::from("sk-secret\nvalue".to_string()),
            AuthScheme::Header("x-api-key"),
            None,
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CortexError::Configuration(_)));
        assert!(!err.to_string().contains("sk-secret"));
    }

    #[test]
    fn non_empty_rejects_blank_text() {
        let err = non_empty("test", Some("  \n".to_string())).unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::EmptyResponse));
        assert_eq!(non_empty("test", Some("ok".to_string())).unwrap(), "ok");
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let short = excerpt(&long);
        assert!(short.len() < 400);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn auth_failure_bodies_are_not_echoed() {
        let body = r#"{"error": {"message": "Incorrect API key provided: sk-ab***************wxyz.", "code": "invalid_api_key"}}"#;
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = status_error("chat/completions", status, body).unwrap();
            assert_eq!(err.provider_kind(), Some(ProviderErrorKind::AuthFailure));
            let message = err.to_string();
            assert!(!message.contains("sk-ab"), "{}", message);
            assert!(!message.contains("wxyz"), "{}", message);
            assert!(message.contains(status.as_str()));
        }
    }

    #[test]
    fn other_error_bodies_are_scrubbed() {
        let err = status_error(
            "chat/completions",
            StatusCode::BAD_REQUEST,
            "bad request for key sk-proj-abc123xyz and AIzaSyA1234567890abcdef",
        )
        .unwrap();
        let message = err.to_string();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::BadStatus(400)));
        assert!(message.contains("bad request for key [REDACTED]"));
        assert!(!message.contains("abc123"));
        assert!(!message.contains("AIzaSy"));
        assert!(status_error("chat/completions", StatusCode::OK, "{}").is_none());
    }
}
