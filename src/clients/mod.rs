//! # Upstream Service Clients
//!
//! Thin handles for the three cloud APIs this backend fronts. Each handle is bound to
//! exactly one credential and one base URL, is created once at startup, and keeps no
//! session between calls, so it can be shared by any number of in-flight requests.
//!
//! ## Key Components:
//! - **auth**: API key → bearer token exchange against the identity service
//! - **token**: Token Issuer handing bearer tokens to the browser
//! - **translator**: Language Translator passthrough
//! - **synthesizer**: Text to Speech, always returning the raw audio bytes
//!
//! All handles share one `reqwest::Client`. The connection pool is the only shared
//! resource and carries no per-session state.

pub mod auth;
pub mod synthesizer;
pub mod token;
pub mod translator;

use crate::config::AppConfig;
use anyhow::Result;
use reqwest::Response;
use std::fmt;

pub use auth::IamAuthenticator;
pub use synthesizer::TextToSpeech;
pub use token::TokenIssuer;
pub use translator::{LanguageTranslator, OPT_OUT_HEADER};

/// An API key together with the URL of the service it authorizes.
///
/// ## Rust Concepts:
/// - **Manual Debug impl**: The key is printed as `<redacted>` so a stray `{:?}` in a
///   log line cannot leak it
#[derive(Clone)]
pub struct Credential {
    api_key: String,
    service_url: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            service_url: service_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Base URL without a trailing slash.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Join a path (starting with `/`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.service_url, path)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("service_url", &self.service_url)
            .finish()
    }
}

/// Failure talking to an upstream service.
///
/// ## Error Categories:
/// - **Status**: The service answered with a non-2xx status (401 bad key, 404 unknown voice, ...)
/// - **Transport**: The request never got an answer (DNS, TLS, connection reset)
/// - **Decode**: The service answered 2xx but the body was not what we expected
#[derive(Debug)]
pub enum ServiceError {
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },
    Transport {
        service: &'static str,
        message: String,
    },
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    /// Upstream HTTP status, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            ServiceError::Status { service, .. }
            | ServiceError::Transport { service, .. }
            | ServiceError::Decode { service, .. } => service,
        }
    }

    fn transport(service: &'static str, err: reqwest::Error) -> Self {
        ServiceError::Transport {
            service,
            message: err.to_string(),
        }
    }

    fn decode(service: &'static str, err: impl fmt::Display) -> Self {
        ServiceError::Decode {
            service,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Status {
                service,
                status,
                message,
            } => write!(f, "{} returned {}: {}", service, status, message),
            ServiceError::Transport { service, message } => {
                write!(f, "{} unreachable: {}", service, message)
            }
            ServiceError::Decode { service, message } => {
                write!(f, "{} sent an unreadable response: {}", service, message)
            }
        }
    }
}

impl std::error::Error for ServiceError {}

/// Pass a successful response through, or turn an error response into `ServiceError::Status`.
pub(crate) async fn check_status(service: &'static str, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("upstream error").to_string());

    Err(ServiceError::Status {
        service,
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of an upstream error body.
///
/// The speech services answer `{"code": 401, "error": "Unauthorized"}`, the identity
/// service answers `{"errorCode": "...", "errorMessage": "..."}`, and proxies in front
/// of them sometimes answer with plain text.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["error", "errorMessage", "message", "description"] {
            match value.get(key) {
                Some(serde_json::Value::String(message)) => return Some(message.clone()),
                // {"error": {"message": "..."}}
                Some(nested @ serde_json::Value::Object(_)) => {
                    if let Some(message) = nested.get("message").and_then(|m| m.as_str()) {
                        return Some(message.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Some(trimmed.chars().take(500).collect())
}

/// The three long-lived upstream handles.
///
/// Built once by [`ServiceClients::from_config`] and shared read-only with every handler
/// through `AppState`.
#[derive(Debug, Clone)]
pub struct ServiceClients {
    pub token_issuer: TokenIssuer,
    pub translator: LanguageTranslator,
    pub synthesizer: TextToSpeech,
}

impl ServiceClients {
    /// Create every handle from validated configuration.
    ///
    /// ## Rust Concepts:
    /// - **reqwest::Client is cheap to clone**: Clones share the same connection pool
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let iam_url = &config.services.iam_url;

        let token_issuer = TokenIssuer::new(IamAuthenticator::new(
            http.clone(),
            iam_url,
            &config.api_keys.speech_to_text,
        ));

        let translator = LanguageTranslator::new(
            http.clone(),
            Credential::new(
                config.api_keys.language_translator.clone(),
                config.api_keys.language_translator_url.clone(),
            ),
            iam_url,
            config.services.translator_version.clone(),
        );

        let synthesizer = TextToSpeech::new(
            http,
            Credential::new(
                config.api_keys.text_to_speech.clone(),
                config.services.text_to_speech_url.clone(),
            ),
            iam_url,
        );

        Ok(Self {
            token_issuer,
            translator,
            synthesizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_hides_key() {
        let credential = Credential::new("super-secret", "https://api.example.com/tts/");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret"));
        assert_eq!(credential.service_url(), "https://api.example.com/tts");
        assert_eq!(
            credential.endpoint("/v1/synthesize"),
            "https://api.example.com/tts/v1/synthesize"
        );
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"code":401,"error":"Unauthorized"}"#),
            Some("Unauthorized".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"errorCode":"BXNIM0415E","errorMessage":"Provided API key could not be found"}"#),
            Some("Provided API key could not be found".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"quota exceeded"}}"#),
            Some("quota exceeded".to_string())
        );
        assert_eq!(extract_error_message("Service Unavailable"), Some("Service Unavailable".to_string()));
        assert_eq!(extract_error_message("   "), None);
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::Status {
            service: "language translator",
            status: 404,
            message: "Model not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "language translator returned 404: Model not found");
    }

    #[test]
    fn test_from_config_builds_all_handles() {
        let config = AppConfig::for_upstream("http://127.0.0.1:9");
        let clients = ServiceClients::from_config(&config).unwrap();
        assert_eq!(
            clients.synthesizer.credential().service_url(),
            "http://127.0.0.1:9/text-to-speech"
        );
        assert_eq!(
            clients.translator.credential().service_url(),
            "http://127.0.0.1:9/language-translator"
        );
    }
}
