//! # Error Handling
//!
//! This module defines the application's error type and how it is converted into an HTTP
//! response. Handlers never build error responses themselves: they return `Err(AppError)`
//! and actix-web calls [`ResponseError::error_response`], so every failure path ends with
//! an explicit status and body.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Result<T, E> Type
//! - **T**: The success type (what you get when everything works)
//! - **E**: The error type (what you get when something goes wrong)
//! - **No exceptions**: Rust doesn't have try/catch, it uses Result instead
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets `?` turn client and audio errors into `AppError`
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings

use crate::audio::WavRepairError;
use crate::clients::ServiceError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Upstream**: A service answered with an error status, which is passed on to the caller
/// - **BadGateway**: The upstream answer was unusable, or the upstream was unreachable (502)
/// - **BadRequest**: Client sent invalid data (400)
/// - **Internal**: Server-side problems (500)
/// - **ConfigError**: Configuration problems (500)
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::BadGateway("synthesizer returned an empty body".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Upstream service rejected the call with this status and message
    Upstream { status: u16, message: String },

    /// Upstream response could not be used (malformed audio, unreadable JSON, no answer)
    BadGateway(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Internal server errors
    Internal(String),

    /// Configuration file or environment variable problems
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Upstream { status, message } => write!(f, "Upstream error {}: {}", status, message),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Upstream { .. } => "upstream_error",
            AppError::BadGateway(_) => "bad_gateway",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
            AppError::ConfigError(_) => "config_error",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Upstream { message, .. } => message,
            AppError::BadGateway(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg)
            | AppError::ConfigError(msg) => msg,
        }
    }

    /// Wrap a synthesis failure so it always ends in a 5xx.
    ///
    /// The caller asked for audio; whatever went wrong upstream, this backend could not
    /// produce it, so the upstream status goes into the message rather than the response.
    pub fn synthesis_failed(err: ServiceError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - Upstream → the upstream status when it is a valid 4xx/5xx code, otherwise 502
/// - BadGateway → 502 (Bad Gateway)
/// - BadRequest → 400 (Bad Request)
/// - Internal/ConfigError → 500 (Internal Server Error)
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "upstream_error",
///     "message": "Provided API key could not be found",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Upstream answered with an error status → pass the status on.
/// Upstream did not answer, or answered garbage → 502.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Status { status, message, .. } => AppError::Upstream { status, message },
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// A synthesized buffer that is not a repairable WAV file is a bad upstream response.
impl From<WavRepairError> for AppError {
    fn from(err: WavRepairError) -> Self {
        AppError::BadGateway(format!("Synthesized audio is not a valid WAV file: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
