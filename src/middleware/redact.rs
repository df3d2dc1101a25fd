//! Hosted-mode replacement of 5xx bodies.
//!
//! In development, error responses carry the upstream message to make debugging easy.
//! When hosted, server-side errors are reduced to the status reason so upstream details
//! (hostnames, provider error texts) are not shown to end users. 4xx bodies are kept:
//! they describe the caller's own request.

use actix_web::{
    dev::ServiceResponse,
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    HttpResponse, Result,
};
use serde_json::json;

/// `ErrorHandlers` middleware that rewrites every 5xx response body.
pub fn redact_server_errors<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().default_handler_server(redact_server_error)
}

fn redact_server_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let (req, res) = res.into_parts();
    let status = res.status();

    let redacted = HttpResponse::build(status).json(json!({
        "error": {
            "type": "server_error",
            "message": status.canonical_reason().unwrap_or("Server Error"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }
    }));

    let res = ServiceResponse::new(req, redacted).map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};

    async fn failing_synthesis() -> std::result::Result<HttpResponse, AppError> {
        Err(AppError::BadGateway("text to speech returned 404: secret-instance-id".to_string()))
    }

    async fn bad_token() -> std::result::Result<HttpResponse, AppError> {
        Err(AppError::Upstream {
            status: 401,
            message: "Unauthorized".to_string(),
        })
    }

    #[actix_web::test]
    async fn test_server_error_body_is_generic() {
        let app = test::init_service(
            App::new()
                .wrap(redact_server_errors())
                .route("/synthesize", web::get().to(failing_synthesis)),
        )
        .await;

        let req = test::TestRequest::get().uri("/synthesize").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Bad Gateway");
        assert!(!body.to_string().contains("secret-instance-id"));
    }

    #[actix_web::test]
    async fn test_client_error_body_is_kept() {
        let app = test::init_service(
            App::new()
                .wrap(redact_server_errors())
                .route("/token", web::get().to(bad_token)),
        )
        .await;

        let req = test::TestRequest::get().uri("/token").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Unauthorized");
    }
}
