//! `GET /token`: issue a speech-to-text bearer token to the browser.

use crate::{error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use tracing::error;

/// Respond with the bare token string.
///
/// On failure the issuer's status code becomes the response status and the body is the
/// JSON error payload from [`crate::error::AppError`]; the token body is only ever sent
/// on success.
pub async fn get_token(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let token = state.clients.token_issuer.get_token().await.map_err(|err| {
        error!(
            service = err.service(),
            upstream_status = ?err.status(),
            error = %err,
            "Token request failed"
        );
        err
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(token))
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::handlers::{configure, test_support::mock_state};
    use crate::state::AppState;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[actix_web::test]
    async fn test_token_body_is_plain_string() {
        let server = MockServer::start().await;
        let state = mock_state(&server).await;
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/token").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"test-bearer");
    }

    #[actix_web::test]
    async fn test_issuer_401_becomes_http_401() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found"
            })))
            .mount(&server)
            .await;
        let state = AppState::new(AppConfig::for_upstream(&server.uri())).unwrap();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/token").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Provided API key could not be found");
    }
}
