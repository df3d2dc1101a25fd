pub mod synthesize;
pub mod token;
pub mod translate;

pub use synthesize::*;
pub use token::*;
pub use translate::*;

use crate::health;
use actix_web::web;

/// Register every route. Shared by `main` and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/token", web::get().to(get_token))
        .route("/api/translate", web::post().to(translate))
        .route("/synthesize", web::get().to(synthesize))
        .route("/health", web::get().to(health::health_check))
        .service(web::scope("/api/v1").route("/metrics", web::get().to(health::detailed_metrics)));
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::AppConfig;
    use crate::state::AppState;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// State whose upstreams all live on `server`, with a working token exchange mounted.
    pub async fn mock_state(server: &MockServer) -> AppState {
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        AppState::new(AppConfig::for_upstream(&server.uri())).unwrap()
    }
}
