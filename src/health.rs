use crate::state::AppState;
use actix_web::{web, HttpResponse};
use reqwest::Url;
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = &state.config;
    let clients = &state.clients;

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "hosted": config.platform.hosted
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate()
        },
        "upstreams": {
            "text_to_speech": host_of(clients.synthesizer.credential().service_url()),
            "language_translator": host_of(clients.translator.credential().service_url()),
            "identity": host_of(&config.services.iam_url)
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats
    }))
}

/// Only the host is reported; paths can contain instance identifiers.
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::configure;
    use actix_web::{test as actix_test, App};

    #[actix_web::test]
    async fn test_health_never_reports_keys() {
        let state = AppState::new(AppConfig::for_upstream("http://127.0.0.1:9")).unwrap();
        let app = actix_test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["upstreams"]["text_to_speech"], "127.0.0.1");

        let raw = body.to_string();
        assert!(!raw.contains("tts-key"));
        assert!(!raw.contains("stt-key"));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://api.us-south.language-translator.watson.cloud.ibm.com/instances/abc"),
            Some("api.us-south.language-translator.watson.cloud.ibm.com".to_string())
        );
        assert_eq!(host_of("nope"), None);
    }
}
