pub mod https_redirect;
pub mod logging;
pub mod metrics;
pub mod redact;

pub use https_redirect::HttpsRedirect;
pub use logging::RequestLogging;
pub use metrics::MetricsMiddleware;
pub use redact::redact_server_errors;
