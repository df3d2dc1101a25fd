//! # Language Translator Client
//!
//! Forwards a translation parameter map verbatim to `POST {url}/v3/translate`.
//!
//! ## Parameter Handling:
//! - The `X-WDC-PL-OPT-OUT` entry is not a body field. It is lifted out of the map and
//!   sent as the HTTP header of the same name, which asks the provider not to retain the
//!   submitted text.
//! - Everything else (`text`, `source`, `target`, `model_id`, ...) is sent as the JSON body
//!   without inspection.

use super::{check_status, Credential, IamAuthenticator, ServiceError};
use serde_json::{Map, Value};
use tracing::debug;

/// Opt-out flag, accepted from the browser as a header and forwarded as one.
pub const OPT_OUT_HEADER: &str = "X-WDC-PL-OPT-OUT";

const SERVICE: &str = "language translator";

#[derive(Debug, Clone)]
pub struct LanguageTranslator {
    http: reqwest::Client,
    credential: Credential,
    auth: IamAuthenticator,
    version: String,
}

impl LanguageTranslator {
    pub fn new(http: reqwest::Client, credential: Credential, iam_url: &str, version: String) -> Self {
        let auth = IamAuthenticator::new(http.clone(), iam_url, credential.api_key());
        Self {
            http,
            credential,
            auth,
            version,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Translate with the given parameters and return the provider's JSON unmodified.
    pub async fn translate(&self, mut params: Map<String, Value>) -> Result<Value, ServiceError> {
        let opt_out = params.remove(OPT_OUT_HEADER).and_then(|value| match value {
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        });

        let bearer = self.auth.bearer().await?;

        let mut request = self
            .http
            .post(self.credential.endpoint("/v3/translate"))
            .query(&[("version", self.version.as_str())])
            .bearer_auth(bearer)
            .json(&params);

        if let Some(opt_out) = opt_out {
            request = request.header(OPT_OUT_HEADER, opt_out);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        let response = check_status(SERVICE, response).await?;

        let result = response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::decode(SERVICE, e))?;

        debug!(
            word_count = ?result.get("word_count"),
            character_count = ?result.get("character_count"),
            "Translation completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    async fn mount_iam(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "lt-bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
    }

    fn translator(server: &MockServer) -> LanguageTranslator {
        LanguageTranslator::new(
            reqwest::Client::new(),
            Credential::new("lt-key", format!("{}/language-translator", server.uri())),
            &format!("{}/identity/token", server.uri()),
            "2020-03-30".to_string(),
        )
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_translate_forwards_body_and_returns_result() {
        let server = MockServer::start().await;
        mount_iam(&server).await;

        let upstream_result = json!({
            "translations": [{"translation": "bonjour"}],
            "word_count": 1,
            "character_count": 5
        });
        Mock::given(method("POST"))
            .and(path("/language-translator/v3/translate"))
            .and(query_param("version", "2020-03-30"))
            .and(header("authorization", "Bearer lt-bearer"))
            .and(body_json(json!({"text": "hello", "target": "fr"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(upstream_result.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let result = translator(&server)
            .translate(params(json!({"text": "hello", "target": "fr"})))
            .await
            .unwrap();
        assert_eq!(result, upstream_result);
    }

    #[tokio::test]
    async fn test_opt_out_travels_as_header_not_body() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("POST"))
            .and(path("/language-translator/v3/translate"))
            .and(header(OPT_OUT_HEADER, "true"))
            .and(body_json(json!({"text": "hello", "target": "de"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translations": []})))
            .expect(1)
            .mount(&server)
            .await;

        translator(&server)
            .translate(params(json!({
                OPT_OUT_HEADER: "true",
                "text": "hello",
                "target": "de"
            })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_opt_out_header_when_absent() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("POST"))
            .and(path("/language-translator/v3/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        translator(&server)
            .translate(params(json!({"text": "hello", "target": "fr"})))
            .await
            .unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let translate = requests
            .iter()
            .find(|r| r.url.path().ends_with("/v3/translate"))
            .unwrap();
        assert!(translate.headers.get(OPT_OUT_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_message() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("POST"))
            .and(path("/language-translator/v3/translate"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "error": "Model not found."
            })))
            .mount(&server)
            .await;

        let err = translator(&server)
            .translate(params(json!({"text": "hello", "model_id": "xx-yy"})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Model not found."));
    }
}
