//! # Text to Speech Client
//!
//! Calls `GET {url}/v1/synthesize` with the caller's query parameters and returns the
//! complete audio body. The WAV header coming back may carry placeholder sizes; repairing
//! it is the synthesis endpoint's job, this client only moves bytes.

use super::{check_status, Credential, IamAuthenticator, ServiceError};
use actix_web::web::Bytes;
use reqwest::header::ACCEPT;
use std::collections::BTreeMap;
use tracing::debug;

/// The only audio format this backend asks for.
pub const WAV_MIME: &str = "audio/wav";

const SERVICE: &str = "text to speech";

/// Query parameters for a synthesis call.
///
/// Permissive by construction: any key the caller sends (`text`, `voice`,
/// `customization_id`, `rate_percentage`, ...) is forwarded. The one field this backend
/// depends on, `accept`, is always overwritten with `audio/wav`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisParams(BTreeMap<String, String>);

impl SynthesisParams {
    /// Take the caller's query and force WAV output.
    pub fn from_query(mut query: BTreeMap<String, String>) -> Self {
        query.insert("accept".to_string(), WAV_MIME.to_string());
        Self(query)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn accept(&self) -> &str {
        self.get("accept").unwrap_or(WAV_MIME)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
pub struct TextToSpeech {
    http: reqwest::Client,
    credential: Credential,
    auth: IamAuthenticator,
}

impl TextToSpeech {
    pub fn new(http: reqwest::Client, credential: Credential, iam_url: &str) -> Self {
        let auth = IamAuthenticator::new(http.clone(), iam_url, credential.api_key());
        Self {
            http,
            credential,
            auth,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Synthesize and buffer the whole audio response.
    ///
    /// The body is read to the end before returning because the header sizes can only be
    /// fixed once the total length is known.
    pub async fn synthesize(&self, params: &SynthesisParams) -> Result<Bytes, ServiceError> {
        let bearer = self.auth.bearer().await?;

        let query: Vec<(&String, &String)> = params.iter().collect();
        let response = self
            .http
            .get(self.credential.endpoint("/v1/synthesize"))
            .query(&query)
            .header(ACCEPT, params.accept())
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        let response = check_status(SERVICE, response).await?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        debug!(
            voice = params.get("voice").unwrap_or("default"),
            bytes = audio.len(),
            "Received synthesized audio"
        );
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_accept_is_always_wav() {
        let params = SynthesisParams::from_query(query(&[
            ("text", "hi"),
            ("voice", "en-US_AllisonV3Voice"),
            ("accept", "audio/ogg;codecs=opus"),
        ]));
        assert_eq!(params.accept(), "audio/wav");
        assert_eq!(params.get("voice"), Some("en-US_AllisonV3Voice"));

        let params = SynthesisParams::from_query(query(&[("text", "hi")]));
        assert_eq!(params.get("accept"), Some("audio/wav"));
    }

    #[tokio::test]
    async fn test_synthesize_forwards_query_and_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tts-bearer"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/text-to-speech/v1/synthesize"))
            .and(query_param("text", "hi there"))
            .and(query_param("voice", "en-US_AllisonV3Voice"))
            .and(query_param("accept", "audio/wav"))
            .and(header("accept", "audio/wav"))
            .and(header("authorization", "Bearer tts-bearer"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"RIFF....WAVE".to_vec(), "audio/wav"))
            .expect(1)
            .mount(&server)
            .await;

        let client = TextToSpeech::new(
            reqwest::Client::new(),
            Credential::new("tts-key", format!("{}/text-to-speech", server.uri())),
            &format!("{}/identity/token", server.uri()),
        );
        let params = SynthesisParams::from_query(query(&[
            ("text", "hi there"),
            ("voice", "en-US_AllisonV3Voice"),
        ]));

        let audio = client.synthesize(&params).await.unwrap();
        assert_eq!(&audio[..], b"RIFF....WAVE");
    }

    #[tokio::test]
    async fn test_unknown_voice_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/text-to-speech/v1/synthesize"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "error": "Model 'xx_Nobody' not found"
            })))
            .mount(&server)
            .await;

        let client = TextToSpeech::new(
            reqwest::Client::new(),
            Credential::new("tts-key", format!("{}/text-to-speech", server.uri())),
            &format!("{}/identity/token", server.uri()),
        );
        let params = SynthesisParams::from_query(query(&[("text", "hi"), ("voice", "xx_Nobody")]));

        let err = client.synthesize(&params).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
