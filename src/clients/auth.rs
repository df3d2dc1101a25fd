//! API key → bearer token exchange.
//!
//! Every upstream accepts an IAM bearer token. The exchange is repeated for every call;
//! no token is cached between requests.

use super::{check_status, ServiceError};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::fmt;

const IAM_SERVICE: &str = "identity service";
const APIKEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Response body of the identity token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Clone)]
pub struct IamAuthenticator {
    http: reqwest::Client,
    iam_url: String,
    api_key: String,
}

impl fmt::Debug for IamAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamAuthenticator")
            .field("iam_url", &self.iam_url)
            .finish_non_exhaustive()
    }
}

impl IamAuthenticator {
    pub fn new(http: reqwest::Client, iam_url: &str, api_key: &str) -> Self {
        Self {
            http,
            iam_url: iam_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Exchange the API key for a fresh bearer token.
    ///
    /// A rejected key comes back as `ServiceError::Status` carrying the identity
    /// service's own status code (typically 400 or 401).
    pub async fn request_token(&self) -> Result<IamToken, ServiceError> {
        let response = self
            .http
            .post(&self.iam_url)
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", APIKEY_GRANT), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::transport(IAM_SERVICE, e))?;

        let response = check_status(IAM_SERVICE, response).await?;

        response
            .json::<IamToken>()
            .await
            .map_err(|e| ServiceError::decode(IAM_SERVICE, e))
    }

    /// Bearer token string for an authenticated upstream call.
    pub async fn bearer(&self) -> Result<String, ServiceError> {
        Ok(self.request_token().await?.access_token)
    }
}
