//! Token Issuer: hands out short-lived bearer tokens for the speech-to-text service so
//! the browser can open its own authenticated connection.

use super::{IamAuthenticator, ServiceError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    auth: IamAuthenticator,
}

impl TokenIssuer {
    pub fn new(auth: IamAuthenticator) -> Self {
        Self { auth }
    }

    /// Acquire a new token. One attempt, no retry; the caller owns its expiry.
    pub async fn get_token(&self) -> Result<String, ServiceError> {
        let token = self.auth.request_token().await?;
        debug!(expires_in = ?token.expires_in, "Issued speech-to-text token");
        Ok(token.access_token)
    }
}
