use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

pub const TOKEN_ENDPOINT: &str = "/auth/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub status: u16,
    pub body: String,
}

impl TokenResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trades a long-lived key for a short-lived access token. No retries happen here.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, host: &str, key: &str) -> Result<TokenResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTokenExchanger {
    client: reqwest::Client,
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(&self, host: &str, key: &str) -> Result<TokenResponse> {
        let url = format!("{}{TOKEN_ENDPOINT}", host.trim_end_matches('/'));
        debug!(%url, "exchanging access key for token");
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|err| Error::connectivity_with(format!("token request to {host} failed"), err))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            Error::connectivity_with(format!("failed to read token response from {host}"), err)
        })?;
        Ok(TokenResponse { status, body })
    }
}
