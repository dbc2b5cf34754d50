use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Space;

pub const GRAPHQL_ENDPOINT: &str = "/graphql";

const LIST_SPACES_QUERY: &str = "query { manager_spaces { id name } }";

/// Cheapest authenticated provider call, used to verify freshly obtained keys.
#[async_trait]
pub trait SpacesApi: Send + Sync {
    async fn list_spaces(&self, host: &str, token: &str) -> Result<Vec<Space>>;
}

#[derive(Debug, Clone, Default)]
pub struct GraphqlSpacesApi {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<SpacesData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct SpacesData {
    #[serde(default)]
    manager_spaces: Vec<Space>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[async_trait]
impl SpacesApi for GraphqlSpacesApi {
    async fn list_spaces(&self, host: &str, token: &str) -> Result<Vec<Space>> {
        let url = format!("{}{GRAPHQL_ENDPOINT}", host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "query": LIST_SPACES_QUERY }))
            .send()
            .await
            .map_err(|err| Error::connectivity_with(format!("request to {url} failed"), err))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "provider {host} rejected credentials: code {} => {}",
                status.as_u16(),
                body.trim()
            )));
        }
        let response = response.error_for_status().map_err(|err| {
            Error::connectivity_with(format!("provider {host} returned an error"), err)
        })?;
        let payload: GraphqlResponse = response.json().await.map_err(|err| {
            Error::connectivity_with(format!("unexpected response from {url}"), err)
        })?;

        if let Some(first) = payload.errors.first() {
            return Err(Error::auth(format!(
                "provider {host} refused to list spaces: {}",
                first.message
            )));
        }
        let spaces = payload.data.map(|data| data.manager_spaces).unwrap_or_default();
        debug!(count = spaces.len(), "listed spaces");
        Ok(spaces)
    }
}
