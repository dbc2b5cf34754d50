use std::sync::Arc;
use tracing::debug;

use super::exchange::TokenExchanger;
use super::provider::{Provider, ProviderRepository};
use super::token::is_token_valid;
use crate::error::{Error, Result};

/// Holds a provider's key and cached token, exchanging and persisting on demand.
pub struct TokenStore {
    provider: Provider,
    exchanger: Arc<dyn TokenExchanger>,
    repository: Arc<dyn ProviderRepository>,
}

impl TokenStore {
    pub fn new(
        provider: Provider,
        exchanger: Arc<dyn TokenExchanger>,
        repository: Arc<dyn ProviderRepository>,
    ) -> Self {
        Self {
            provider,
            exchanger,
            repository,
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub(crate) fn provider_mut(&mut self) -> &mut Provider {
        &mut self.provider
    }

    pub(crate) fn exchanger(&self) -> &dyn TokenExchanger {
        self.exchanger.as_ref()
    }

    pub fn save(&self) -> Result<()> {
        self.repository.save(&self.provider)
    }

    pub async fn get_token(&mut self) -> Result<String> {
        let key = match self.provider.key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return Err(Error::configuration(format!(
                    "provider '{}' has no key specified",
                    self.provider.name
                )));
            }
        };
        if let Some(token) = self.provider.token.as_deref()
            && is_token_valid(token)
        {
            return Ok(token.to_string());
        }

        debug!(provider = %self.provider.name, "cached token missing or expired");
        let token = exchange_token(self.exchanger.as_ref(), self.provider.host(), &key).await?;
        self.provider.token = Some(token.clone());
        self.save().map_err(|err| err.context("token save"))?;
        Ok(token)
    }
}

pub(crate) async fn exchange_token(
    exchanger: &dyn TokenExchanger,
    host: &str,
    key: &str,
) -> Result<String> {
    let response = exchanger.exchange(host, key).await?;
    if !response.is_success() {
        return Err(Error::auth(format!(
            "error retrieving token from {host}: code {} => {}. Try to re-run login with 'skiff login'",
            response.status,
            response.body.trim()
        )));
    }
    let token = response.body.trim().to_string();
    if !is_token_valid(&token) {
        return Err(Error::auth(format!("received invalid token from provider {host}")));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::TokenStore;
    use crate::cloud::provider::Provider;
    use crate::error::ErrorKind;
    use crate::testing::{CountingExchanger, MemoryProviderRepository, jwt_with_exp};
    use chrono::Utc;
    use std::sync::Arc;

    fn provider(key: Option<&str>, token: Option<String>) -> Provider {
        let mut provider = Provider::new("cloud", "https://cloud.example");
        provider.key = key.map(str::to_string);
        provider.token = token;
        provider
    }

    fn fresh_token() -> String {
        jwt_with_exp(Some(Utc::now().timestamp() + 3600))
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let exchanger = Arc::new(CountingExchanger::ok(fresh_token()));
        let repository = Arc::new(MemoryProviderRepository::default());
        let mut store = TokenStore::new(provider(None, None), exchanger.clone(), repository);

        let err = store.get_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("no key specified"));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn valid_cached_token_is_returned_without_exchange() {
        let cached = fresh_token();
        let exchanger = Arc::new(CountingExchanger::ok(fresh_token()));
        let repository = Arc::new(MemoryProviderRepository::default());
        let mut store = TokenStore::new(
            provider(Some("key"), Some(cached.clone())),
            exchanger.clone(),
            repository.clone(),
        );

        assert_eq!(store.get_token().await.unwrap(), cached);
        assert_eq!(exchanger.calls(), 0);
        assert_eq!(repository.saves(), 0);
    }

    #[tokio::test]
    async fn first_call_exchanges_once_and_persists() {
        let issued = fresh_token();
        let exchanger = Arc::new(CountingExchanger::ok(issued.clone()));
        let repository = Arc::new(MemoryProviderRepository::default());
        let mut store = TokenStore::new(
            provider(Some("key"), None),
            exchanger.clone(),
            repository.clone(),
        );

        assert_eq!(store.get_token().await.unwrap(), issued);
        assert_eq!(store.get_token().await.unwrap(), issued);
        assert_eq!(exchanger.calls(), 1);
        assert_eq!(exchanger.last_key().as_deref(), Some("key"));
        assert_eq!(repository.saves(), 1);
        assert_eq!(
            repository.stored("cloud").and_then(|p| p.token),
            Some(issued)
        );
    }

    #[tokio::test]
    async fn expired_cached_token_triggers_exchange() {
        let expired = jwt_with_exp(Some(Utc::now().timestamp() - 60));
        let issued = fresh_token();
        let exchanger = Arc::new(CountingExchanger::ok(issued.clone()));
        let mut store = TokenStore::new(
            provider(Some("key"), Some(expired)),
            exchanger.clone(),
            Arc::new(MemoryProviderRepository::default()),
        );

        assert_eq!(store.get_token().await.unwrap(), issued);
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn rejected_exchange_embeds_status_body_and_hint() {
        let exchanger = Arc::new(CountingExchanger::status(403, "key disabled"));
        let repository = Arc::new(MemoryProviderRepository::default());
        let mut store = TokenStore::new(provider(Some("key"), None), exchanger, repository.clone());

        let err = store.get_token().await.unwrap_err();
        let message = err.to_string();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(message.contains("403"));
        assert!(message.contains("key disabled"));
        assert!(message.contains("skiff login"));
        assert_eq!(repository.saves(), 0);
    }

    #[tokio::test]
    async fn malformed_token_from_provider_is_rejected() {
        let exchanger = Arc::new(CountingExchanger::ok("garbage".to_string()));
        let mut store = TokenStore::new(
            provider(Some("key"), None),
            exchanger,
            Arc::new(MemoryProviderRepository::default()),
        );

        let err = store.get_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.to_string().contains("invalid token from provider"));
        assert_eq!(store.provider().token, None);
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced() {
        let repository = Arc::new(MemoryProviderRepository::failing());
        let mut store = TokenStore::new(
            provider(Some("key"), None),
            Arc::new(CountingExchanger::ok(fresh_token())),
            repository,
        );

        let err = store.get_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().starts_with("token save"));
    }
}
