use k8s_openapi::api::core::v1::Namespace;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::sync::Arc;
use tracing::debug;

use super::kubeconfig::KubeconfigSource;
use crate::error::{Error, Result};
use crate::model::DEFAULT_NAMESPACE;

/// Cluster client bound to the context and namespace one command acts on.
#[derive(Clone)]
pub struct ResolvedClient {
    client: Client,
    rest_config: Config,
    context: String,
    namespace: String,
}

impl ResolvedClient {
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn rest_config(&self) -> &Config {
        &self.rest_config
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn namespace_exists(&self) -> Result<bool> {
        let api: Api<Namespace> = Api::all(self.client());
        let found = api.get_opt(&self.namespace).await.map_err(|err| {
            Error::connectivity_with(
                format!(
                    "failed to read namespace '{}' through kube context '{}'",
                    self.namespace, self.context
                ),
                err,
            )
        })?;
        Ok(found.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub context: String,
    pub namespace: String,
    pub switched: bool,
}

#[derive(Clone)]
pub struct ContextResolver {
    source: Arc<dyn KubeconfigSource>,
}

impl ContextResolver {
    pub fn new(source: Arc<dyn KubeconfigSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &dyn KubeconfigSource {
        self.source.as_ref()
    }

    pub async fn resolve_default(&self) -> Result<ResolvedClient> {
        self.resolve(None, None, false).await
    }

    pub async fn resolve(
        &self,
        context: Option<&str>,
        namespace: Option<&str>,
        persist_switch: bool,
    ) -> Result<ResolvedClient> {
        let mut kubeconfig = self.source.load()?;
        let selection = select(&kubeconfig, context, namespace)?;

        if selection.switched && persist_switch {
            self.source.save_current_context(&selection.context)?;
        }
        if let Some(named) = kubeconfig
            .contexts
            .iter_mut()
            .find(|named| named.name == selection.context)
            && let Some(bound) = named.context.as_mut()
        {
            bound.namespace = Some(selection.namespace.clone());
        }

        let options = KubeConfigOptions {
            context: Some(selection.context.clone()),
            cluster: None,
            user: None,
        };
        let mut rest_config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|err| {
                Error::auth_with(
                    format!(
                        "failed to load credentials for kube context '{}'",
                        selection.context
                    ),
                    err,
                )
            })?;
        rest_config.default_namespace = selection.namespace.clone();

        let client = Client::try_from(rest_config.clone()).map_err(|err| {
            Error::connectivity_with(
                format!(
                    "failed to create client for kube context '{}'",
                    selection.context
                ),
                err,
            )
        })?;
        debug!(context = %selection.context, namespace = %selection.namespace, "resolved kube client");

        Ok(ResolvedClient {
            client,
            rest_config,
            context: selection.context,
            namespace: selection.namespace,
        })
    }
}

/// Picks the active context and namespace without touching disk.
pub fn select(
    kubeconfig: &Kubeconfig,
    context: Option<&str>,
    namespace: Option<&str>,
) -> Result<Selection> {
    let current = kubeconfig
        .current_context
        .clone()
        .filter(|name| !name.is_empty());
    let requested = context.filter(|name| !name.is_empty());

    let (active, switched) = match (requested, current) {
        (Some(requested), Some(current)) => (requested.to_string(), requested != current),
        (Some(requested), None) => (requested.to_string(), true),
        (None, Some(current)) => (current, false),
        (None, None) => {
            return Err(Error::configuration(
                "no current kube context is set; pass --context or run 'skiff use-context'",
            ));
        }
    };

    let Some(bound) = kubeconfig
        .contexts
        .iter()
        .find(|named| named.name == active)
        .and_then(|named| named.context.as_ref())
    else {
        return Err(Error::configuration(format!(
            "error loading kube config, context '{active}' doesn't exist"
        )));
    };

    let namespace = namespace
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| bound.namespace.clone().filter(|name| !name.is_empty()))
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    Ok(Selection {
        context: active,
        namespace,
        switched,
    })
}
