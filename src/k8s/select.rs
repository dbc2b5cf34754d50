use std::sync::Arc;
use tracing::debug;

use super::kubeconfig::build_kube_targets;
use super::network::private_endpoint_host;
use super::resolve::{ContextResolver, ResolvedClient};
use crate::error::{Error, Result};
use crate::model::KubeTarget;
use crate::terminal::{Log, Prompt, QuestionOptions};

pub struct ContextSelector {
    resolver: ContextResolver,
    prompt: Arc<dyn Prompt>,
    log: Arc<dyn Log>,
    allow_private: bool,
}

impl ContextSelector {
    pub fn new(
        resolver: ContextResolver,
        prompt: Arc<dyn Prompt>,
        log: Arc<dyn Log>,
        allow_private: bool,
    ) -> Self {
        Self {
            resolver,
            prompt,
            log,
            allow_private,
        }
    }

    /// Lets the operator pick a context, skipping clusters on private networks when disallowed.
    pub async fn select(&self, persist_switch: bool) -> Result<ResolvedClient> {
        let kubeconfig = self.resolver.source().load()?;
        let targets = build_kube_targets(&kubeconfig);
        if targets.is_empty() {
            return Err(Error::configuration(
                "no kube context found. Make sure kubectl is installed and you have a working kubernetes context configured",
            ));
        }

        let mut options = targets
            .iter()
            .map(|target| target.context.clone())
            .collect::<Vec<_>>();
        options.dedup();

        loop {
            let choice = if options.len() == 1 {
                options[0].clone()
            } else {
                let default_value = kubeconfig
                    .current_context
                    .clone()
                    .filter(|current| options.contains(current));
                let question = QuestionOptions::select(
                    "Which kube context do you want to use",
                    options.clone(),
                    default_value,
                );
                self.prompt.question(&question).await.map_err(|err| {
                    Error::configuration_with("failed to read kube context selection", err)
                })?
            };

            if let Some(host) = self.private_host(&targets, &choice).await? {
                self.log.info(&format!(
                    "Clusters with private ips ({host}) cannot be used"
                ));
                options.retain(|option| *option != choice);
                if options.is_empty() {
                    return Err(Error::policy(
                        "every kube context points at a cluster on a private network",
                    ));
                }
                continue;
            }

            debug!(context = %choice, "kube context selected");
            return self.resolver.resolve(Some(&choice), None, persist_switch).await;
        }
    }

    /// Switches to a named context, subject to the same private network policy.
    pub async fn select_named(&self, context: &str, persist_switch: bool) -> Result<ResolvedClient> {
        let kubeconfig = self.resolver.source().load()?;
        let targets = build_kube_targets(&kubeconfig);
        if let Some(host) = self.private_host(&targets, context).await? {
            return Err(Error::policy(format!(
                "Clusters with private ips ({host}) cannot be used"
            )));
        }
        self.resolver.resolve(Some(context), None, persist_switch).await
    }

    async fn private_host(&self, targets: &[KubeTarget], context: &str) -> Result<Option<String>> {
        if self.allow_private {
            return Ok(None);
        }
        let Some(server) = targets
            .iter()
            .find(|target| target.context == context)
            .and_then(|target| target.cluster_server.as_deref())
        else {
            return Ok(None);
        };
        private_endpoint_host(server).await
    }
}
