use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::generated::LastContextStore;
use super::resolve::ResolvedClient;
use crate::config::DriftSettings;
use crate::error::Result;
use crate::model::{DEFAULT_NAMESPACE, LastContextRecord};
use crate::terminal::Log;

/// Warns when a command is about to act on a different context or namespace than the last deploy.
pub struct DriftDetector {
    store: Arc<dyn LastContextStore>,
    log: Arc<dyn Log>,
    delays: DriftSettings,
}

impl DriftDetector {
    pub fn new(store: Arc<dyn LastContextStore>, log: Arc<dyn Log>, delays: DriftSettings) -> Self {
        Self { store, log, delays }
    }

    pub async fn check(&self, client: &ResolvedClient, will_mutate: bool) -> Result<()> {
        self.check_target(client.context(), client.namespace(), will_mutate)
            .await
    }

    pub async fn check_target(&self, context: &str, namespace: &str, will_mutate: bool) -> Result<()> {
        let last = match self.store.load() {
            Ok(last) => last,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable deployment state");
                self.log
                    .warn(&format!("Ignoring unreadable deployment state: {err}"));
                None
            }
        };

        match last {
            Some(last) => {
                let mut drifted = false;
                if !last.context.is_empty() && last.context != context {
                    self.log.write_line();
                    self.log.warn("Are you using the correct kube context?");
                    self.log.warn(&format!("Current kube context: '{context}'"));
                    self.log
                        .warn(&format!("Last    kube context: '{}'", last.context));
                    self.log.write_line();
                    self.log.info(&format!(
                        "Run 'skiff use-context {}' to change to the previous context",
                        last.context
                    ));
                    drifted = true;
                }
                if !last.namespace.is_empty() && last.namespace != namespace {
                    self.log.write_line();
                    self.log.warn("Are you using the correct namespace?");
                    self.log.warn(&format!("Current namespace: '{namespace}'"));
                    self.log
                        .warn(&format!("Last    namespace: '{}'", last.namespace));
                    self.log.write_line();
                    self.log.info(&format!(
                        "Pass '--namespace {}' to use the previous namespace",
                        last.namespace
                    ));
                    drifted = true;
                }
                if drifted && will_mutate {
                    self.pause(self.delays.context_delay).await;
                }
            }
            None if will_mutate && namespace == DEFAULT_NAMESPACE => {
                self.log.write_line();
                self.log.warn(
                    "Deploying into the 'default' namespace is usually not a good idea as this namespace cannot be deleted",
                );
                self.pause(self.delays.default_namespace_delay).await;
            }
            None => {}
        }

        if will_mutate {
            self.store
                .save(&LastContextRecord::new(context, namespace))
                .map_err(|err| err.context("save generated"))?;
        }

        self.log.info(&format!("Using kube context '{context}'"));
        self.log.info(&format!("Using namespace '{namespace}'"));
        Ok(())
    }

    async fn pause(&self, delay: Duration) {
        self.log.start_wait(&format!(
            "Will continue in {} seconds...",
            delay.as_secs()
        ));
        tokio::time::sleep(delay).await;
        self.log.stop_wait();
        self.log.write_line();
    }
}
