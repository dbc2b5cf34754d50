use kube::config::Kubeconfig;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::KubeTarget;

const CURRENT_CONTEXT_KEY: &str = "current-context";

/// Operator-owned kube configuration. Only `current-context` is ever written back.
pub trait KubeconfigSource: Send + Sync {
    fn load(&self) -> Result<Kubeconfig>;
    fn save_current_context(&self, context: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct KubeconfigFile {
    path: PathBuf,
}

impl KubeconfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KubeconfigSource for KubeconfigFile {
    fn load(&self) -> Result<Kubeconfig> {
        if !self.path.exists() {
            return Err(Error::configuration(format!(
                "kube config {} not found. Make sure kubectl is installed and you have a working kubernetes context configured",
                self.path.display()
            )));
        }
        Kubeconfig::read_from(&self.path).map_err(|err| {
            Error::configuration_with(
                format!("failed to load kube config {}", self.path.display()),
                err,
            )
        })
    }

    fn save_current_context(&self, context: &str) -> Result<()> {
        let failed = |err: Box<dyn std::error::Error + Send + Sync>| {
            Error::configuration_with(
                format!("error saving kube config {}", self.path.display()),
                err,
            )
        };
        let raw = fs::read_to_string(&self.path).map_err(|err| failed(err.into()))?;
        let mut document: Value = serde_yaml::from_str(&raw).map_err(|err| failed(err.into()))?;
        let Some(mapping) = document.as_mapping_mut() else {
            return Err(Error::configuration(format!(
                "kube config {} is not a mapping",
                self.path.display()
            )));
        };
        mapping.insert(
            Value::String(CURRENT_CONTEXT_KEY.to_string()),
            Value::String(context.to_string()),
        );

        let rendered = serde_yaml::to_string(&document).map_err(|err| failed(err.into()))?;
        let staging = self.path.with_extension("skiff.tmp");
        fs::write(&staging, rendered).map_err(|err| failed(err.into()))?;
        let permissions = fs::metadata(&self.path)
            .map_err(|err| failed(err.into()))?
            .permissions();
        fs::set_permissions(&staging, permissions).map_err(|err| failed(err.into()))?;
        fs::rename(&staging, &self.path).map_err(|err| failed(err.into()))?;
        debug!(%context, path = %self.path.display(), "switched current kube context");
        Ok(())
    }
}

pub fn build_kube_targets(kubeconfig: &Kubeconfig) -> Vec<KubeTarget> {
    let mut cluster_servers = HashMap::new();
    for cluster in &kubeconfig.clusters {
        let server = cluster
            .cluster
            .as_ref()
            .and_then(|entry| entry.server.clone());
        cluster_servers.insert(cluster.name.clone(), server);
    }

    let mut targets = kubeconfig
        .contexts
        .iter()
        .filter_map(|named| {
            let context = named.context.as_ref()?;
            Some(KubeTarget {
                context: named.name.clone(),
                cluster_server: cluster_servers
                    .get(&context.cluster)
                    .cloned()
                    .unwrap_or(None),
                namespace: context
                    .namespace
                    .clone()
                    .filter(|namespace| !namespace.is_empty()),
            })
        })
        .collect::<Vec<_>>();

    targets.sort_by(|left, right| left.context.cmp(&right.context));
    targets
}
