use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::LastContextRecord;

pub const DEFAULT_PROFILE: &str = "default";

/// Read/write access to the context used by the last mutating command of a project.
pub trait LastContextStore: Send + Sync {
    fn load(&self) -> Result<Option<LastContextRecord>>;
    fn save(&self, record: &LastContextRecord) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, ProfileState>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_context: Option<LastContextRecord>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl GeneratedConfig {
    fn active_profile(&self) -> &str {
        self.active_profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedFile {
    path: PathBuf,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_raw(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            Error::configuration_with(format!("failed to read {}", self.path.display()), err)
        })?;
        Ok(Some(raw).filter(|raw| !raw.trim().is_empty()))
    }

    fn parse(&self, raw: Option<&str>) -> Result<GeneratedConfig> {
        let Some(raw) = raw else {
            return Ok(GeneratedConfig::default());
        };
        serde_yaml::from_str(raw).map_err(|err| {
            Error::configuration_with(format!("failed to parse {}", self.path.display()), err)
        })
    }
}

impl LastContextStore for GeneratedFile {
    fn load(&self) -> Result<Option<LastContextRecord>> {
        let raw = self.read_raw()?;
        let config = self.parse(raw.as_deref())?;
        Ok(config
            .profiles
            .get(config.active_profile())
            .and_then(|profile| profile.last_context.clone()))
    }

    fn save(&self, record: &LastContextRecord) -> Result<()> {
        // A corrupt file is replaced; I/O failures are not.
        let raw = self.read_raw()?;
        let mut config = self.parse(raw.as_deref()).unwrap_or_else(|err| {
            debug!(error = %err, "replacing corrupt generated state");
            GeneratedConfig::default()
        });
        let profile = config.active_profile().to_string();
        config.profiles.entry(profile).or_default().last_context = Some(record.clone());

        let failed = |err: Box<dyn std::error::Error + Send + Sync>| {
            Error::configuration_with(format!("failed to save {}", self.path.display()), err)
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| failed(err.into()))?;
        }
        let raw = serde_yaml::to_string(&config).map_err(|err| failed(err.into()))?;
        fs::write(&self.path, raw).map_err(|err| failed(err.into()))?;
        debug!(context = %record.context, namespace = %record.namespace, "recorded last kube context");
        Ok(())
    }
}
