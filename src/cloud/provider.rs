use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{DEFAULT_PROVIDER, DEFAULT_PROVIDER_HOST};
use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Provider {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            key: None,
            token: None,
        }
    }

    pub fn host(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}

impl Debug for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("key", &redact(&self.key))
            .field("token", &redact(&self.token))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProviderConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(default)]
    providers: Vec<Provider>,
}

pub trait ProviderRepository: Send + Sync {
    fn load(&self, name: &str) -> Result<Provider>;
    fn save(&self, provider: &Provider) -> Result<()>;
}

/// Provider records kept in a single YAML document, rewritten whole on every save.
#[derive(Debug, Clone)]
pub struct FileProviderRepository {
    path: PathBuf,
}

impl FileProviderRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<ProviderConfigFile> {
        if !self.path.exists() {
            return Ok(ProviderConfigFile::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            Error::configuration_with(
                format!("failed to read providers {}", self.path.display()),
                err,
            )
        })?;
        if raw.trim().is_empty() {
            return Ok(ProviderConfigFile::default());
        }
        serde_yaml::from_str(&raw).map_err(|err| {
            Error::configuration_with(
                format!("failed to parse providers {}", self.path.display()),
                err,
            )
        })
    }

    fn write(&self, config: &ProviderConfigFile) -> Result<()> {
        let failed = |err: Box<dyn std::error::Error + Send + Sync>| {
            Error::configuration_with(
                format!("failed to save providers {}", self.path.display()),
                err,
            )
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| failed(err.into()))?;
        }
        let raw = serde_yaml::to_string(config).map_err(|err| failed(err.into()))?;
        let staging = self.path.with_extension("yaml.tmp");
        fs::write(&staging, raw).map_err(|err| failed(err.into()))?;
        restrict_permissions(&staging).map_err(|err| failed(err.into()))?;
        fs::rename(&staging, &self.path).map_err(|err| failed(err.into()))
    }
}

impl ProviderRepository for FileProviderRepository {
    fn load(&self, name: &str) -> Result<Provider> {
        let config = self.read()?;
        if let Some(provider) = config.providers.into_iter().find(|p| p.name == name) {
            return Ok(provider);
        }
        if name == DEFAULT_PROVIDER {
            return Ok(Provider::new(DEFAULT_PROVIDER, DEFAULT_PROVIDER_HOST));
        }
        Err(Error::configuration(format!(
            "provider '{name}' is not configured in {}",
            self.path.display()
        )))
    }

    fn save(&self, provider: &Provider) -> Result<()> {
        let mut config = self.read()?;
        match config.providers.iter_mut().find(|p| p.name == provider.name) {
            Some(existing) => *existing = provider.clone(),
            None => config.providers.push(provider.clone()),
        }
        if config.default.is_none() {
            config.default = Some(provider.name.clone());
        }
        self.write(&config)?;
        debug!(provider = %provider.name, path = %self.path.display(), "saved provider");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
