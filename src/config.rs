use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CALLBACK_PORT: u16 = 25853;
pub const DEFAULT_PROVIDER: &str = "skiff-cloud";
pub const DEFAULT_PROVIDER_HOST: &str = "https://app.skiff.cloud";

#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Option<String>,
    pub cloud: CloudSettings,
    pub drift: DriftSettings,
    pub kube: KubeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub provider: String,
    pub callback_port: u16,
    pub callback_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftSettings {
    pub context_delay: Duration,
    pub default_namespace_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KubeSettings {
    pub allow_private_clusters: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SkiffConfigFile {
    #[serde(default)]
    cloud: CloudSection,
    #[serde(default)]
    drift: DriftSection,
    #[serde(default)]
    kube: KubeSection,
}

#[derive(Debug, Clone, Deserialize)]
struct CloudSection {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_callback_port", alias = "port")]
    callback_port: u16,
    #[serde(default, alias = "timeout", alias = "timeout_secs")]
    callback_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct DriftSection {
    #[serde(default = "default_context_delay_secs")]
    context_delay_secs: u64,
    #[serde(default = "default_namespace_delay_secs")]
    default_namespace_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct KubeSection {
    #[serde(default = "default_allow_private")]
    allow_private_clusters: bool,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            callback_port: default_callback_port(),
            callback_timeout_secs: None,
        }
    }
}

impl Default for DriftSection {
    fn default() -> Self {
        Self {
            context_delay_secs: default_context_delay_secs(),
            default_namespace_delay_secs: default_namespace_delay_secs(),
        }
    }
}

impl Default for KubeSection {
    fn default() -> Self {
        Self {
            allow_private_clusters: default_allow_private(),
        }
    }
}

impl Settings {
    pub fn discover() -> Result<Self> {
        match discover_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::from_file(None, SkiffConfigFile::default())),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let parsed: SkiffConfigFile = if raw.trim().is_empty() {
            SkiffConfigFile::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse settings {}", path.display()))?
        };
        Ok(Self::from_file(Some(path.display().to_string()), parsed))
    }

    fn from_file(source: Option<String>, parsed: SkiffConfigFile) -> Self {
        Self {
            source,
            cloud: CloudSettings {
                provider: parsed.cloud.provider,
                callback_port: parsed.cloud.callback_port,
                callback_timeout: parsed
                    .cloud
                    .callback_timeout_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            },
            drift: DriftSettings {
                context_delay: Duration::from_secs(parsed.drift.context_delay_secs),
                default_namespace_delay: Duration::from_secs(
                    parsed.drift.default_namespace_delay_secs,
                ),
            },
            kube: KubeSettings {
                allow_private_clusters: parsed.kube.allow_private_clusters,
            },
        }
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_context_delay_secs() -> u64 {
    10
}

fn default_namespace_delay_secs() -> u64 {
    5
}

fn default_allow_private() -> bool {
    true
}

pub fn skiff_home() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SKIFF_HOME")
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("failed to locate home directory")?;
    Ok(home.join(".skiff"))
}

pub fn providers_path() -> Result<PathBuf> {
    Ok(skiff_home()?.join("providers.yaml"))
}

pub fn generated_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".skiff").join("generated.yaml")
}

pub fn kubeconfig_path() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("KUBECONFIG")
        && let Some(first) = std::env::split_paths(&value).find(|path| !path.as_os_str().is_empty())
    {
        return Ok(first);
    }
    let home = dirs::home_dir().context("failed to locate home directory")?;
    Ok(home.join(".kube").join("config"))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SKIFF_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("skiff.yaml"),
        PathBuf::from("skiff.yml"),
        PathBuf::from(".skiff.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Some(config_dir) = dirs::home_dir().map(|home| home.join(".config/skiff")) {
        let user_candidates = [
            config_dir.join("config.yaml"),
            config_dir.join("config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
