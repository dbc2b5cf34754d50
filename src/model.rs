use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastContextRecord {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub namespace: String,
}

impl LastContextRecord {
    pub fn new(context: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            namespace: namespace.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeTarget {
    pub context: String,
    pub cluster_server: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Space {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Idle,
    BrowserAttempted,
    CallbackPending,
    ManualPending,
    KeyObtained,
    Verifying,
    Authenticated,
    Failed,
}

impl LoginPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BrowserAttempted => "browser-attempted",
            Self::CallbackPending => "callback-pending",
            Self::ManualPending => "manual-pending",
            Self::KeyObtained => "key-obtained",
            Self::Verifying => "verifying",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

impl Display for LoginPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
