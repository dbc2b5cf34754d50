use std::error::Error as StdError;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Auth,
    Connectivity,
    Policy,
}

impl ErrorKind {
    /// Process exit status reported for an unrecovered error of this kind.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Configuration => 2,
            Self::Auth => 3,
            Self::Connectivity => 4,
            Self::Policy => 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    Auth {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    Policy { message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn auth_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Auth {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn connectivity_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::Policy { .. } => ErrorKind::Policy,
        }
    }

    /// Wraps an error from a nested step, keeping its kind.
    pub fn context(self, prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref();
        let wrapped = |message: String| format!("{prefix}: {message}");
        match self {
            Self::Configuration { message, source } => Self::Configuration {
                message: wrapped(message),
                source,
            },
            Self::Auth { message, source } => Self::Auth {
                message: wrapped(message),
                source,
            },
            Self::Connectivity { message, source } => Self::Connectivity {
                message: wrapped(message),
                source,
            },
            Self::Policy { message } => Self::Policy {
                message: wrapped(message),
            },
        }
    }
}
