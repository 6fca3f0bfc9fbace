use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Io(std::io::Error),
    ConfigNotFound(PathBuf),
    MissingSetting(&'static str),
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },
    InvalidHeader(String),
    Json(serde_json::Error),
    /// The adapter answered a write without `ret=OK`; holds its `ret` value.
    NotAcknowledged(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::ConfigNotFound(path) => {
                write!(f, "configuration file not found at {}", path.display())
            }
            Error::MissingSetting(key) => write!(f, "configuration is missing {key}"),
            Error::InvalidSetting { key, value, reason } => {
                write!(f, "invalid {key} {value:?}: {reason}")
            }
            Error::InvalidHeader(value) => write!(f, "invalid header value: {value:?}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::NotAcknowledged(ret) => {
                write!(f, "device did not acknowledge the write (ret={ret})")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl Error {
    /// True for configuration problems, which must stop the process before
    /// any device call.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound(_) | Error::MissingSetting(_) | Error::InvalidSetting { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
