use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "daikin.conf";

const IP_ADDRESS: &str = "IP_ADDRESS";
const MY_UUID: &str = "MY_UUID";

/// Per-installation settings from `daikin.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ip_address: String,
    /// Sent verbatim in the `X-Daikin-uuid` header.
    pub uuid: String,
}

impl Settings {
    /// Load from `explicit`, or from the first default location that exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => locate()?,
        };
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "loading settings");
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// `KEY=VALUE` lines; `#` comments and lines without `=` are skipped.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut values: HashMap<&str, &str> = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim(), value.trim());
            }
        }

        for key in values.keys().filter(|k| **k != IP_ADDRESS && **k != MY_UUID) {
            debug!(key, "ignoring unknown setting");
        }

        let required = |key: &'static str| {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .ok_or(Error::MissingSetting(key))
        };
        let ip_address = required(IP_ADDRESS)?;
        let uuid = required(MY_UUID)?;

        Uuid::parse_str(&uuid).map_err(|e| Error::InvalidSetting {
            key: MY_UUID,
            value: uuid.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { ip_address, uuid })
    }
}

/// `daikin.conf` beside the executable, then in the working directory.
pub fn default_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

fn locate() -> Result<PathBuf> {
    let candidates = default_locations();
    candidates
        .iter()
        .find(|p| p.is_file())
        .or_else(|| candidates.first())
        .cloned()
        .ok_or_else(|| Error::ConfigNotFound(PathBuf::from(CONFIG_FILE_NAME)))
}

/// A fresh identifier for `MY_UUID`.
pub fn new_installation_uuid() -> String {
    Uuid::new_v4().to_string()
}
