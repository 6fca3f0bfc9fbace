use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::protocol::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MessageLogMode {
    #[default]
    Full,
    Diffed,
}

/// NDJSON trace of every exchange with the adapter.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Fields>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, path: &str, params: &[(&str, String)]) {
        let query: serde_json::Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v.as_str())))
            .collect();
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": "GET",
            "path": path,
            "query": query,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16, fields: &Fields) {
        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "path": path,
                "status": status,
                "body": fields,
            }),
            MessageLogMode::Diffed => match self.previous.get(path) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "status": status,
                    "full": true,
                    "body": fields,
                }),
                Some(prev) => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "status": status,
                    "changes": diff_fields(prev, fields),
                }),
            },
        };
        self.write_line(&entry);
        if self.mode == MessageLogMode::Diffed {
            self.previous.insert(path.to_string(), fields.clone());
        }
    }

    pub fn log_unreachable(&mut self, path: &str, cause: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "path": path,
            "error": cause,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

fn diff_fields(previous: &Fields, current: &Fields) -> Vec<Value> {
    let mut changes: Vec<Value> = current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, value)| json!({ "key": key, "old": previous.get(key), "new": value }))
        .collect();
    changes.extend(
        previous
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(key, value)| json!({ "key": key, "old": value, "new": null })),
    );
    changes
}
