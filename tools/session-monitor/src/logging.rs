use crate::errors::MonitorError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

/// Installs the stderr fmt subscriber. `RUST_LOG` overrides the `info`
/// default. Repeated calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Append-only JSONL ledger of lifecycle events.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MonitorError::Io(e.to_string()))?;
        }
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncate_json(event.payload.clone(), self.max_payload_bytes),
        })
        .map_err(|e| MonitorError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MonitorError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| MonitorError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| MonitorError::Io(e.to_string()))
    }
}

/// Optional ledger handle. Write failures are reported and swallowed so a
/// full disk never ends a monitoring session.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    logger: Option<JsonlLogger>,
}

impl EventLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl AsRef<Path>) -> Self {
        Self {
            logger: Some(JsonlLogger::new(path)),
        }
    }

    pub fn record(&self, level: &str, event_type: &str, payload: Value) {
        let Some(logger) = &self.logger else {
            return;
        };
        if let Err(error) = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        }) {
            tracing::warn!(path = %logger.path.display(), %error, "event log write failed");
        }
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
