use crate::errors::ChannelError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

/// Side-effect sink for diagnostic events. Core logic never depends on
/// whether a write succeeded.
pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent<'_>) -> Result<(), ChannelError>;
}

pub type SharedLogger = Arc<dyn Logger>;

/// Emit through an optional logger, discarding sink failures.
pub fn log_event(logger: Option<&SharedLogger>, level: &str, event_type: &str, payload: Value) {
    if let Some(logger) = logger {
        let _ = logger.log(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

#[derive(Debug)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    write_lock: Mutex<()>,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), ChannelError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ChannelError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| ChannelError::Io(e.to_string()))?;

        // Replay consumers and callers can log concurrently.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ChannelError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ChannelError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| ChannelError::Io(e.to_string()))
    }
}

impl Logger for JsonlLogger {
    fn log(&self, event: &LogEvent<'_>) -> Result<(), ChannelError> {
        self.append(event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub level: String,
    pub event_type: String,
    pub payload: Value,
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<CapturedEvent>>,
}

impl MemoryLogger {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, event: &LogEvent<'_>) -> Result<(), ChannelError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CapturedEvent {
                level: event.level.to_string(),
                event_type: event.event_type.to_string(),
                payload: event.payload.clone(),
            });
        Ok(())
    }
}

/// Render any message for a log payload.
pub fn debug_payload<M: std::fmt::Debug>(msg: &M) -> Value {
    Value::String(format!("{msg:?}"))
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
