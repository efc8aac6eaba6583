//! Fire-and-forget event log for skipped units.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::SyncError;
use crate::logging::EVENT_LOG_TARGET;

pub trait EventSink: Send + Sync {
    /// Records one event. Never fails and never panics.
    fn log(&self, context: &str, message: &str, payload: Option<&Value>);

    fn error(&self, context: &str, err: &SyncError) {
        let payload = err.payload();
        self.log(context, &err.to_string(), payload.as_ref());
    }
}

/// Forwards events to `tracing` under the `event_log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, context: &str, message: &str, payload: Option<&Value>) {
        match payload {
            Some(p) => warn!(target: EVENT_LOG_TARGET, context, payload = %p, "{message}"),
            None => warn!(target: EVENT_LOG_TARGET, context, "{message}"),
        }
    }
}

/// Appends one JSON object per event to a file, and traces it as well.
pub struct NdjsonSink {
    file: Mutex<File>,
}

impl NdjsonSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for NdjsonSink {
    fn log(&self, context: &str, message: &str, payload: Option<&Value>) {
        TracingSink.log(context, message, payload);
        let line = json!({
            "ts": chrono::Utc::now(),
            "context": context,
            "message": message,
            "payload": payload,
        });
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}
