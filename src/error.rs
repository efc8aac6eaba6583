use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy for everything below the binary.
///
/// Each variant is caught at the narrowest unit it affects (page, chunk,
/// record, commit) and turned into a skip; only the bootstrap layer lets
/// errors escape, and it does so through `anyhow`.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("transport ({endpoint}): {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("http {status} ({endpoint}): {body}")]
    Protocol {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("shape ({endpoint}): {detail}")]
    Shape {
        endpoint: &'static str,
        detail: String,
        payload: Option<Value>,
    },
    #[error("persistence: {0}")]
    Persistence(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Protocol,
    Shape,
    Persistence,
}

impl SyncError {
    pub fn shape(endpoint: &'static str, detail: impl Into<String>, payload: Option<Value>) -> Self {
        SyncError::Shape {
            endpoint,
            detail: detail.into(),
            payload,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transport { .. } => ErrorKind::Transport,
            SyncError::Protocol { .. } => ErrorKind::Protocol,
            SyncError::Shape { .. } => ErrorKind::Shape,
            SyncError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// The response body that triggered the failure, if one was captured.
    pub fn payload(&self) -> Option<Value> {
        match self {
            SyncError::Shape { payload, .. } => payload.clone(),
            SyncError::Protocol { body, .. } => Some(
                serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone())),
            ),
            _ => None,
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
