use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Transport,
    Validation,
    NotFound,
    Server,
}

#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("transport failure: {message}")]
    Transport { message: String },
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },
}

impl Fault {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self::Status { status, body }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Transport { .. } => FaultKind::Transport,
            Fault::Status { status: 404, .. } => FaultKind::NotFound,
            Fault::Status { status, .. } if *status >= 500 => FaultKind::Server,
            Fault::Status { .. } => FaultKind::Validation,
        }
    }

    pub fn envelope(&self) -> Value {
        match self {
            Fault::Transport { message } => json!({ "message": message }),
            Fault::Status { body, .. } => {
                let mut envelope = serde_json::Map::new();
                if let Value::Object(fields) = body {
                    for key in ["message", "errors"] {
                        if let Some(value) = fields.get(key) {
                            envelope.insert(key.to_string(), value.clone());
                        }
                    }
                }
                envelope.insert("data".to_string(), body.clone());
                Value::Object(envelope)
            }
        }
    }
}
