//! Messages exchanged with the stability worker.
//!
//! Every message crosses the boundary as one JSON object:
//!
//! ```text
//! {"type": "init", "params": [{"type": "mirror", "version": 1}, ...]}
//! {"type": "system", "params": {"elements": [{"type": "lens", "name": "L1", "prop": {...}}]}}
//! {"type": "variables", "params": {"x": 0.25}}
//! {"type": "test"}
//! ```

use std::collections::BTreeMap;

use lasercanvas_engine::VariableError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{ElementDef, ElementJson, ElementKind};
use crate::matrix::Matrix2x2;

/// Largest accepted message, in bytes of JSON text.
pub const MAX_MESSAGE_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message exceeds maximum size ({MAX_MESSAGE_BYTES} bytes, got {0})")]
    TooLarge(usize),
    #[error("unknown element kind `{0}`")]
    UnknownKind(String),
    #[error("element kind `{kind}` was built for registry version {got}, expected {expected}")]
    VersionMismatch {
        kind: ElementKind,
        got: u32,
        expected: u32,
    },
    #[error("element kind `{0}` has not been registered")]
    NotRegistered(ElementKind),
    #[error("system has no elements")]
    EmptySystem,
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error("worker is not running")]
    Closed,
}

/// Host-to-worker message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum WorkerMessage {
    Init(Vec<ElementDef>),
    System(SystemSnapshot),
    Variables(BTreeMap<String, f64>),
    Test,
}

/// Serialized optical system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    #[serde(default)]
    pub prop: serde_json::Value,
    #[serde(default)]
    pub elements: Vec<ElementJson>,
}

impl SystemSnapshot {
    pub fn new(elements: Vec<ElementJson>) -> Self {
        Self {
            prop: serde_json::Value::Null,
            elements,
        }
    }
}

/// Worker-to-host message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReply {
    Ready {
        kinds: Vec<ElementKind>,
    },
    Abcd {
        element: String,
        sagittal: Matrix2x2,
        tangential: Matrix2x2,
    },
    Pong,
    Rejected {
        reason: String,
    },
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode<T: DeserializeOwned>(json: &str) -> Result<T, ProtocolError> {
    if json.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge(json.len()));
    }
    Ok(serde_json::from_str(json)?)
}
