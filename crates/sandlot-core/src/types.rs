//! Lifecycle contract types exchanged with the orchestrator.

use crate::payload::Any;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Options accompanying a start call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Backend-specific payloads keyed by extension name.
    #[serde(default)]
    pub extensions: HashMap<String, Any>,
    /// Free-form orchestrator annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl CreateOptions {
    /// Attach an extension payload.
    pub fn with_extension(mut self, key: impl Into<String>, payload: Any) -> Self {
        self.extensions.insert(key.into(), payload);
        self
    }
}

/// Options accompanying an update call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Backend-specific payloads keyed by extension name.
    #[serde(default)]
    pub extensions: HashMap<String, Any>,
    /// Free-form orchestrator annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// Options accompanying a delete call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {}

/// Handle to a created sandbox, handed to the orchestrator after start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(pub Any);

impl Descriptor {
    /// Get the wrapped payload.
    pub fn payload(&self) -> &Any {
        &self.0
    }

    /// Unwrap into the payload.
    pub fn into_payload(self) -> Any {
        self.0
    }
}

/// Lifecycle state reported by a status call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    /// The backend reports the sandbox as present.
    Ready,
    /// The sandbox exists but is not usable.
    NotReady,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::NotReady => write!(f, "not_ready"),
        }
    }
}

/// Result of a status call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStatus {
    /// Sandbox identifier
    pub id: String,
    /// Lifecycle state
    pub state: SandboxState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_options_from_sparse_json() {
        let opts: CreateOptions = serde_json::from_value(json!({})).unwrap();
        assert!(opts.extensions.is_empty());
        assert!(opts.annotations.is_empty());
    }

    #[test]
    fn test_descriptor_is_transparent() {
        let descriptor = Descriptor(Any {
            type_url: "t".into(),
            value: json!({"a": 1}),
        });
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({"type_url": "t", "value": {"a": 1}})
        );
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_value(SandboxState::Ready).unwrap(),
            json!("ready")
        );
        assert_eq!(SandboxState::NotReady.to_string(), "not_ready");
    }
}
