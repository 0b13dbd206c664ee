//! JSON-RPC 2.0 wire protocol of the controller socket.
//!
//! Requests and responses are newline-delimited JSON objects.

use sandlot_core::{
    ControllerError, CreateOptions, DeleteOptions, Descriptor, ErrorCode, UpdateOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Lifecycle method names.
pub mod methods {
    /// Provision a sandbox.
    pub const START: &str = "start";
    /// Stop a sandbox.
    pub const STOP: &str = "stop";
    /// Change a sandbox (always unimplemented).
    pub const UPDATE: &str = "update";
    /// Query a sandbox.
    pub const STATUS: &str = "status";
    /// Release a sandbox.
    pub const DELETE: &str = "delete";
}

/// JSON-RPC 2.0 error codes.
pub mod error_codes {
    use sandlot_core::ErrorCode;

    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server-defined range for lifecycle failures
    pub const NOT_FOUND: i32 = -32004;
    pub const DEADLINE_EXCEEDED: i32 = -32008;
    pub const ALREADY_EXISTS: i32 = -32009;
    pub const FAILED_PRECONDITION: i32 = -32010;
    pub const NOT_IMPLEMENTED: i32 = -32012;
    pub const UNAVAILABLE: i32 = -32014;

    /// Numeric code for a lifecycle error classification.
    pub fn for_code(code: ErrorCode) -> i32 {
        match code {
            ErrorCode::InvalidArgument => INVALID_PARAMS,
            ErrorCode::NotFound => NOT_FOUND,
            ErrorCode::AlreadyExists => ALREADY_EXISTS,
            ErrorCode::FailedPrecondition => FAILED_PRECONDITION,
            ErrorCode::Unavailable => UNAVAILABLE,
            ErrorCode::DeadlineExceeded => DEADLINE_EXCEEDED,
            ErrorCode::NotImplemented => NOT_IMPLEMENTED,
            ErrorCode::Internal => INTERNAL_ERROR,
        }
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, must be "2.0".
    pub jsonrpc: String,
    /// Request identifier.
    pub id: u64,
    /// Method name to invoke.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
    /// Caller deadline for the call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Request {
    /// Build a request without a deadline.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
            timeout_ms: None,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Request identifier (matches request).
    pub id: u64,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Create a success response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self::with_error(
            id,
            RpcError {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    /// Create an error response classified by lifecycle kind.
    pub fn classified(id: u64, kind: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_error(id, RpcError::classified(kind, message))
    }

    /// Create an error response from a failed lifecycle call.
    pub fn from_controller_error(id: u64, err: &ControllerError) -> Self {
        Self::classified(id, err.code(), err.to_string())
    }

    fn with_error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// `{"kind": <ErrorCode>}` for lifecycle failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Build an error carrying a lifecycle classification.
    pub fn classified(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: error_codes::for_code(kind),
            message: message.into(),
            data: Some(serde_json::json!({ "kind": kind })),
        }
    }

    /// The lifecycle classification, if the error carries one.
    pub fn kind(&self) -> Option<ErrorCode> {
        let kind = self.data.as_ref()?.get("kind")?;
        serde_json::from_value(kind.clone()).ok()
    }
}

/// Parameters for the `start` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartParams {
    /// Sandbox identifier.
    pub id: String,
    /// Creation options.
    #[serde(default)]
    pub options: CreateOptions,
}

/// Result of the `start` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResult {
    /// Handle to the created sandbox.
    pub descriptor: Descriptor,
}

/// Parameters for the `stop` and `status` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdParams {
    /// Sandbox identifier.
    pub id: String,
}

/// Parameters for the `update` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParams {
    /// Sandbox identifier.
    pub id: String,
    /// Update options.
    #[serde(default)]
    pub options: UpdateOptions,
    /// Fields the update applies to.
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// Parameters for the `delete` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParams {
    /// Sandbox identifier.
    pub id: String,
    /// Delete options.
    #[serde(default)]
    pub options: DeleteOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let req: Request = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":7,"method":"status","params":{"id":"sb-1"},"timeout_ms":250}"#,
        )
        .unwrap();
        assert_eq!(req.id, 7);
        assert_eq!(req.method, methods::STATUS);
        assert_eq!(req.timeout_ms, Some(250));
    }

    #[test]
    fn test_success_response_omits_error() {
        let json = serde_json::to_value(Response::success(1, json!({"ok": true}))).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}));
    }

    #[test]
    fn test_classified_error_carries_kind() {
        let resp = Response::classified(3, ErrorCode::NotImplemented, "update: not implemented");
        let error = resp.error.unwrap();
        assert_eq!(error.code, error_codes::NOT_IMPLEMENTED);
        assert_eq!(error.kind(), Some(ErrorCode::NotImplemented));
        assert_eq!(error.data, Some(json!({"kind": "not_implemented"})));
    }

    #[test]
    fn test_plain_error_has_no_kind() {
        let resp = Response::error(0, error_codes::PARSE_ERROR, "parse error");
        assert_eq!(resp.error.unwrap().kind(), None);
    }

    #[test]
    fn test_every_kind_has_distinct_code() {
        let kinds = [
            ErrorCode::InvalidArgument,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::FailedPrecondition,
            ErrorCode::Unavailable,
            ErrorCode::DeadlineExceeded,
            ErrorCode::NotImplemented,
            ErrorCode::Internal,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| error_codes::for_code(*k)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_params_defaults() {
        let params: StartParams = serde_json::from_value(json!({"id": "sb-1"})).unwrap();
        assert!(params.options.extensions.is_empty());

        let params: UpdateParams = serde_json::from_value(json!({"id": "sb-1"})).unwrap();
        assert!(params.field_paths.is_empty());
    }
}
