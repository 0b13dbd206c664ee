//! Routes JSON-RPC requests to a [`Controller`].

use crate::protocol::{
    error_codes, methods, DeleteParams, IdParams, Request, Response, StartParams, StartResult,
    UpdateParams, JSONRPC_VERSION,
};
use sandlot_core::{Controller, ControllerError, ErrorCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Why a dispatched call produced no result.
enum DispatchError {
    MethodNotFound(String),
    InvalidParams(serde_json::Error),
    Controller(ControllerError),
    DeadlineExceeded(Duration),
    Encode(serde_json::Error),
}

impl From<ControllerError> for DispatchError {
    fn from(err: ControllerError) -> Self {
        Self::Controller(err)
    }
}

/// RPC front end of the lifecycle adapter.
///
/// Each request maps to exactly one controller call. The service keeps no
/// state between requests, so a single instance is shared by every
/// connection.
pub struct RpcService<C: ?Sized> {
    controller: Arc<C>,
}

impl<C: Controller + ?Sized> RpcService<C> {
    /// Wrap a controller.
    pub fn new(controller: Arc<C>) -> Self {
        Self { controller }
    }

    /// Handle one raw request line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(req) => self.handle(req).await,
            Err(e) => {
                warn!(error = %e, "failed to parse request");
                Response::error(0, error_codes::PARSE_ERROR, format!("parse error: {}", e))
            }
        }
    }

    /// Handle a parsed request.
    ///
    /// A `timeout_ms` on the request bounds the whole call; expiry drops the
    /// in-flight controller future and reports `deadline_exceeded`.
    pub async fn handle(&self, req: Request) -> Response {
        debug!(method = %req.method, id = req.id, "handling request");
        trace!(params = ?req.params, "request params");

        if req.jsonrpc != JSONRPC_VERSION {
            return Response::error(
                req.id,
                error_codes::INVALID_REQUEST,
                format!("unsupported jsonrpc version: {}", req.jsonrpc),
            );
        }

        let call = self.dispatch(&req.method, req.params);
        let outcome = match req.timeout_ms {
            Some(ms) => {
                let deadline = Duration::from_millis(ms);
                tokio::time::timeout(deadline, call)
                    .await
                    .unwrap_or(Err(DispatchError::DeadlineExceeded(deadline)))
            }
            None => call.await,
        };

        let response = match outcome {
            Ok(result) => Response::success(req.id, result),
            Err(DispatchError::MethodNotFound(method)) => {
                warn!(method = %method, "unknown method");
                Response::error(
                    req.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("method not found: {}", method),
                )
            }
            Err(DispatchError::InvalidParams(e)) => {
                warn!(id = req.id, error = %e, "invalid params");
                Response::error(
                    req.id,
                    error_codes::INVALID_PARAMS,
                    format!("invalid params: {}", e),
                )
            }
            Err(DispatchError::Controller(e)) => Response::from_controller_error(req.id, &e),
            Err(DispatchError::DeadlineExceeded(deadline)) => Response::classified(
                req.id,
                ErrorCode::DeadlineExceeded,
                format!("deadline of {}ms exceeded", deadline.as_millis()),
            ),
            Err(DispatchError::Encode(e)) => {
                Response::error(req.id, error_codes::INTERNAL_ERROR, e.to_string())
            }
        };

        if let Some(error) = &response.error {
            debug!(id = req.id, code = error.code, message = %error.message, "request failed");
        } else {
            debug!(id = req.id, "request succeeded");
        }

        response
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, DispatchError> {
        match method {
            methods::START => {
                let p: StartParams = parse_params(params)?;
                let descriptor = self.controller.start(&p.id, p.options).await?;
                encode(&StartResult { descriptor })
            }
            methods::STOP => {
                let p: IdParams = parse_params(params)?;
                self.controller.stop(&p.id).await?;
                Ok(Value::Null)
            }
            methods::UPDATE => {
                let p: UpdateParams = parse_params(params)?;
                self.controller
                    .update(&p.id, p.options, &p.field_paths)
                    .await?;
                Ok(Value::Null)
            }
            methods::STATUS => {
                let p: IdParams = parse_params(params)?;
                let status = self.controller.status(&p.id).await?;
                encode(&status)
            }
            methods::DELETE => {
                let p: DeleteParams = parse_params(params)?;
                self.controller.delete(&p.id, p.options).await?;
                Ok(Value::Null)
            }
            other => Err(DispatchError::MethodNotFound(other.to_string())),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, DispatchError> {
    serde_json::from_value(params).map_err(DispatchError::InvalidParams)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(DispatchError::Encode)
}
