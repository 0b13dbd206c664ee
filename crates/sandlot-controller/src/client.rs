//! Client for the controller socket.
//!
//! Exchanges newline-delimited JSON-RPC 2.0 messages over one Unix socket
//! connection, one call at a time.

use crate::protocol::{
    methods, DeleteParams, IdParams, Request, Response, StartParams, StartResult, UpdateParams,
};
use sandlot_core::{
    CreateOptions, DeleteOptions, Descriptor, ErrorCode, SandboxStatus, UpdateOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::UnixStream;
use tokio::time::timeout;

/// Local wait for a response when the call carries no deadline.
///
/// Longer than the backend's graceful stop budget so a slow stop is not cut off.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(150);

/// Errors returned by [`ControllerClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i32,
        kind: Option<ErrorCode>,
        message: String,
    },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("response id {actual} does not match request id {expected}")]
    UnexpectedResponse { expected: u64, actual: u64 },

    #[error("connection closed by controller")]
    Closed,
}

impl ClientError {
    /// Lifecycle classification of a server-side failure.
    pub fn kind(&self) -> Option<ErrorCode> {
        match self {
            Self::Rpc { kind, .. } => *kind,
            _ => None,
        }
    }
}

/// Connection to a running controller.
pub struct ControllerClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: BufWriter<tokio::io::WriteHalf<UnixStream>>,
    next_id: u64,
    deadline: Option<Duration>,
    /// Set while a call is outstanding. Still set when a call ends early,
    /// since its response may yet arrive and would be read by the next call.
    broken: bool,
}

impl ControllerClient {
    /// Connect to the controller socket at `path`.
    pub async fn connect(path: &Path) -> Result<Self, ClientError> {
        tracing::debug!(path = %path.display(), "Connecting to controller");

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| ClientError::Connection(format!("{}: {e}", path.display())))?;

        let (read_half, write_half) = tokio::io::split(stream);
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            next_id: 1,
            deadline: None,
            broken: false,
        })
    }

    /// Attach a deadline to every subsequent call.
    ///
    /// The controller abandons a call that outlives it and reports
    /// [`ErrorCode::DeadlineExceeded`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Send a JSON-RPC request and wait for its result.
    ///
    /// A call that times out, fails mid-exchange or is dropped before its
    /// response is read leaves the connection unusable; later calls return
    /// [`ClientError::Closed`] and the caller should reconnect.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: P,
    ) -> Result<R, ClientError> {
        if self.broken {
            return Err(ClientError::Closed);
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut request = Request::new(id, method, serde_json::to_value(params)?);
        request.timeout_ms = self.deadline.map(|d| d.as_millis() as u64);

        let request_str = serde_json::to_string(&request)?;
        tracing::debug!(method = %method, id, "Sending RPC request");
        tracing::trace!(request = %request_str, "RPC request body");

        self.broken = true;
        self.writer.write_all(request_str.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let wait = self
            .deadline
            .map(|d| d + Duration::from_secs(1))
            .unwrap_or(RESPONSE_TIMEOUT);

        let mut response_str = String::new();
        let bytes_read = timeout(wait, self.reader.read_line(&mut response_str))
            .await
            .map_err(|_| {
                tracing::warn!(method = %method, id, "RPC response timeout");
                ClientError::Timeout(wait)
            })??;

        if bytes_read == 0 {
            return Err(ClientError::Closed);
        }

        tracing::trace!(response = %response_str.trim(), "RPC response body");
        let response: Response = serde_json::from_str(&response_str)?;

        if response.id != id {
            tracing::warn!(method = %method, id, response_id = response.id, "RPC response id mismatch");
            return Err(ClientError::UnexpectedResponse {
                expected: id,
                actual: response.id,
            });
        }
        self.broken = false;

        if let Some(error) = response.error {
            tracing::debug!(method = %method, id, code = error.code, message = %error.message, "RPC error response");
            return Err(ClientError::Rpc {
                code: error.code,
                kind: error.kind(),
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(ClientError::from)
    }

    /// Provision a sandbox.
    pub async fn start(
        &mut self,
        id: &str,
        options: CreateOptions,
    ) -> Result<Descriptor, ClientError> {
        let result: StartResult = self
            .call(
                methods::START,
                StartParams {
                    id: id.to_string(),
                    options,
                },
            )
            .await?;
        Ok(result.descriptor)
    }

    /// Stop a sandbox.
    pub async fn stop(&mut self, id: &str) -> Result<(), ClientError> {
        self.call(methods::STOP, IdParams { id: id.to_string() })
            .await
    }

    /// Update a sandbox.
    pub async fn update(
        &mut self,
        id: &str,
        options: UpdateOptions,
        field_paths: Vec<String>,
    ) -> Result<(), ClientError> {
        self.call(
            methods::UPDATE,
            UpdateParams {
                id: id.to_string(),
                options,
                field_paths,
            },
        )
        .await
    }

    /// Query a sandbox.
    pub async fn status(&mut self, id: &str) -> Result<SandboxStatus, ClientError> {
        self.call(methods::STATUS, IdParams { id: id.to_string() })
            .await
    }

    /// Release a sandbox.
    pub async fn delete(&mut self, id: &str, options: DeleteOptions) -> Result<(), ClientError> {
        self.call(
            methods::DELETE,
            DeleteParams {
                id: id.to_string(),
                options,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_only_for_rpc_errors() {
        let err = ClientError::Rpc {
            code: -32012,
            kind: Some(ErrorCode::NotImplemented),
            message: "update: not implemented".into(),
        };
        assert_eq!(err.kind(), Some(ErrorCode::NotImplemented));
        assert_eq!(ClientError::Closed.kind(), None);
    }

    /// Accept one connection and answer each request line with `reply`,
    /// after `delay`.
    fn serve_once(
        listener: tokio::net::UnixListener,
        delay: Duration,
        reply: impl Fn(u64) -> Response + Send + 'static,
    ) {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = tokio::io::split(stream);
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Request = serde_json::from_str(&line).unwrap();
                tokio::time::sleep(delay).await;
                let json = serde_json::to_string(&reply(request.id)).unwrap();
                if writer.write_all(format!("{json}\n").as_bytes()).await.is_err() {
                    break;
                }
            }
        });
    }

    #[tokio::test]
    async fn test_mismatched_response_id_breaks_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        serve_once(listener, Duration::ZERO, |id| {
            Response::success(id + 7, serde_json::Value::Null)
        });

        let mut client = ControllerClient::connect(&path).await.unwrap();
        let err = client.stop("sb-1").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedResponse {
                expected: 1,
                actual: 8
            }
        ));

        let err = client.stop("sb-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn test_late_response_is_never_read_as_next_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        serve_once(listener, Duration::from_millis(1500), |id| {
            Response::success(id, serde_json::Value::Null)
        });

        let mut client = ControllerClient::connect(&path)
            .await
            .unwrap()
            .with_deadline(Duration::from_millis(100));

        let err = client.stop("sb-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        // The stop's null result arrives later; status must not consume it
        tokio::time::sleep(Duration::from_millis(600)).await;
        let err = client.status("sb-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn test_sequential_calls_share_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        serve_once(listener, Duration::ZERO, |id| {
            Response::success(id, serde_json::Value::Null)
        });

        let mut client = ControllerClient::connect(&path).await.unwrap();
        for _ in 0..3 {
            client.stop("sb-1").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let result = ControllerClient::connect(&dir.path().join("missing.sock")).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }
}
