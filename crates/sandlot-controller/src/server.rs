//! Service supervisor.
//!
//! Owns the listening socket and runs two tasks for the life of the
//! process: the serve task (accept loop plus per-connection handlers) and
//! the signal task. Whichever ends first cancels a shared token; the
//! supervisor then waits for both and reports the first error.

use crate::config::ControllerConfig;
use crate::service::RpcService;
use async_trait::async_trait;
use sandlot_core::Controller;
use std::future::Future;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Constructed, socket not bound yet.
    Starting,
    /// Accepting connections.
    Serving,
    /// Shutdown requested; in-flight connections are finishing.
    Draining,
    /// Both tasks have ended.
    Stopped,
}

/// Errors that end the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to watch for shutdown signals: {0}")]
    Signal(#[source] io::Error),

    #[error("supervised task failed: {0}")]
    Join(#[from] JoinError),
}

/// Source of inbound connections.
#[async_trait]
pub trait Listener: Send + 'static {
    /// Connection stream type.
    type Io: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next connection.
    async fn accept(&mut self) -> io::Result<Self::Io>;
}

#[async_trait]
impl Listener for UnixListener {
    type Io = UnixStream;

    async fn accept(&mut self) -> io::Result<UnixStream> {
        UnixListener::accept(self).await.map(|(stream, _addr)| stream)
    }
}

/// Hosts a [`Controller`] behind a Unix socket.
pub struct Supervisor<C: ?Sized> {
    service: Arc<RpcService<C>>,
    socket_path: PathBuf,
    drain_timeout: Duration,
    state: Arc<watch::Sender<SupervisorState>>,
}

impl<C: Controller + ?Sized + 'static> Supervisor<C> {
    /// Create a supervisor for the given controller.
    pub fn new(config: &ControllerConfig, controller: Arc<C>) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);

        Self {
            service: Arc::new(RpcService::new(controller)),
            socket_path: config.socket_path.clone(),
            drain_timeout: config.drain_timeout,
            state: Arc::new(state),
        }
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Path of the listening socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the listening socket.
    ///
    /// A socket file left behind by an earlier run is removed first; any
    /// other file at the path makes the bind fail.
    pub fn bind(&self) -> Result<UnixListener, ServerError> {
        let bind_error = |source| ServerError::Bind {
            path: self.socket_path.clone(),
            source,
        };

        if let Ok(meta) = std::fs::symlink_metadata(&self.socket_path) {
            if meta.file_type().is_socket() {
                std::fs::remove_file(&self.socket_path).map_err(bind_error)?;
                debug!(path = %self.socket_path.display(), "removed stale socket file");
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(bind_error)?;
        info!(path = %self.socket_path.display(), "listening for connections");
        Ok(listener)
    }

    /// Bind the socket and serve until SIGINT/SIGTERM or a serve failure.
    ///
    /// The socket file is removed once serving ends.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = match self.bind() {
            Ok(listener) => listener,
            Err(e) => {
                self.state.send_replace(SupervisorState::Stopped);
                return Err(e);
            }
        };

        let result = self.serve(listener, shutdown_signal()).await;

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.socket_path.display(), error = %e, "failed to remove socket file");
            }
        }

        result
    }

    /// Serve connections from `listener` until `shutdown` resolves or the
    /// accept loop fails.
    ///
    /// Returns the first error from either task, or `Ok(())` after a clean
    /// shutdown.
    pub async fn serve<L, S>(&self, listener: L, shutdown: S) -> Result<(), ServerError>
    where
        L: Listener,
        S: Future<Output = io::Result<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let mut tasks = JoinSet::new();

        self.state.send_replace(SupervisorState::Serving);

        // Serve task
        {
            let token = token.clone();
            let state = Arc::clone(&self.state);
            let service = Arc::clone(&self.service);
            let drain_timeout = self.drain_timeout;
            tasks.spawn(async move {
                let (result, connections) = accept_loop(listener, service, token.clone()).await;
                token.cancel();
                begin_draining(&state);
                drain(connections, drain_timeout).await;
                result
            });
        }

        // Signal task
        {
            let token = token.clone();
            let state = Arc::clone(&self.state);
            tasks.spawn(async move {
                tokio::select! {
                    signalled = shutdown => {
                        token.cancel();
                        begin_draining(&state);
                        match signalled {
                            Ok(()) => {
                                info!("shutdown signal received");
                                Ok(())
                            }
                            Err(e) => Err(ServerError::Signal(e)),
                        }
                    }
                    _ = token.cancelled() => Ok(()),
                }
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(ServerError::from).and_then(|result| result);
            if let Err(e) = outcome {
                token.cancel();
                begin_draining(&self.state);
                if first_error.is_none() {
                    error!(error = %e, "supervised task failed");
                    first_error = Some(e);
                } else {
                    debug!(error = %e, "further task failure");
                }
            }
        }

        self.state.send_replace(SupervisorState::Stopped);
        info!("controller stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn begin_draining(state: &watch::Sender<SupervisorState>) {
    state.send_if_modified(|current| {
        if *current == SupervisorState::Serving {
            *current = SupervisorState::Draining;
            true
        } else {
            false
        }
    });
}

/// Accept until cancelled or accept fails. Returns the loop outcome and the
/// connections still running.
async fn accept_loop<L, C>(
    mut listener: L,
    service: Arc<RpcService<C>>,
    token: CancellationToken,
) -> (Result<(), ServerError>, JoinSet<()>)
where
    L: Listener,
    C: Controller + ?Sized + 'static,
{
    let mut connections = JoinSet::new();

    let result = loop {
        tokio::select! {
            _ = token.cancelled() => break Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(io) => {
                    debug!("accepted new connection");
                    let service = Arc::clone(&service);
                    let token = token.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(io, service, token).await {
                            warn!(error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    break Err(ServerError::Accept(e));
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "connection task failed");
                }
            }
        }
    };

    (result, connections)
}

/// Give in-flight connections `timeout` to finish, then abort the rest.
async fn drain(mut connections: JoinSet<()>, timeout: Duration) {
    if connections.is_empty() {
        return;
    }

    info!(connections = connections.len(), "draining connections");
    let finished = tokio::time::timeout(timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if finished.is_err() {
        warn!(
            remaining = connections.len(),
            timeout_secs = timeout.as_secs(),
            "drain timeout elapsed, aborting connections"
        );
        connections.shutdown().await;
    }
}

/// Handle a single client connection.
///
/// Reads newline-delimited JSON-RPC requests and writes one response per
/// line. An idle connection closes on cancellation; a request already being
/// handled runs to completion.
async fn handle_connection<IO, C>(
    io: IO,
    service: Arc<RpcService<C>>,
    token: CancellationToken,
) -> io::Result<()>
where
    IO: AsyncRead + AsyncWrite + Send + Unpin,
    C: Controller + ?Sized,
{
    let (reader, mut writer) = tokio::io::split(io);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = tokio::select! {
            _ = token.cancelled() => {
                debug!("closing idle connection");
                break;
            }
            read = reader.read_line(&mut line) => read?,
        };

        if bytes_read == 0 {
            debug!("client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = service.handle_line(trimmed).await;

        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_draining_only_from_serving() {
        let (state, rx) = watch::channel(SupervisorState::Starting);
        begin_draining(&state);
        assert_eq!(*rx.borrow(), SupervisorState::Starting);

        state.send_replace(SupervisorState::Serving);
        begin_draining(&state);
        assert_eq!(*rx.borrow(), SupervisorState::Draining);

        state.send_replace(SupervisorState::Stopped);
        begin_draining(&state);
        assert_eq!(*rx.borrow(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn test_drain_waits_for_connections() {
        let mut connections = JoinSet::new();
        connections.spawn(tokio::time::sleep(Duration::from_millis(20)));

        tokio::time::timeout(
            Duration::from_secs(5),
            drain(connections, Duration::from_secs(2)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drain_aborts_after_timeout() {
        let mut connections = JoinSet::new();
        connections.spawn(std::future::pending::<()>());

        tokio::time::timeout(
            Duration::from_secs(5),
            drain(connections, Duration::from_millis(20)),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_bind_error_names_path() {
        let err = ServerError::Bind {
            path: PathBuf::from("/nonexistent/ctl.sock"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/nonexistent/ctl.sock"));
    }
}
