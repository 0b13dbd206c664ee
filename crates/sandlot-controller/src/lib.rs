//! # sandlot-controller
//!
//! Hosts the sandbox lifecycle adapter behind a Unix socket.
//!
//! The [`Supervisor`] binds the socket, serves newline-delimited JSON-RPC
//! requests through [`RpcService`], and shuts down cleanly on SIGINT,
//! SIGTERM, or a failed accept loop. [`ControllerClient`] speaks the same
//! protocol from the other end.
//!
//! ## Example
//!
//! ```no_run
//! use sandlot_controller::{ControllerConfig, Supervisor};
//! use sandlot_core::VmController;
//! use sandlot_vm::FirecrackerBackend;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), sandlot_controller::ServerError> {
//! let config = ControllerConfig::default();
//! let backend = Arc::new(FirecrackerBackend::new(config.backend.clone()));
//! let supervisor = Supervisor::new(&config, Arc::new(VmController::new(backend)));
//! supervisor.run().await
//! # }
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod service;

pub use client::{ClientError, ControllerClient};
pub use config::{Args, ConfigError, ControllerConfig};
pub use server::{shutdown_signal, Listener, ServerError, Supervisor, SupervisorState};
pub use service::RpcService;
