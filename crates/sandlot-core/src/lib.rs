//! # sandlot-core
//!
//! Sandbox lifecycle adapter for the sandlot controller.
//!
//! This crate implements the orchestrator-facing lifecycle contract
//! ([`Controller`]) on top of a VM backend ([`sandlot_vm::VmBackend`]).
//! The adapter is a pure translation layer: one lifecycle call becomes at
//! most one backend call, and it keeps no state of its own.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐    ┌───────────────────┐    ┌───────────────────┐
//! │   orchestrator    │───▶│   VmController    │───▶│     VmBackend     │
//! │ start / stop /    │    │ - decode payload  │    │ - create_vm()     │
//! │ update / status / │    │ - inject id       │    │ - stop_vm()       │
//! │ delete            │    │ - map errors      │    │ - get_vm_info()   │
//! └───────────────────┘    └───────────────────┘    └───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use sandlot_core::{Any, Controller, CreateOptions, VmController, CREATE_REQUEST_EXTENSION};
//! use sandlot_vm::{BackendConfig, CreateVmRequest, FirecrackerBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> sandlot_core::Result<()> {
//! let controller = VmController::new(Arc::new(FirecrackerBackend::new(BackendConfig::default())));
//!
//! let opts = CreateOptions::default().with_extension(
//!     CREATE_REQUEST_EXTENSION,
//!     Any::pack(&CreateVmRequest::default()).expect("encodable"),
//! );
//! let descriptor = controller.start("sandbox-1", opts).await?;
//! let status = controller.status("sandbox-1").await?;
//! controller.stop("sandbox-1").await?;
//! # Ok(())
//! # }
//! ```

mod controller;
mod error;
mod payload;
mod types;
mod vm_controller;

pub use controller::Controller;
pub use error::{ControllerError, ErrorCode, Result};
pub use payload::{Any, PayloadError, TypeUrl};
pub use types::{
    CreateOptions, DeleteOptions, Descriptor, SandboxState, SandboxStatus, UpdateOptions,
};
pub use vm_controller::{VmController, CREATE_REQUEST_EXTENSION, STOP_TIMEOUT_SECONDS};
