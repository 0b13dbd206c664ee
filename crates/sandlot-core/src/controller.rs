//! The sandbox lifecycle contract.

use crate::error::Result;
use crate::types::{CreateOptions, DeleteOptions, Descriptor, SandboxStatus, UpdateOptions};
use async_trait::async_trait;

/// Lifecycle operations an orchestrator drives against a sandbox.
///
/// Every call is keyed by the sandbox identifier the orchestrator chose at
/// start time. Implementations must tolerate concurrent calls for
/// different identifiers and must not assume any ordering between them.
/// Dropping a returned future cancels the call.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Provision a sandbox and return a handle to it.
    async fn start(&self, id: &str, opts: CreateOptions) -> Result<Descriptor>;

    /// Stop a sandbox.
    async fn stop(&self, id: &str) -> Result<()>;

    /// Change a running sandbox.
    async fn update(&self, id: &str, opts: UpdateOptions, field_paths: &[String]) -> Result<()>;

    /// Report a sandbox's lifecycle state.
    async fn status(&self, id: &str) -> Result<SandboxStatus>;

    /// Release a sandbox.
    async fn delete(&self, id: &str, opts: DeleteOptions) -> Result<()>;
}
