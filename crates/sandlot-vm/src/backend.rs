//! The VM backend contract.

use crate::error::Result;
use crate::types::{CreateVmRequest, CreateVmResponse, GetVmInfoRequest, StopVmRequest, VmInfo};
use async_trait::async_trait;

/// Capability set of a VM manager: create, stop and inspect VMs by ID.
///
/// This abstraction lets the lifecycle adapter run against Firecracker in
/// production and against an in-memory mock in tests. Implementations own
/// all VM state and any per-ID serialization.
#[async_trait]
pub trait VmBackend: Send + Sync {
    /// Create and boot a VM registered under `req.vm_id`.
    ///
    /// # Errors
    /// Returns an error if the request is invalid, the ID is taken, or the
    /// VM fails to boot.
    async fn create_vm(&self, req: CreateVmRequest) -> Result<CreateVmResponse>;

    /// Stop a VM, giving it `req.timeout_seconds` to shut down gracefully.
    ///
    /// # Errors
    /// Returns an error if the VM doesn't exist or cannot be stopped.
    async fn stop_vm(&self, req: StopVmRequest) -> Result<()>;

    /// Get information about a VM.
    ///
    /// # Errors
    /// Returns an error if the VM doesn't exist.
    async fn get_vm_info(&self, req: GetVmInfoRequest) -> Result<VmInfo>;
}
