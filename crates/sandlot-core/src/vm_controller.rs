//! Lifecycle adapter over a [`VmBackend`].

use crate::controller::Controller;
use crate::error::{ControllerError, Result};
use crate::payload::Any;
use crate::types::{
    CreateOptions, DeleteOptions, Descriptor, SandboxState, SandboxStatus, UpdateOptions,
};
use async_trait::async_trait;
use sandlot_vm::{CreateVmRequest, GetVmInfoRequest, StopVmRequest, VmBackend};
use std::sync::Arc;

/// Extension key under which start options carry the [`CreateVmRequest`].
pub const CREATE_REQUEST_EXTENSION: &str = "firecracker-create-request";

/// Graceful shutdown budget handed to the backend on every stop.
pub const STOP_TIMEOUT_SECONDS: u32 = 100;

/// Translates each lifecycle call into exactly one backend call.
///
/// Holds no sandbox state and takes no locks; per-sandbox serialization,
/// if any, is the backend's business.
pub struct VmController<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for VmController<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: VmBackend + ?Sized> VmController<B> {
    /// Create an adapter over the given backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

#[async_trait]
impl<B: VmBackend + ?Sized> Controller for VmController<B> {
    async fn start(&self, id: &str, opts: CreateOptions) -> Result<Descriptor> {
        tracing::debug!(sandbox_id = %id, "start");

        let payload = opts.extensions.get(CREATE_REQUEST_EXTENSION).ok_or_else(|| {
            ControllerError::InvalidArgument(format!(
                "missing required {CREATE_REQUEST_EXTENSION} extension"
            ))
        })?;

        let mut request: CreateVmRequest = payload
            .unpack()
            .map_err(|e| ControllerError::InvalidArgument(e.to_string()))?;

        // The orchestrator's identifier wins over whatever the payload carried
        request.vm_id = id.to_string();

        let vm = self
            .backend
            .create_vm(request)
            .await
            .map_err(|source| ControllerError::Backend {
                context: "failed to start firecracker",
                source,
            })?;

        let descriptor = Any::pack(&vm).map_err(|source| ControllerError::Payload {
            context: "failed to marshal descriptor",
            source,
        })?;

        tracing::info!(sandbox_id = %id, "Sandbox started");
        Ok(Descriptor(descriptor))
    }

    async fn stop(&self, id: &str) -> Result<()> {
        tracing::debug!(sandbox_id = %id, "stop");

        self.backend
            .stop_vm(StopVmRequest {
                vm_id: id.to_string(),
                timeout_seconds: STOP_TIMEOUT_SECONDS,
            })
            .await?;

        tracing::info!(sandbox_id = %id, "Sandbox stopped");
        Ok(())
    }

    async fn update(&self, id: &str, _opts: UpdateOptions, _field_paths: &[String]) -> Result<()> {
        tracing::debug!(sandbox_id = %id, "update");
        Err(ControllerError::NotImplemented("update"))
    }

    async fn status(&self, id: &str) -> Result<SandboxStatus> {
        tracing::debug!(sandbox_id = %id, "status");

        let info = self
            .backend
            .get_vm_info(GetVmInfoRequest {
                vm_id: id.to_string(),
            })
            .await?;

        Ok(SandboxStatus {
            id: info.vm_id,
            state: SandboxState::Ready,
        })
    }

    async fn delete(&self, id: &str, _opts: DeleteOptions) -> Result<()> {
        // Teardown happens in stop; nothing is left to release here
        tracing::debug!(sandbox_id = %id, "delete");
        Ok(())
    }
}
