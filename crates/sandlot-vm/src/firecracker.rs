//! Firecracker-backed implementation of [`VmBackend`].

use crate::backend::VmBackend;
use crate::config::{BackendConfig, MachineSpec};
use crate::error::{Result, VmError};
use crate::machine::VirtualMachine;
use crate::types::{CreateVmRequest, CreateVmResponse, GetVmInfoRequest, StopVmRequest, VmInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Registry slot for one VM ID. `None` while booting failed or after stop.
type Slot = Arc<Mutex<Option<VirtualMachine>>>;

type Registry = Arc<RwLock<HashMap<String, Slot>>>;

/// Manages Firecracker microVMs keyed by caller-supplied IDs.
///
/// # Thread Safety
///
/// The registry sits behind an async RwLock and each VM behind its own
/// Mutex, so operations on different IDs proceed in parallel while
/// operations on the same ID are serialized.
pub struct FirecrackerBackend {
    config: BackendConfig,
    vms: Registry,
}

impl FirecrackerBackend {
    /// Create a backend applying the given defaults.
    pub fn new(config: BackendConfig) -> Self {
        tracing::info!(
            firecracker = %config.firecracker_path.display(),
            chroot = %config.chroot_path.display(),
            "Creating Firecracker backend"
        );
        Self {
            config,
            vms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Number of registered VMs.
    pub async fn len(&self) -> usize {
        self.vms.read().await.len()
    }

    /// True if no VM is registered.
    pub async fn is_empty(&self) -> bool {
        self.vms.read().await.is_empty()
    }

    async fn slot(&self, vm_id: &str) -> Result<Slot> {
        self.vms
            .read()
            .await
            .get(vm_id)
            .cloned()
            .ok_or_else(|| VmError::NotFound(vm_id.to_string()))
    }

    fn boot_budget(&self, timeout_seconds: u32) -> Duration {
        if timeout_seconds == 0 {
            self.config.boot_timeout
        } else {
            Duration::from_secs(u64::from(timeout_seconds))
        }
    }

    fn stop_budget(&self, timeout_seconds: u32) -> Duration {
        if timeout_seconds == 0 {
            self.config.stop_timeout
        } else {
            Duration::from_secs(u64::from(timeout_seconds))
        }
    }
}

#[async_trait]
impl VmBackend for FirecrackerBackend {
    async fn create_vm(&self, req: CreateVmRequest) -> Result<CreateVmResponse> {
        validate_vm_id(&req.vm_id)?;
        let spec = MachineSpec::resolve(&req, &self.config)?;
        let vm_id = req.vm_id;

        // Publish a locked slot so concurrent calls for this ID wait on the boot
        let slot: Slot = Arc::new(Mutex::new(None));
        let mut guard = slot.clone().lock_owned().await;
        {
            let mut vms = self.vms.write().await;
            if vms.contains_key(&vm_id) {
                return Err(VmError::AlreadyExists(vm_id));
            }
            vms.insert(vm_id.clone(), slot.clone());
        }

        // The boot task owns the slot until it commits or unregisters, even
        // if this caller stops waiting
        let budget = self.boot_budget(req.timeout_seconds);
        let vms = Arc::clone(&self.vms);
        let vm_dir = self.config.chroot_path.join(&vm_id);
        let boot_slot = Arc::clone(&slot);
        let boot_id = vm_id.clone();
        let boot = tokio::spawn(async move {
            match VirtualMachine::create(&boot_id, spec, budget).await {
                Ok(vm) => {
                    let response = CreateVmResponse {
                        vm_id: boot_id,
                        socket_path: vm.socket_path().to_path_buf(),
                        chroot_path: vm.chroot_dir(),
                    };
                    *guard = Some(vm);
                    Ok(response)
                }
                Err(e) => {
                    tracing::error!(vm_id = %boot_id, error = %e, "VM creation failed");
                    drop(guard);
                    unregister(&vms, &boot_id, &boot_slot).await;
                    remove_vm_dir(&boot_id, &vm_dir).await;
                    Err(e)
                }
            }
        });

        match boot.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(vm_id = %vm_id, error = %e, "VM boot task failed");
                unregister(&self.vms, &vm_id, &slot).await;
                Err(VmError::Create(format!("boot task failed: {e}")))
            }
        }
    }

    async fn stop_vm(&self, req: StopVmRequest) -> Result<()> {
        let slot = self.slot(&req.vm_id).await?;
        let mut guard = slot.lock().await;
        let Some(mut vm) = guard.take() else {
            return Err(VmError::NotFound(req.vm_id));
        };

        let budget = self.stop_budget(req.timeout_seconds);
        let start = std::time::Instant::now();
        let graceful = match tokio::time::timeout(budget, vm.stop()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(vm_id = %req.vm_id, error = %e, "Graceful stop failed");
                false
            }
            Err(_) => {
                tracing::warn!(vm_id = %req.vm_id, timeout_secs = budget.as_secs(), "Graceful stop timed out");
                false
            }
        };

        if !graceful {
            if let Err(e) = vm.kill().await {
                *guard = Some(vm);
                return Err(e);
            }
        }

        vm.destroy().await?;
        drop(guard);
        unregister(&self.vms, &req.vm_id, &slot).await;

        tracing::info!(
            vm_id = %req.vm_id,
            graceful,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "VM stopped"
        );
        Ok(())
    }

    async fn get_vm_info(&self, req: GetVmInfoRequest) -> Result<VmInfo> {
        let slot = self.slot(&req.vm_id).await?;
        let guard = slot.lock().await;
        let vm = guard
            .as_ref()
            .ok_or_else(|| VmError::NotFound(req.vm_id.clone()))?;

        Ok(VmInfo {
            vm_id: vm.id().to_string(),
            state: vm.state(),
            socket_path: vm.socket_path().to_path_buf(),
            vcpu_count: vm.spec().vcpu_count,
            mem_size_mib: vm.spec().mem_size_mib,
            created_at: vm.created_at(),
        })
    }
}

async fn unregister(vms: &RwLock<HashMap<String, Slot>>, vm_id: &str, slot: &Slot) {
    let mut vms = vms.write().await;
    if vms.get(vm_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
        vms.remove(vm_id);
    }
}

async fn remove_vm_dir(vm_id: &str, dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(vm_id = %vm_id, path = %dir.display(), error = %e, "Failed to remove VM directory");
        }
    }
}

/// VM IDs become directory names under the chroot, so keep them to one path segment.
fn validate_vm_id(vm_id: &str) -> Result<()> {
    if vm_id.is_empty() {
        return Err(VmError::InvalidRequest("vm_id is required".into()));
    }
    if vm_id == "." || vm_id == ".." || vm_id.contains('/') || vm_id.contains('\0') {
        return Err(VmError::InvalidRequest(format!(
            "vm_id must be a single path segment, got {vm_id:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineCfg;

    fn backend() -> FirecrackerBackend {
        FirecrackerBackend::new(BackendConfig::default())
    }

    #[test]
    fn test_validate_vm_id() {
        assert!(validate_vm_id("sandbox-1").is_ok());
        assert!(validate_vm_id("").is_err());
        assert!(validate_vm_id("..").is_err());
        assert!(validate_vm_id("a/b").is_err());
    }

    #[test]
    fn test_budgets() {
        let backend = backend();
        assert_eq!(backend.stop_budget(0), Duration::from_secs(5));
        assert_eq!(backend.stop_budget(100), Duration::from_secs(100));
        assert_eq!(backend.boot_budget(0), Duration::from_secs(60));
        assert_eq!(backend.boot_budget(3), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unknown_vm_is_not_found() {
        let backend = backend();

        let err = backend
            .get_vm_info(GetVmInfoRequest {
                vm_id: "missing".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = backend
            .stop_vm(StopVmRequest {
                vm_id: "missing".into(),
                timeout_seconds: 1,
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request_without_registering() {
        let backend = backend();

        let err = backend
            .create_vm(CreateVmRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = backend
            .create_vm(CreateVmRequest {
                vm_id: "sb-1".into(),
                machine_cfg: Some(MachineCfg {
                    vcpu_count: 0,
                    mem_size_mib: 256,
                }),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(backend.is_empty().await);
    }
}
