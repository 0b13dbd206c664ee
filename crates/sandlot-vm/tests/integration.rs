//! Integration tests for sandlot-vm.
//!
//! These tests require:
//! - Linux with /dev/kvm access
//! - Firecracker binary installed
//! - Kernel and rootfs images
//!
//! Run with: `cargo test -p sandlot-vm -- --ignored`

use sandlot_vm::{
    BackendConfig, CreateVmRequest, FirecrackerBackend, GetVmInfoRequest, MachineCfg,
    StopVmRequest, VmBackend, VmState,
};
use std::path::{Path, PathBuf};

fn backend_from_env() -> Option<FirecrackerBackend> {
    let kernel_path = std::env::var("SANDLOT_KERNEL")
        .unwrap_or_else(|_| "/var/lib/sandlot/vmlinux".to_string());
    let rootfs_path = std::env::var("SANDLOT_ROOTFS")
        .unwrap_or_else(|_| "/var/lib/sandlot/rootfs.ext4".to_string());

    if !Path::new(&kernel_path).exists() || !Path::new(&rootfs_path).exists() {
        eprintln!("Skipping test: kernel or rootfs not found");
        eprintln!("Set SANDLOT_KERNEL and SANDLOT_ROOTFS environment variables");
        return None;
    }

    Some(FirecrackerBackend::new(BackendConfig {
        kernel_path: PathBuf::from(kernel_path),
        rootfs_path: PathBuf::from(rootfs_path),
        ..Default::default()
    }))
}

/// Full lifecycle: create -> info -> stop -> gone
#[tokio::test]
#[ignore = "requires Linux + KVM + Firecracker"]
async fn test_vm_lifecycle() {
    let Some(backend) = backend_from_env() else {
        return;
    };

    let created = backend
        .create_vm(CreateVmRequest {
            vm_id: "it-lifecycle".into(),
            machine_cfg: Some(MachineCfg {
                vcpu_count: 1,
                mem_size_mib: 128,
            }),
            ..Default::default()
        })
        .await
        .expect("Failed to create VM");
    assert_eq!(created.vm_id, "it-lifecycle");

    let info = backend
        .get_vm_info(GetVmInfoRequest {
            vm_id: "it-lifecycle".into(),
        })
        .await
        .expect("Failed to query VM");
    assert_eq!(info.state, VmState::Running);
    assert_eq!(info.vcpu_count, 1);

    backend
        .stop_vm(StopVmRequest {
            vm_id: "it-lifecycle".into(),
            timeout_seconds: 10,
        })
        .await
        .expect("Failed to stop VM");

    let err = backend
        .get_vm_info(GetVmInfoRequest {
            vm_id: "it-lifecycle".into(),
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

/// A second create under the same ID is rejected
#[tokio::test]
#[ignore = "requires Linux + KVM + Firecracker"]
async fn test_duplicate_id_rejected() {
    let Some(backend) = backend_from_env() else {
        return;
    };

    let req = CreateVmRequest {
        vm_id: "it-duplicate".into(),
        ..Default::default()
    };
    backend
        .create_vm(req.clone())
        .await
        .expect("Failed to create VM");

    let err = backend.create_vm(req).await.unwrap_err();
    assert!(err.is_already_exists());

    backend
        .stop_vm(StopVmRequest {
            vm_id: "it-duplicate".into(),
            timeout_seconds: 0,
        })
        .await
        .expect("Failed to stop VM");
}
