//! Backend defaults and the resolved machine specification.

use crate::error::{Result, VmError};
use crate::types::{CreateVmRequest, Drive, NetworkInterface};
use std::path::PathBuf;
use std::time::Duration;

/// Defaults applied by the Firecracker backend to sparse create requests.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Path to Firecracker binary
    pub firecracker_path: PathBuf,
    /// Working directory for VM sockets and state
    pub chroot_path: PathBuf,
    /// Kernel image used when a request names none
    pub kernel_path: PathBuf,
    /// Root filesystem used when a request names none
    pub rootfs_path: PathBuf,
    /// Kernel command line used when a request names none
    pub boot_args: String,
    /// Default vCPU count
    pub vcpu_count: u8,
    /// Default memory size in MiB
    pub mem_size_mib: u32,
    /// Graceful stop budget used when a stop request asks for 0 seconds
    pub stop_timeout: Duration,
    /// Boot budget used when a create request asks for 0 seconds
    pub boot_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            firecracker_path: PathBuf::from("/usr/local/bin/firecracker"),
            chroot_path: PathBuf::from("/tmp/sandlot"),
            kernel_path: PathBuf::from("/var/lib/sandlot/vmlinux"),
            rootfs_path: PathBuf::from("/var/lib/sandlot/rootfs.ext4"),
            boot_args: "console=ttyS0 reboot=k panic=1 pci=off".into(),
            vcpu_count: 2,
            mem_size_mib: 256,
            stop_timeout: Duration::from_secs(5),
            boot_timeout: Duration::from_secs(60),
        }
    }
}

/// Fully resolved configuration for one VM.
#[derive(Debug, Clone)]
pub struct MachineSpec {
    /// Number of virtual CPUs (1-32)
    pub vcpu_count: u8,
    /// Memory size in MiB (at least 128)
    pub mem_size_mib: u32,
    /// Path to kernel image
    pub kernel_path: PathBuf,
    /// Kernel boot arguments
    pub boot_args: String,
    /// Root filesystem drive
    pub root_drive: Drive,
    /// Additional drives
    pub extra_drives: Vec<Drive>,
    /// Network interfaces
    pub network_interfaces: Vec<NetworkInterface>,
    /// Path to Firecracker binary
    pub firecracker_path: PathBuf,
    /// Working directory for VM sockets and state
    pub chroot_path: PathBuf,
}

impl MachineSpec {
    /// Merge a create request over the backend defaults and validate the result.
    pub fn resolve(req: &CreateVmRequest, defaults: &BackendConfig) -> Result<Self> {
        let (vcpu_count, mem_size_mib) = match req.machine_cfg {
            Some(cfg) => (cfg.vcpu_count, cfg.mem_size_mib),
            None => (defaults.vcpu_count, defaults.mem_size_mib),
        };

        let root_drive = req.root_drive.clone().unwrap_or_else(|| Drive {
            drive_id: "rootfs".into(),
            path_on_host: defaults.rootfs_path.clone(),
            is_read_only: false,
        });

        let spec = Self {
            vcpu_count,
            mem_size_mib,
            kernel_path: req
                .kernel_image_path
                .clone()
                .unwrap_or_else(|| defaults.kernel_path.clone()),
            boot_args: req
                .kernel_args
                .clone()
                .unwrap_or_else(|| defaults.boot_args.clone()),
            root_drive,
            extra_drives: req.drive_mounts.clone(),
            network_interfaces: req.network_interfaces.clone(),
            firecracker_path: defaults.firecracker_path.clone(),
            chroot_path: defaults.chroot_path.clone(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Firecracker supports 1-32 vCPUs
        if self.vcpu_count == 0 || self.vcpu_count > 32 {
            return Err(VmError::Config(format!(
                "vcpu_count must be 1-32, got {}",
                self.vcpu_count
            )));
        }

        if self.mem_size_mib < 128 {
            return Err(VmError::Config(format!(
                "mem_size_mib must be at least 128, got {}",
                self.mem_size_mib
            )));
        }

        if self.kernel_path.as_os_str().is_empty() {
            return Err(VmError::Config("kernel path is required".into()));
        }

        let mut drive_ids = vec![self.root_drive.drive_id.as_str()];
        for extra in &self.extra_drives {
            if drive_ids.contains(&extra.drive_id.as_str()) {
                return Err(VmError::Config(format!(
                    "duplicate drive_id: {}",
                    extra.drive_id
                )));
            }
            drive_ids.push(&extra.drive_id);
        }

        let mut iface_ids: Vec<&str> = Vec::new();
        for iface in &self.network_interfaces {
            if iface_ids.contains(&iface.iface_id.as_str()) {
                return Err(VmError::Config(format!(
                    "duplicate iface_id: {}",
                    iface.iface_id
                )));
            }
            iface_ids.push(&iface.iface_id);
        }

        Ok(())
    }
}
