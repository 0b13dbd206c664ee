//! Request and response records of the VM backend contract.
//!
//! Every record is keyed by the VM ID. The backend owns their meaning;
//! callers only build requests and read responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// vCPU and memory sizing for a new VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCfg {
    /// Number of virtual CPUs (1-32)
    pub vcpu_count: u8,
    /// Memory size in MiB (at least 128)
    pub mem_size_mib: u32,
}

/// A block device attached to the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    /// Unique drive identifier
    pub drive_id: String,
    /// Path to the drive image on the host
    pub path_on_host: PathBuf,
    /// Read-only flag
    #[serde(default)]
    pub is_read_only: bool,
}

/// A TAP-backed network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface ID inside Firecracker
    pub iface_id: String,
    /// Host TAP device name
    pub host_dev_name: String,
    /// Guest MAC address (auto-generated if None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_mac: Option<String>,
}

/// Request to create and boot a VM.
///
/// Any field left unset falls back to the backend's configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVmRequest {
    /// ID the VM is registered under
    #[serde(default)]
    pub vm_id: String,
    /// vCPU and memory sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_cfg: Option<MachineCfg>,
    /// Kernel image on the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_image_path: Option<PathBuf>,
    /// Kernel command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_args: Option<String>,
    /// Root filesystem drive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_drive: Option<Drive>,
    /// Additional drives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drive_mounts: Vec<Drive>,
    /// Network interfaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
    /// Boot budget in seconds (0 = backend default)
    #[serde(default)]
    pub timeout_seconds: u32,
}

/// Handle to a VM returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVmResponse {
    /// ID the VM is registered under
    pub vm_id: String,
    /// Firecracker API socket of the VM
    pub socket_path: PathBuf,
    /// Working directory holding the VM's runtime files
    pub chroot_path: PathBuf,
}

/// Request to stop a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopVmRequest {
    /// ID of the VM to stop
    pub vm_id: String,
    /// Graceful shutdown budget in seconds (0 = backend default)
    pub timeout_seconds: u32,
}

/// Request for information about a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVmInfoRequest {
    /// ID of the VM to query
    pub vm_id: String,
}

/// Current state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmState {
    /// VM is being created
    Creating,
    /// VM is running
    Running,
    /// VM is stopped
    Stopped,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Creating => write!(f, "creating"),
            VmState::Running => write!(f, "running"),
            VmState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Information about a registered VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    /// ID the VM is registered under
    pub vm_id: String,
    /// Current state
    pub state: VmState,
    /// Firecracker API socket of the VM
    pub socket_path: PathBuf,
    /// Number of virtual CPUs
    pub vcpu_count: u8,
    /// Memory size in MiB
    pub mem_size_mib: u32,
    /// When the VM was created
    pub created_at: DateTime<Utc>,
}
