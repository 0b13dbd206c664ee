//! # sandlot-vm
//!
//! VM backend layer for the sandlot sandbox controller.
//!
//! Defines the three-operation backend contract ([`VmBackend`]) the
//! lifecycle adapter consumes, the request/response records it exchanges,
//! and [`FirecrackerBackend`], an implementation over firepilot/Firecracker.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sandlot_vm::{BackendConfig, CreateVmRequest, FirecrackerBackend, StopVmRequest, VmBackend};
//!
//! # async fn example() -> sandlot_vm::Result<()> {
//! let backend = FirecrackerBackend::new(BackendConfig::default());
//!
//! let vm = backend
//!     .create_vm(CreateVmRequest {
//!         vm_id: "sandbox-1".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("API socket: {}", vm.socket_path.display());
//!
//! backend
//!     .stop_vm(StopVmRequest {
//!         vm_id: "sandbox-1".into(),
//!         timeout_seconds: 10,
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod error;
mod firecracker;
mod machine;
mod machine_config;
mod types;

pub use backend::VmBackend;
pub use config::{BackendConfig, MachineSpec};
pub use error::{Result, VmError};
pub use firecracker::FirecrackerBackend;
pub use machine::{api_socket_path, VirtualMachine};
pub use types::{
    CreateVmRequest, CreateVmResponse, Drive, GetVmInfoRequest, MachineCfg, NetworkInterface,
    StopVmRequest, VmInfo, VmState,
};
