//! VirtualMachine type - a single Firecracker microVM.

use crate::config::MachineSpec;
use crate::error::{Result, VmError};
use crate::machine_config::configure_machine;
use crate::types::{Drive, VmState};
use chrono::{DateTime, Utc};
use firepilot::builder::drive::DriveBuilder;
use firepilot::builder::executor::FirecrackerExecutorBuilder;
use firepilot::builder::kernel::KernelBuilder;
use firepilot::builder::network_interface::NetworkInterfaceBuilder;
use firepilot::builder::{Builder, Configuration};
use firepilot::machine::Machine;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A Firecracker microVM registered under a caller-chosen ID.
pub struct VirtualMachine {
    id: String,
    spec: MachineSpec,
    state: VmState,
    machine: Machine,
    socket_path: PathBuf,
    created_at: DateTime<Utc>,
}

impl VirtualMachine {
    /// Create and boot a new MicroVM.
    ///
    /// This will:
    /// 1. Build the firepilot configuration
    /// 2. Spawn the Firecracker process
    /// 3. Push machine sizing to the API socket
    /// 4. Start the VM
    ///
    /// Steps 2-4 must finish within `boot_timeout`. Once Firecracker has been
    /// spawned, any failure kills the process before the error is returned.
    ///
    /// # Errors
    /// Returns an error if the VM creation or startup fails.
    pub async fn create(id: &str, spec: MachineSpec, boot_timeout: Duration) -> Result<Self> {
        spec.validate()?;
        tracing::info!(vm_id = %id, vcpus = spec.vcpu_count, memory_mib = spec.mem_size_mib, "Creating MicroVM");

        let kernel = KernelBuilder::new()
            .with_kernel_image_path(spec.kernel_path.to_string_lossy().to_string())
            .with_boot_args(spec.boot_args.clone())
            .try_build()
            .map_err(|e| VmError::Config(format!("kernel config: {:?}", e)))?;

        let executor = FirecrackerExecutorBuilder::new()
            .with_chroot(spec.chroot_path.to_string_lossy().to_string())
            .with_exec_binary(spec.firecracker_path.clone())
            .try_build()
            .map_err(|e| VmError::Create(format!("executor config: {:?}", e)))?;

        let mut fp_config = Configuration::new(id.to_string())
            .with_kernel(kernel)
            .with_executor(executor);

        fp_config = attach_drive(fp_config, &spec.root_drive, true)?;
        for extra in &spec.extra_drives {
            fp_config = attach_drive(fp_config, extra, false)?;
        }

        for net in &spec.network_interfaces {
            let mut net_builder = NetworkInterfaceBuilder::new()
                .with_iface_id(net.iface_id.clone())
                .with_host_dev_name(net.host_dev_name.clone());

            if let Some(mac) = &net.guest_mac {
                net_builder = net_builder.with_guest_mac(mac.clone());
            }

            let iface = net_builder
                .try_build()
                .map_err(|e| VmError::Config(format!("network config: {:?}", e)))?;
            fp_config = fp_config.with_interface(iface);
        }

        let socket_path = api_socket_path(&spec.chroot_path, id);
        let mut machine = Machine::new();

        let booting = boot(&mut machine, fp_config, &socket_path, &spec);
        let booted = tokio::time::timeout(boot_timeout, booting)
            .await
            .unwrap_or(Err(VmError::Timeout(boot_timeout)));

        if let Err(e) = booted {
            // Fails harmlessly when the process was never spawned
            if let Err(kill_err) = machine.kill().await {
                tracing::debug!(vm_id = %id, error = ?kill_err, "No Firecracker process to kill");
            } else {
                tracing::warn!(vm_id = %id, "Killed Firecracker after failed boot");
            }
            return Err(e);
        }

        tracing::info!(vm_id = %id, "MicroVM started successfully");

        Ok(Self {
            id: id.to_string(),
            spec,
            state: VmState::Running,
            machine,
            socket_path,
            created_at: Utc::now(),
        })
    }

    /// Get the ID this VM is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the current state of the VM.
    pub fn state(&self) -> VmState {
        self.state
    }

    /// Get the resolved configuration this VM was created with.
    pub fn spec(&self) -> &MachineSpec {
        &self.spec
    }

    /// Get the path to the Firecracker API socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the per-VM working directory.
    pub fn chroot_dir(&self) -> PathBuf {
        self.spec.chroot_path.join(&self.id)
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Stop the VM gracefully.
    ///
    /// # Errors
    /// Returns an error if the VM is not running.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != VmState::Running {
            return Err(VmError::InvalidState {
                expected: "running".into(),
                actual: self.state.to_string(),
            });
        }

        tracing::info!(vm_id = %self.id, "Stopping VM");

        self.machine
            .stop()
            .await
            .map_err(|e| VmError::Stop(format!("{:?}", e)))?;

        self.state = VmState::Stopped;
        Ok(())
    }

    /// Force kill the VM.
    pub async fn kill(&mut self) -> Result<()> {
        tracing::warn!(vm_id = %self.id, "Force killing VM");

        self.machine
            .kill()
            .await
            .map_err(|e| VmError::Stop(format!("kill failed: {:?}", e)))?;

        self.state = VmState::Stopped;
        Ok(())
    }

    /// Release the VM's resources and working directory.
    pub async fn destroy(mut self) -> Result<()> {
        tracing::info!(vm_id = %self.id, "Destroying VM");

        if self.state == VmState::Running {
            let _ = self.kill().await;
        }

        let dir = self.chroot_dir();
        drop(self.machine);

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(vm_id = %self.id, path = %dir.display(), error = %e, "Failed to remove VM directory");
            }
        }
        Ok(())
    }
}

/// Spawn Firecracker, size the machine and send InstanceStart.
async fn boot(
    machine: &mut Machine,
    config: Configuration,
    socket_path: &Path,
    spec: &MachineSpec,
) -> Result<()> {
    machine
        .create(config)
        .await
        .map_err(|e| VmError::Create(format!("{:?}", e)))?;

    // Sizing must land before InstanceStart
    configure_machine(socket_path, spec.vcpu_count, spec.mem_size_mib).await?;

    machine
        .start()
        .await
        .map_err(|e| VmError::Start(format!("{:?}", e)))
}

/// Firecracker API socket location for a VM: `chroot/<id>/firecracker.socket`.
pub fn api_socket_path(chroot_path: &Path, vm_id: &str) -> PathBuf {
    chroot_path.join(vm_id).join("firecracker.socket")
}

fn attach_drive(config: Configuration, drive: &Drive, is_root: bool) -> Result<Configuration> {
    let mut builder = DriveBuilder::new()
        .with_drive_id(drive.drive_id.clone())
        .with_path_on_host(drive.path_on_host.clone());

    if is_root {
        builder = builder.as_root_device();
    }
    if drive.is_read_only {
        builder = builder.as_read_only();
    }

    let built = builder
        .try_build()
        .map_err(|e| VmError::Config(format!("drive {} config: {:?}", drive.drive_id, e)))?;
    Ok(config.with_drive(built))
}
