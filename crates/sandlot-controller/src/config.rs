//! Configuration for the controller service.
//!
//! Built once at startup from command-line flags (each with a `SANDLOT_*`
//! environment fallback) and handed to the [`Supervisor`](crate::Supervisor).

use clap::Parser;
use sandlot_vm::BackendConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default listening socket, relative to the working directory.
pub const DEFAULT_SOCKET_PATH: &str = "./sandbox.sock";

/// Default grace period for in-flight connections at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line arguments of the `sandlot-controller` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "sandlot-controller", version, about = "Firecracker sandbox controller")]
pub struct Args {
    /// Unix socket path to listen on
    #[arg(long, env = "SANDLOT_ADDRESS", default_value = DEFAULT_SOCKET_PATH)]
    pub address: PathBuf,

    /// Enable debug-level logging
    #[arg(long, env = "SANDLOT_DEBUG")]
    pub debug: bool,

    /// Path to the Firecracker binary
    #[arg(long, env = "SANDLOT_FIRECRACKER")]
    pub firecracker: Option<PathBuf>,

    /// Default kernel image for sandboxes that name none
    #[arg(long, env = "SANDLOT_KERNEL")]
    pub kernel: Option<PathBuf>,

    /// Default root filesystem for sandboxes that name none
    #[arg(long, env = "SANDLOT_ROOTFS")]
    pub rootfs: Option<PathBuf>,

    /// Working directory for VM sockets and state
    #[arg(long, env = "SANDLOT_CHROOT")]
    pub chroot: Option<PathBuf>,

    /// Seconds to wait for in-flight connections at shutdown
    #[arg(long, env = "SANDLOT_DRAIN_TIMEOUT", default_value_t = DEFAULT_DRAIN_TIMEOUT.as_secs())]
    pub drain_timeout: u64,
}

/// Configuration for the controller service.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Unix socket the service listens on.
    pub socket_path: PathBuf,

    /// Whether debug logging is enabled.
    pub debug: bool,

    /// Grace period for in-flight connections at shutdown.
    pub drain_timeout: Duration,

    /// Defaults for the Firecracker backend.
    pub backend: BackendConfig,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("socket path is empty")]
    EmptySocketPath,

    #[error("socket directory not found: {0}")]
    MissingSocketDir(PathBuf),

    #[error("socket path is a directory: {0}")]
    SocketIsDirectory(PathBuf),
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            debug: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            backend: BackendConfig::default(),
        }
    }
}

impl From<Args> for ControllerConfig {
    fn from(args: Args) -> Self {
        let defaults = BackendConfig::default();

        Self {
            socket_path: args.address,
            debug: args.debug,
            drain_timeout: Duration::from_secs(args.drain_timeout),
            backend: BackendConfig {
                firecracker_path: args.firecracker.unwrap_or(defaults.firecracker_path),
                kernel_path: args.kernel.unwrap_or(defaults.kernel_path),
                rootfs_path: args.rootfs.unwrap_or(defaults.rootfs_path),
                chroot_path: args.chroot.unwrap_or(defaults.chroot_path),
                ..defaults
            },
        }
    }
}

impl ControllerConfig {
    /// Validate the listening endpoint.
    ///
    /// Backend paths are only checked by [`validate_warn`](Self::validate_warn),
    /// since a sandbox request may name its own kernel and rootfs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySocketPath);
        }

        if self.socket_path.is_dir() {
            return Err(ConfigError::SocketIsDirectory(self.socket_path.clone()));
        }

        // A bare file name binds in the working directory
        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::MissingSocketDir(parent.to_path_buf()));
            }
        }

        Ok(())
    }

    /// Log warnings for backend paths that do not exist yet.
    pub fn validate_warn(&self) {
        if !self.backend.firecracker_path.exists() {
            tracing::warn!("Firecracker not found: {:?}", self.backend.firecracker_path);
        }

        if !self.backend.kernel_path.exists() {
            tracing::warn!("Kernel not found: {:?}", self.backend.kernel_path);
        }

        if !self.backend.rootfs_path.exists() {
            tracing::warn!("Rootfs not found: {:?}", self.backend.rootfs_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("./sandbox.sock"));
        assert!(!config.debug);
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.backend.chroot_path, PathBuf::from("/tmp/sandlot"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["sandlot-controller"]).unwrap();
        let config = ControllerConfig::from(args);
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(
            config.backend.firecracker_path,
            BackendConfig::default().firecracker_path
        );
    }

    #[test]
    fn test_args_override_backend_paths() {
        let args = Args::try_parse_from([
            "sandlot-controller",
            "--address",
            "/run/sandlot/ctl.sock",
            "--debug",
            "--kernel",
            "/boot/vmlinux",
            "--chroot",
            "/srv/vms",
            "--drain-timeout",
            "3",
        ])
        .unwrap();
        let config = ControllerConfig::from(args);

        assert_eq!(config.socket_path, PathBuf::from("/run/sandlot/ctl.sock"));
        assert!(config.debug);
        assert_eq!(config.drain_timeout, Duration::from_secs(3));
        assert_eq!(config.backend.kernel_path, PathBuf::from("/boot/vmlinux"));
        assert_eq!(config.backend.chroot_path, PathBuf::from("/srv/vms"));
        assert_eq!(
            config.backend.rootfs_path,
            BackendConfig::default().rootfs_path
        );
    }

    #[test]
    fn test_validate_relative_socket() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = ControllerConfig {
            socket_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptySocketPath)));
    }

    #[test]
    fn test_validate_rejects_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig {
            socket_path: dir.path().join("nope").join("ctl.sock"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSocketDir(_))
        ));
    }

    #[test]
    fn test_validate_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig {
            socket_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SocketIsDirectory(_))
        ));
    }
}
