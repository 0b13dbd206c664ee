//! Direct calls to the Firecracker API socket.
//!
//! firepilot's high-level API does not expose machine sizing, so vCPU and
//! memory are pushed with a raw `PUT /machine-config` before boot.

use crate::error::{Result, VmError};
use firepilot_models::models::MachineConfiguration;
use hyper::{Body, Client, Method, Request};
use hyperlocal::{UnixClientExt, Uri};
use serde::Serialize;
use std::path::Path;

/// Configure machine resources on a Firecracker instance.
///
/// **Must be called BEFORE starting the VM.**
pub async fn configure_machine(socket_path: &Path, vcpu_count: u8, mem_size_mib: u32) -> Result<()> {
    tracing::debug!(vcpu_count, mem_size_mib, "Configuring machine resources");

    let config = MachineConfiguration::new(mem_size_mib as i32, vcpu_count as i32);
    put(socket_path, "/machine-config", &config).await?;

    tracing::info!(vcpu_count, mem_size_mib, "Machine resources configured");
    Ok(())
}

/// Send a JSON `PUT` to the given endpoint of the Firecracker API socket.
async fn put<T: Serialize>(socket_path: &Path, endpoint: &str, payload: &T) -> Result<()> {
    let body = serde_json::to_string(payload)
        .map_err(|e| VmError::Api(format!("failed to serialize {endpoint} body: {e}")))?;
    tracing::trace!(endpoint, body = %body, "Firecracker API request");

    let uri: hyper::Uri = Uri::new(socket_path, endpoint).into();
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .map_err(|e| VmError::Api(format!("failed to build {endpoint} request: {e}")))?;

    let client = Client::unix();
    let response = client
        .request(request)
        .await
        .map_err(|e| VmError::Api(format!("{endpoint} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body_bytes = hyper::body::to_bytes(response.into_body())
            .await
            .unwrap_or_default();
        let body_str = String::from_utf8_lossy(&body_bytes);
        tracing::error!(endpoint, status = %status, body = %body_str, "Firecracker API call failed");
        return Err(VmError::Api(format!(
            "{endpoint} failed with status {status}: {body_str}"
        )));
    }

    Ok(())
}
