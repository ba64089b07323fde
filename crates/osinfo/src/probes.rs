//! Host capability probes
//!
//! Thin wrappers over external tools (virsh, qemu-io, systemctl) and
//! sysfs that answer boolean capability questions about the local
//! virtualization stack. Each probe treats "the probe ran and reported
//! failure" as unsupported, logging the detail; only genuinely
//! unexpected failures to launch a probe propagate to the caller.
//!
//! The aggregate [`Capabilities`] result is probed once per process and
//! cached.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use color_eyre::eyre::Context;
use color_eyre::Result;
use serde::Serialize;
use tracing::{debug, warn};

/// Connection to the local hypervisor, addressed by libvirt URI.
#[derive(Debug, Clone)]
pub struct HypervisorConnection {
    uri: String,
}

impl HypervisorConnection {
    /// Connection to the given libvirt URI.
    pub fn new(uri: impl Into<String>) -> Self {
        HypervisorConnection { uri: uri.into() }
    }

    /// Default qemu system connection.
    pub fn system() -> Self {
        Self::new("qemu:///system")
    }

    /// The libvirt URI this connection addresses.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn virsh(&self) -> Command {
        let mut cmd = Command::new("virsh");
        cmd.args(["-c", &self.uri]);
        cmd
    }
}

/// Run a probe command, mapping failure to "unsupported".
///
/// A missing probe binary also counts as unsupported; any other launch
/// failure propagates.
fn run_bool(mut cmd: Command, what: &str) -> Result<bool> {
    match cmd.output() {
        Ok(output) if output.status.success() => Ok(true),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{what} unsupported: {}", stderr.trim());
            Ok(false)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("{what} unsupported: {:?} not installed", cmd.get_program());
            Ok(false)
        }
        Err(err) => Err(err).with_context(|| format!("launching {what} probe")),
    }
}

/// Whether qemu can stream an ISO over network protocols.
///
/// qemu-io reports an unknown protocol when built without curl support;
/// any other outcome (including connection errors against the dead
/// address probed here) means the protocol driver is present.
pub fn qemu_supports_iso_stream() -> Result<bool> {
    let probe = Command::new("qemu-io")
        .args(["-r", "http://127.0.0.1:0/probe.iso", "-c", "quit"])
        .output();
    match probe {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(!stderr.contains("Unknown protocol"))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("ISO streaming unsupported: qemu-io not installed");
            Ok(false)
        }
        Err(err) => Err(err).context("launching qemu-io probe"),
    }
}

/// Whether libvirt can probe NFS exports on this host.
pub fn nfs_source_probe(conn: &HypervisorConnection) -> Result<bool> {
    let mut cmd = conn.virsh();
    cmd.args(["find-storage-pool-sources-as", "netfs", "127.0.0.1"]);
    run_bool(cmd, "NFS source probe")
}

/// Whether the host exposes Fibre-Channel host adapters through libvirt.
pub fn fc_host_support(conn: &HypervisorConnection) -> Result<bool> {
    let mut cmd = conn.virsh();
    cmd.args(["nodedev-list", "--cap", "fc_host"]);
    run_bool(cmd, "Fibre-Channel adapter probe")
}

/// Whether the kernel VFIO module is loaded.
pub fn kernel_vfio_loaded() -> Result<bool> {
    Ok(Path::new("/sys/module/vfio").exists() || Path::new("/dev/vfio/vfio").exists())
}

/// Whether NetworkManager is running on the host.
pub fn network_manager_running() -> Result<bool> {
    let mut cmd = Command::new("systemctl");
    cmd.args(["is-active", "--quiet", "NetworkManager"]);
    run_bool(cmd, "NetworkManager probe")
}

/// Whether the hypervisor advertises domain capabilities, which carry
/// the memory hot-plug limits the templates rely on.
pub fn memory_hotplug_support(conn: &HypervisorConnection) -> Result<bool> {
    let mut cmd = conn.virsh();
    cmd.arg("domcapabilities");
    run_bool(cmd, "memory hot-plug probe")
}

/// Whether libvirt supports streaming volume I/O (vol-upload/download).
pub fn network_stream_io_support(conn: &HypervisorConnection) -> Result<bool> {
    let mut cmd = conn.virsh();
    cmd.args(["help", "vol-upload"]);
    run_bool(cmd, "volume stream I/O probe")
}

/// Aggregated results of all host capability probes.
///
/// Field names match the capability keys the plugin reports upstream.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// qemu can stream remote ISO images.
    pub qemu_stream: bool,
    /// libvirt can probe NFS sources.
    pub nfs_probe: bool,
    /// Fibre-Channel host adapters are usable.
    pub fc_host_support: bool,
    /// The kernel VFIO module is loaded.
    pub kernel_vfio: bool,
    /// NetworkManager is running.
    pub nm_running: bool,
    /// Memory hot-plug is available.
    pub mem_hotplug_support: bool,
    /// Streaming volume I/O is available.
    pub stream_io: bool,
}

impl Capabilities {
    /// Run every probe, against the given connection where one is needed.
    ///
    /// Without a connection the hypervisor-bound probes report
    /// unsupported rather than failing.
    pub fn probe(conn: Option<&HypervisorConnection>) -> Result<Self> {
        if conn.is_none() {
            debug!("no hypervisor connection; connection-bound probes report unsupported");
        }
        let with_conn = |probe: fn(&HypervisorConnection) -> Result<bool>| -> Result<bool> {
            conn.map(probe).unwrap_or(Ok(false))
        };
        Ok(Capabilities {
            qemu_stream: qemu_supports_iso_stream()?,
            nfs_probe: with_conn(nfs_source_probe)?,
            fc_host_support: with_conn(fc_host_support)?,
            kernel_vfio: kernel_vfio_loaded()?,
            nm_running: network_manager_running()?,
            mem_hotplug_support: with_conn(memory_hotplug_support)?,
            stream_io: with_conn(network_stream_io_support)?,
        })
    }

    /// Probe once per process lifetime and cache the result.
    ///
    /// Thread-safe via `OnceLock`; retries on failure until successful.
    pub fn get_cached(conn: Option<&HypervisorConnection>) -> Result<&'static Self> {
        static CAPS: OnceLock<Capabilities> = OnceLock::new();
        if let Some(r) = CAPS.get() {
            return Ok(r);
        }
        let r = Self::probe(conn)?;
        // Discard duplicate initialization attempts from concurrent threads
        let _ = CAPS.set(r);
        Ok(CAPS.get().unwrap())
    }
}
