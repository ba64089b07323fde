//! Guest OS template defaults and host capability probing
//!
//! This crate is the osinfo module of a virtualization-management
//! plugin. It resolves the default virtual-machine template parameters
//! (disk bus, NIC model, memory, CPU topology, graphics) for a guest
//! distro/version on the current host architecture, merging a built-in
//! baseline with an optional operator override file and the static
//! per-architecture specification tables. It also probes the local
//! hypervisor, kernel, and network stack for optional capabilities.
//!
//! Typical use: build one [`OsInfo`] at startup and answer per-request
//! queries from it.
//!
//! ```no_run
//! use virt_osinfo::OsInfo;
//!
//! let osinfo = OsInfo::from_host(None)?;
//! let params = osinfo.lookup(Some("fedora"), Some("22"));
//! assert_eq!(params.disk_bus, "virtio");
//! # Ok::<(), virt_osinfo::OsinfoError>(())
//! ```

pub mod arch;
pub mod config;
pub mod error;
pub mod host;
pub mod probes;
pub mod resolver;
pub mod specs;
pub mod version;

pub use arch::ArchFamily;
pub use config::{DiskBacking, DiskDefaults, TemplateDefaults};
pub use error::OsinfoError;
pub use host::HostInfo;
pub use probes::{Capabilities, HypervisorConnection};
pub use resolver::{OsInfo, ResolvedParams};
pub use specs::TemplateEra;
