//! Template defaults computation and the operator override file
//!
//! Builds the process-wide [`TemplateDefaults`] tree: a built-in baseline
//! computed from the host facts, overlaid with the optional operator
//! override file (`template.conf`, TOML). The file stores every value as
//! a string; numeric fields are coerced during the merge. Computed once
//! at startup and never mutated afterwards.
//!
//! On s390x the storage section gets special treatment: a file-supplied
//! disk replaces the built-in one entirely and must name a storage pool
//! or a filesystem path; naming both is only a warning, and the path
//! wins.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::arch::ArchFamily;
use crate::error::OsinfoError;
use crate::host::HostInfo;
use crate::specs;

/// Ceiling for the computed default template memory, in MiB.
const DEFAULT_MEM_CEILING_MIB: u64 = 2048;

/// Default disk image size in GiB.
const DEFAULT_DISK_SIZE_GIB: u64 = 10;

/// Default disk image format.
const DEFAULT_DISK_FORMAT: &str = "qcow2";

/// Default storage pool name.
const DEFAULT_POOL: &str = "default";

/// Default image directory used instead of a pool on s390x.
const DEFAULT_S390X_PATH: &str = "/var/lib/libvirt/images/";

/// Prefix turning a pool name into its canonical resource path.
const POOL_RESOURCE_PREFIX: &str = "/plugins/virt/storagepools/";

/// Parsed operator override file.
///
/// Sections absent from the file deserialize to their defaults and leave
/// the built-in baseline untouched.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    main: MainSection,
    #[serde(default)]
    memory: MemorySection,
    #[serde(default)]
    storage: BTreeMap<String, DiskSection>,
    #[serde(default)]
    processor: ProcessorSection,
    #[serde(default)]
    graphics: GraphicsSection,
}

#[derive(Debug, Default, Deserialize)]
struct MainSection {
    networks: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct MemorySection {
    current: Option<String>,
    maxmemory: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskSection {
    size: Option<String>,
    format: Option<String>,
    pool: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessorSection {
    vcpus: Option<String>,
    maxvcpus: Option<String>,
    /// Remaining keys (sockets, cores, threads) form the CPU topology.
    #[serde(flatten)]
    topology: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphicsSection {
    #[serde(rename = "type")]
    kind: Option<String>,
    listen: Option<String>,
}

impl TemplateConfig {
    /// Read the override file. A missing or unreadable file means "no
    /// overrides"; a file that exists but is not valid TOML is fatal.
    fn read(path: &Path) -> Result<Self, OsinfoError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                debug!("no template overrides at {}: {err}", path.display());
                return Ok(TemplateConfig::default());
            }
        };
        Ok(toml::from_str(&contents)?)
    }
}

/// Memory defaults in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryDefaults {
    /// Memory assigned at boot.
    pub current: u64,
    /// Hot-plug ceiling.
    pub maxmemory: u64,
}

/// Disk backing: exactly one of a storage pool or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskBacking {
    /// Canonical resource path of a storage pool.
    Pool {
        /// Pool resource path.
        name: String,
    },
    /// Directory holding the disk image; only the default on s390x.
    Path(String),
}

/// One default disk descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskDefaults {
    /// Disk index, taken from the `disk.N` section key.
    pub index: u32,
    /// Image size in GiB.
    pub size: u64,
    /// Image format.
    pub format: String,
    /// Pool or path backing.
    #[serde(flatten)]
    pub backing: DiskBacking,
}

/// Processor defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuDefaults {
    /// Virtual CPUs assigned at boot.
    pub vcpus: u32,
    /// Hot-plug ceiling.
    pub maxvcpus: u32,
    /// Optional topology (sockets/cores/threads), when the operator set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<BTreeMap<String, u32>>,
}

/// Graphics defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphicsDefaults {
    /// Graphics server type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Listen address.
    pub listen: String,
}

/// Process-wide baseline template defaults.
///
/// Computed once at startup by [`TemplateDefaults::load`] and then only
/// read; the resolver deep-copies it for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateDefaults {
    /// Virtualization domain type.
    pub domain: String,
    /// Raw machine string of the host.
    pub arch: String,
    /// Default guest networks; empty on s390x.
    pub networks: Vec<String>,
    /// Memory defaults.
    pub memory: MemoryDefaults,
    /// Default disks.
    pub disks: Vec<DiskDefaults>,
    /// Processor defaults.
    pub cpu_info: CpuDefaults,
    /// Graphics defaults.
    pub graphics: GraphicsDefaults,
    /// Memory hot-plug device slots.
    pub mem_dev_slots: u32,
    /// CDROM bus.
    pub cdrom_bus: String,
    /// CDROM device index.
    pub cdrom_index: u32,
    /// Mouse bus.
    pub mouse_bus: String,
    /// Default console type; set to "virtio" on s390x.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
}

impl TemplateDefaults {
    /// Compute the merged defaults: built-in baseline overlaid with the
    /// operator override file, if one is given.
    ///
    /// Idempotent: no side effects beyond reading the file, so repeated
    /// calls with the same inputs yield identical trees.
    pub fn load(host: &HostInfo, config_path: Option<&Path>) -> Result<Self, OsinfoError> {
        let config = match config_path {
            Some(path) => TemplateConfig::read(path)?,
            None => TemplateConfig::default(),
        };
        Self::merge(host, &config)
    }

    fn merge(host: &HostInfo, config: &TemplateConfig) -> Result<Self, OsinfoError> {
        let family = host.family()?;
        let on_s390x = family == ArchFamily::S390x;

        let networks = match &config.main.networks {
            Some(networks) => networks.clone(),
            None if on_s390x => Vec::new(),
            None => vec!["default".to_string()],
        };

        let baseline_mem = host.memory_mib.min(DEFAULT_MEM_CEILING_MIB);
        let memory = MemoryDefaults {
            current: coerce(config.memory.current.as_deref(), baseline_mem, "memory.current")?,
            maxmemory: coerce(
                config.memory.maxmemory.as_deref(),
                baseline_mem,
                "memory.maxmemory",
            )?,
        };

        let disks = merge_disks(&config.storage, on_s390x)?;

        let topology = if config.processor.topology.is_empty() {
            None
        } else {
            let mut topology = BTreeMap::new();
            for (key, value) in &config.processor.topology {
                let field = format!("processor.{key}");
                topology.insert(key.clone(), coerce(Some(value.as_str()), 0, &field)?);
            }
            Some(topology)
        };
        let cpu_info = CpuDefaults {
            vcpus: coerce(config.processor.vcpus.as_deref(), 1, "processor.vcpus")?,
            maxvcpus: coerce(config.processor.maxvcpus.as_deref(), 1, "processor.maxvcpus")?,
            topology,
        };

        let graphics = GraphicsDefaults {
            kind: config
                .graphics
                .kind
                .clone()
                .unwrap_or_else(|| "vnc".to_string()),
            listen: config
                .graphics
                .listen
                .clone()
                .unwrap_or_else(|| "127.0.0.1".to_string()),
        };

        Ok(TemplateDefaults {
            domain: "kvm".to_string(),
            arch: host.machine.clone(),
            networks,
            memory,
            disks,
            cpu_info,
            graphics,
            mem_dev_slots: specs::mem_dev_slots(&host.machine, host.is_ubuntu()),
            cdrom_bus: "ide".to_string(),
            cdrom_index: 2,
            mouse_bus: "ps2".to_string(),
            console: on_s390x.then(|| "virtio".to_string()),
        })
    }
}

/// Merge the storage section over the built-in single-disk baseline.
fn merge_disks(
    storage: &BTreeMap<String, DiskSection>,
    on_s390x: bool,
) -> Result<Vec<DiskDefaults>, OsinfoError> {
    if storage.is_empty() {
        return Ok(vec![builtin_disk(on_s390x)]);
    }

    // File configuration takes preference. Only s390x discards the
    // built-in disk wholesale; elsewhere it survives unless the file
    // defines its own disk.0.
    let mut disks = Vec::new();
    if !on_s390x && !storage.contains_key("disk.0") {
        disks.push(builtin_disk(on_s390x));
    }
    for (key, section) in storage {
        let index = disk_index(key)?;
        let backing = match (&section.pool, &section.path) {
            (Some(pool), Some(path)) if on_s390x => {
                warn!(
                    "both default pool and path are specified in template.conf; \
                     ignoring pool {pool:?} in favor of path {path:?}"
                );
                DiskBacking::Path(path.clone())
            }
            (None, Some(path)) if on_s390x => DiskBacking::Path(path.clone()),
            (None, None) if on_s390x => {
                // KCHTMPL0040E in the original message catalog.
                return Err(OsinfoError::InvalidTemplateConfig(format!(
                    "storage section {key:?} must specify a pool or a path"
                )));
            }
            (pool, path) => {
                if path.is_some() {
                    warn!("storage path in {key:?} is only supported on s390x, ignoring");
                }
                DiskBacking::Pool {
                    name: pool_resource(pool.as_deref().unwrap_or(DEFAULT_POOL)),
                }
            }
        };
        disks.push(DiskDefaults {
            index,
            size: coerce(section.size.as_deref(), DEFAULT_DISK_SIZE_GIB, key)?,
            format: section
                .format
                .clone()
                .unwrap_or_else(|| DEFAULT_DISK_FORMAT.to_string()),
            backing,
        });
    }
    Ok(disks)
}

/// The built-in single-disk baseline for hosts with no storage overrides.
fn builtin_disk(on_s390x: bool) -> DiskDefaults {
    let backing = if on_s390x {
        DiskBacking::Path(DEFAULT_S390X_PATH.to_string())
    } else {
        DiskBacking::Pool {
            name: pool_resource(DEFAULT_POOL),
        }
    };
    DiskDefaults {
        index: 0,
        size: DEFAULT_DISK_SIZE_GIB,
        format: DEFAULT_DISK_FORMAT.to_string(),
        backing,
    }
}

/// Parse the ordinal out of a `disk.N` section key.
fn disk_index(key: &str) -> Result<u32, OsinfoError> {
    key.strip_prefix("disk.")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            OsinfoError::InvalidTemplateConfig(format!(
                "storage section {key:?} is not of the form \"disk.N\""
            ))
        })
}

/// Canonical resource path for a storage pool name.
fn pool_resource(name: &str) -> String {
    format!("{POOL_RESOURCE_PREFIX}{name}")
}

/// Coerce a string-valued numeric field from the override file.
fn coerce<T>(value: Option<&str>, default: T, field: &str) -> Result<T, OsinfoError>
where
    T: std::str::FromStr,
{
    match value {
        Some(s) => s.trim().parse().map_err(|_| {
            OsinfoError::InvalidTemplateConfig(format!("{field} must be numeric, got {s:?}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use similar_asserts::assert_eq;

    use super::*;

    fn x86_host() -> HostInfo {
        HostInfo {
            machine: "x86_64".to_string(),
            memory_mib: 8192,
            distro_id: Some("fedora".to_string()),
        }
    }

    fn s390x_host() -> HostInfo {
        HostInfo {
            machine: "s390x".to_string(),
            memory_mib: 8192,
            distro_id: None,
        }
    }

    fn parse(contents: &str) -> TemplateConfig {
        toml::from_str(contents).unwrap()
    }

    #[test]
    fn test_builtin_baseline_x86() {
        let defaults = TemplateDefaults::load(&x86_host(), None).unwrap();
        assert_eq!(defaults.domain, "kvm");
        assert_eq!(defaults.arch, "x86_64");
        assert_eq!(defaults.networks, vec!["default".to_string()]);
        assert_eq!(defaults.memory.current, 2048);
        assert_eq!(defaults.memory.maxmemory, 2048);
        assert_eq!(defaults.cpu_info.vcpus, 1);
        assert_eq!(defaults.cpu_info.maxvcpus, 1);
        assert_eq!(defaults.cpu_info.topology, None);
        assert_eq!(defaults.graphics.kind, "vnc");
        assert_eq!(defaults.graphics.listen, "127.0.0.1");
        assert_eq!(defaults.mem_dev_slots, 256);
        assert_eq!(defaults.cdrom_bus, "ide");
        assert_eq!(defaults.cdrom_index, 2);
        assert_eq!(defaults.mouse_bus, "ps2");
        assert_eq!(defaults.console, None);
        assert_eq!(defaults.disks.len(), 1);
        let disk = &defaults.disks[0];
        assert_eq!(disk.index, 0);
        assert_eq!(disk.size, 10);
        assert_eq!(disk.format, "qcow2");
        assert_eq!(
            disk.backing,
            DiskBacking::Pool {
                name: "/plugins/virt/storagepools/default".to_string()
            }
        );
    }

    #[test]
    fn test_memory_capped_by_host() {
        let host = HostInfo {
            memory_mib: 1024,
            ..x86_host()
        };
        let defaults = TemplateDefaults::load(&host, None).unwrap();
        assert_eq!(defaults.memory.current, 1024);
        assert_eq!(defaults.memory.maxmemory, 1024);
    }

    #[test]
    fn test_builtin_baseline_s390x() {
        let defaults = TemplateDefaults::load(&s390x_host(), None).unwrap();
        assert!(defaults.networks.is_empty());
        assert_eq!(defaults.console.as_deref(), Some("virtio"));
        assert_eq!(
            defaults.disks[0].backing,
            DiskBacking::Path("/var/lib/libvirt/images/".to_string())
        );
    }

    #[test]
    fn test_file_overlays_baseline() {
        let config = parse(
            r#"
            [main]
            networks = ["default", "br0"]

            [memory]
            current = "1024"
            maxmemory = "4096"

            [storage."disk.0"]
            size = "20"
            pool = "fast"

            [processor]
            vcpus = "2"
            maxvcpus = "8"
            sockets = "1"
            cores = "4"
            threads = "2"

            [graphics]
            type = "spice"
            "#,
        );
        let defaults = TemplateDefaults::merge(&x86_host(), &config).unwrap();
        assert_eq!(
            defaults.networks,
            vec!["default".to_string(), "br0".to_string()]
        );
        assert_eq!(defaults.memory.current, 1024);
        assert_eq!(defaults.memory.maxmemory, 4096);
        let disk = &defaults.disks[0];
        assert_eq!(disk.size, 20);
        assert_eq!(disk.format, "qcow2");
        assert_eq!(
            disk.backing,
            DiskBacking::Pool {
                name: "/plugins/virt/storagepools/fast".to_string()
            }
        );
        assert_eq!(defaults.cpu_info.vcpus, 2);
        assert_eq!(defaults.cpu_info.maxvcpus, 8);
        let topology = defaults.cpu_info.topology.unwrap();
        assert_eq!(topology["sockets"], 1);
        assert_eq!(topology["cores"], 4);
        assert_eq!(topology["threads"], 2);
        assert_eq!(defaults.graphics.kind, "spice");
        // Sections the file leaves out keep their baseline values.
        assert_eq!(defaults.graphics.listen, "127.0.0.1");
    }

    #[test]
    fn test_multiple_disks_indexed_by_key() {
        let config = parse(
            r#"
            [storage."disk.0"]
            pool = "default"

            [storage."disk.1"]
            size = "40"
            format = "raw"
            pool = "bulk"
            "#,
        );
        let defaults = TemplateDefaults::merge(&x86_host(), &config).unwrap();
        assert_eq!(defaults.disks.len(), 2);
        assert_eq!(defaults.disks[0].index, 0);
        assert_eq!(defaults.disks[1].index, 1);
        assert_eq!(defaults.disks[1].size, 40);
        assert_eq!(defaults.disks[1].format, "raw");
    }

    #[test]
    fn test_nonfirst_disk_section_keeps_builtin_disk0() {
        // A file that only defines disk.1 extends the baseline; the
        // built-in disk.0 survives on everything but s390x.
        let config = parse("[storage.\"disk.1\"]\nsize = \"40\"\npool = \"bulk\"\n");
        let defaults = TemplateDefaults::merge(&x86_host(), &config).unwrap();
        assert_eq!(defaults.disks.len(), 2);
        assert_eq!(defaults.disks[0].index, 0);
        assert_eq!(defaults.disks[0].size, 10);
        assert_eq!(
            defaults.disks[0].backing,
            DiskBacking::Pool {
                name: "/plugins/virt/storagepools/default".to_string()
            }
        );
        assert_eq!(defaults.disks[1].index, 1);
        assert_eq!(defaults.disks[1].size, 40);
    }

    #[test]
    fn test_s390x_any_file_storage_discards_builtin() {
        // On s390x the file storage section replaces the built-in disk
        // entirely, even when disk.0 itself is not mentioned.
        let config = parse("[storage.\"disk.1\"]\npool = \"tank\"\n");
        let defaults = TemplateDefaults::merge(&s390x_host(), &config).unwrap();
        assert_eq!(defaults.disks.len(), 1);
        assert_eq!(defaults.disks[0].index, 1);
    }

    #[test]
    fn test_s390x_file_pool_replaces_default_path() {
        let config = parse("[storage.\"disk.0\"]\npool = \"tank\"\n");
        let defaults = TemplateDefaults::merge(&s390x_host(), &config).unwrap();
        assert_eq!(
            defaults.disks[0].backing,
            DiskBacking::Pool {
                name: "/plugins/virt/storagepools/tank".to_string()
            }
        );
    }

    #[test]
    fn test_s390x_path_wins_over_pool() {
        let config = parse("[storage.\"disk.0\"]\npool = \"tank\"\npath = \"/images\"\n");
        let defaults = TemplateDefaults::merge(&s390x_host(), &config).unwrap();
        assert_eq!(
            defaults.disks[0].backing,
            DiskBacking::Path("/images".to_string())
        );
    }

    #[test]
    fn test_s390x_neither_pool_nor_path_is_fatal() {
        let config = parse("[storage.\"disk.0\"]\nsize = \"20\"\n");
        let err = TemplateDefaults::merge(&s390x_host(), &config).unwrap_err();
        assert!(matches!(err, OsinfoError::InvalidTemplateConfig(_)));
    }

    #[test]
    fn test_path_ignored_off_s390x() {
        let config = parse("[storage.\"disk.0\"]\npath = \"/images\"\n");
        let defaults = TemplateDefaults::merge(&x86_host(), &config).unwrap();
        assert_eq!(
            defaults.disks[0].backing,
            DiskBacking::Pool {
                name: "/plugins/virt/storagepools/default".to_string()
            }
        );
    }

    #[test]
    fn test_non_numeric_memory_rejected() {
        let config = parse("[memory]\ncurrent = \"lots\"\n");
        let err = TemplateDefaults::merge(&x86_host(), &config).unwrap_err();
        assert!(matches!(err, OsinfoError::InvalidTemplateConfig(_)));
    }

    #[test]
    fn test_malformed_disk_key_rejected() {
        let config = parse("[storage.cdrom]\npool = \"default\"\n");
        let err = TemplateDefaults::merge(&x86_host(), &config).unwrap_err();
        assert!(matches!(err, OsinfoError::InvalidTemplateConfig(_)));
    }

    #[test]
    fn test_load_missing_file_means_no_overrides() {
        let from_missing =
            TemplateDefaults::load(&x86_host(), Some(Path::new("/nonexistent/template.conf")))
                .unwrap();
        let from_none = TemplateDefaults::load(&x86_host(), None).unwrap();
        assert_eq!(from_missing, from_none);
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[memory]\ncurrent = \"512\"\nmaxmemory = \"512\"\n")
            .unwrap();
        let first = TemplateDefaults::load(&x86_host(), Some(file.path())).unwrap();
        let second = TemplateDefaults::load(&x86_host(), Some(file.path())).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.memory.current, 512);
    }

    #[test]
    fn test_disks_always_have_exactly_one_backing() {
        // The enum makes neither-or-both unrepresentable; spot-check the
        // serialized shape carries exactly one of the two keys.
        for host in [x86_host(), s390x_host()] {
            let defaults = TemplateDefaults::load(&host, None).unwrap();
            let value = serde_json::to_value(&defaults.disks[0]).unwrap();
            let has_pool = value.get("pool").is_some();
            let has_path = value.get("path").is_some();
            assert!(has_pool ^ has_path, "{value}");
        }
    }
}
