//! Template default resolution for guest distro/version pairs
//!
//! [`OsInfo`] holds the immutable process-wide [`TemplateDefaults`] and
//! answers per-request queries: [`OsInfo::lookup`] merges the baseline
//! with the architecture/version/custom specification layers, and
//! [`OsInfo::get_template_default`] answers single-field queries for an
//! explicit device era. Both are pure in-memory computations returning
//! independent copies, so concurrent callers never observe shared
//! mutation.
//!
//! Layer order in `lookup` is fixed and deliberate: era device spec,
//! then custom overrides, then icon selection. Custom overrides match on
//! the caller-supplied distro and version even when the displayed
//! os_distro/os_version have been rewritten to "unknown" (a guest with
//! no version-threshold entry can still carry an exact-version custom
//! spec, e.g. windows/xp).

use std::path::Path;

use serde::Serialize;

use crate::arch::ArchFamily;
use crate::config::TemplateDefaults;
use crate::error::OsinfoError;
use crate::host::HostInfo;
use crate::specs::{self, DeviceSpec, TemplateEra};
use crate::version::{version_at_least, LooseVersion};

/// Placeholder distro/version for guests that cannot be identified.
const UNKNOWN: &str = "unknown";

/// Resolves per-guest template parameters from the process-wide defaults.
#[derive(Debug, Clone)]
pub struct OsInfo {
    defaults: TemplateDefaults,
    family: ArchFamily,
}

impl OsInfo {
    /// Build a resolver over already-computed defaults.
    pub fn new(defaults: TemplateDefaults) -> Result<Self, OsinfoError> {
        let family = ArchFamily::classify(&defaults.arch)?;
        Ok(OsInfo { defaults, family })
    }

    /// Detect host facts, load the override file, and build a resolver.
    pub fn from_host(config_path: Option<&Path>) -> Result<Self, OsinfoError> {
        let host = HostInfo::detect()?;
        let defaults = TemplateDefaults::load(&host, config_path)?;
        Self::new(defaults)
    }

    /// The process-wide baseline this resolver serves from.
    pub fn defaults(&self) -> &TemplateDefaults {
        &self.defaults
    }

    /// Look up all parameters needed to run a VM of a known or unknown
    /// guest OS type and version.
    ///
    /// Starts from a copy of the baseline defaults and merges the layers
    /// for the identified OS. A distro/version that cannot be resolved
    /// never fails; it degrades to "unknown" with the old-era device spec
    /// and the generic icon.
    pub fn lookup(&self, distro: Option<&str>, version: Option<&str>) -> ResolvedParams {
        let mut params = ResolvedParams::from_defaults(self.defaults.clone());
        params.os_distro = distro.unwrap_or(UNKNOWN).to_string();
        params.os_version = version.unwrap_or(UNKNOWN).to_string();

        let family = self.family.effective();

        // libvirt reports ppc64 for both POWER byte orders.
        if params.defaults.arch == "ppc64le" {
            params.defaults.arch = "ppc64".to_string();
        }

        if family == ArchFamily::S390x {
            // Device specs do not vary with guest version on s390x.
            params.apply(&specs::template_spec(family, TemplateEra::Old));
            if distro.is_none() {
                params.os_distro = UNKNOWN.to_string();
                params.os_version = UNKNOWN.to_string();
            }
        } else {
            match distro.and_then(|d| specs::modern_version_base(family, d)) {
                Some(base) => {
                    let era = match version {
                        Some(v) if version_at_least(v, base) => TemplateEra::Modern,
                        _ => TemplateEra::Old,
                    };
                    params.apply(&specs::template_spec(family, era));
                }
                None => {
                    params.os_distro = UNKNOWN.to_string();
                    params.os_version = UNKNOWN.to_string();
                    params.apply(&specs::template_spec(family, TemplateEra::Old));
                }
            }
        }

        // Custom overrides are matched on the caller-supplied identifiers,
        // not the possibly-rewritten display fields. Gates are applied in
        // ascending version order so overlapping gates resolve
        // deterministically with the highest matching gate last.
        if let (Some(distro), Some(version)) = (distro, version) {
            let mut gates: Vec<_> = specs::custom_specs(distro)
                .iter()
                .filter(|c| c.family == family && version_at_least(version, c.version))
                .collect();
            gates.sort_by_key(|c| LooseVersion::parse(c.version));
            for gate in gates {
                params.apply(&gate.spec);
            }
        }

        params.icon = specs::icon_path(distro);
        params
    }

    /// Return a single field from the defaults merged with the given
    /// era's device spec, without running distro/version resolution.
    ///
    /// Fails with [`OsinfoError::UnknownField`] when the merged structure
    /// has no such field.
    pub fn get_template_default(
        &self,
        era: TemplateEra,
        field: &str,
    ) -> Result<serde_json::Value, OsinfoError> {
        let mut merged = serde_json::to_value(&self.defaults)?;
        let spec = specs::template_spec(self.family.effective(), era);
        let map = merged
            .as_object_mut()
            .expect("TemplateDefaults serializes to an object");
        for (name, model) in spec.fields() {
            map.insert(name.to_string(), serde_json::Value::String(model.to_string()));
        }
        map.get(field)
            .cloned()
            .ok_or_else(|| OsinfoError::UnknownField(field.to_string()))
    }
}

/// Fully merged template parameters for one guest distro/version.
///
/// Computed fresh on every [`OsInfo::lookup`] call; never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParams {
    /// Guest distro identifier, or "unknown".
    pub os_distro: String,
    /// Guest version, or "unknown".
    pub os_version: String,
    /// UI icon path for the distro.
    pub icon: String,
    /// Disk bus model. Every era spec names one, so this is always set.
    pub disk_bus: String,
    /// NIC model. Every era spec names one, so this is always set.
    pub nic_model: String,
    /// Keyboard type, where the era spec names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kbd_type: Option<String>,
    /// Keyboard bus, where the era spec names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kbd_bus: Option<String>,
    /// Tablet bus, where the era spec names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tablet_bus: Option<String>,
    /// Sound card model, where the era spec names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_model: Option<String>,
    /// Video card model, where a custom override names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_model: Option<String>,
    /// The copied baseline defaults these parameters extend. The cdrom
    /// and mouse buses inside may have been overridden by the device
    /// spec layers.
    #[serde(flatten)]
    pub defaults: TemplateDefaults,
}

impl ResolvedParams {
    fn from_defaults(defaults: TemplateDefaults) -> Self {
        ResolvedParams {
            os_distro: UNKNOWN.to_string(),
            os_version: UNKNOWN.to_string(),
            icon: String::new(),
            // Overwritten by the era spec before lookup returns.
            disk_bus: String::new(),
            nic_model: String::new(),
            kbd_type: None,
            kbd_bus: None,
            tablet_bus: None,
            sound_model: None,
            video_model: None,
            defaults,
        }
    }

    fn apply(&mut self, spec: &DeviceSpec) {
        if let Some(v) = spec.disk_bus {
            self.disk_bus = v.to_string();
        }
        if let Some(v) = spec.nic_model {
            self.nic_model = v.to_string();
        }
        if let Some(v) = spec.cdrom_bus {
            self.defaults.cdrom_bus = v.to_string();
        }
        if let Some(v) = spec.mouse_bus {
            self.defaults.mouse_bus = v.to_string();
        }
        if let Some(v) = spec.kbd_type {
            self.kbd_type = Some(v.to_string());
        }
        if let Some(v) = spec.kbd_bus {
            self.kbd_bus = Some(v.to_string());
        }
        if let Some(v) = spec.tablet_bus {
            self.tablet_bus = Some(v.to_string());
        }
        if let Some(v) = spec.sound_model {
            self.sound_model = Some(v.to_string());
        }
        if let Some(v) = spec.video_model {
            self.video_model = Some(v.to_string());
        }
    }
}
