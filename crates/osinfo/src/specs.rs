//! Static specification tables
//!
//! Per-architecture device-model defaults for the two device eras, the
//! per-distro version thresholds that select between them, per-distro
//! custom overrides, memory-device slot limits, and the set of distros
//! with a branded UI icon. Pure data; all decisions live in the resolver.

use crate::arch::ArchFamily;

/// Device-model settings for one architecture/era combination.
///
/// All fields are optional: era entries only set the models that differ
/// from the baseline defaults, and custom overrides may set a single field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Disk bus ("ide", "scsi", "virtio").
    pub disk_bus: Option<&'static str>,
    /// NIC model ("e1000", "virtio", "spapr-vlan", "pcnet").
    pub nic_model: Option<&'static str>,
    /// CDROM bus.
    pub cdrom_bus: Option<&'static str>,
    /// Keyboard device type.
    pub kbd_type: Option<&'static str>,
    /// Keyboard bus.
    pub kbd_bus: Option<&'static str>,
    /// Mouse bus.
    pub mouse_bus: Option<&'static str>,
    /// Tablet bus.
    pub tablet_bus: Option<&'static str>,
    /// Sound card model.
    pub sound_model: Option<&'static str>,
    /// Video card model.
    pub video_model: Option<&'static str>,
}

impl DeviceSpec {
    const EMPTY: DeviceSpec = DeviceSpec {
        disk_bus: None,
        nic_model: None,
        cdrom_bus: None,
        kbd_type: None,
        kbd_bus: None,
        mouse_bus: None,
        tablet_bus: None,
        sound_model: None,
        video_model: None,
    };

    /// Iterate the (field name, model) pairs this spec sets.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        [
            ("disk_bus", self.disk_bus),
            ("nic_model", self.nic_model),
            ("cdrom_bus", self.cdrom_bus),
            ("kbd_type", self.kbd_type),
            ("kbd_bus", self.kbd_bus),
            ("mouse_bus", self.mouse_bus),
            ("tablet_bus", self.tablet_bus),
            ("sound_model", self.sound_model),
            ("video_model", self.video_model),
        ]
        .into_iter()
        .filter_map(|(name, model)| model.map(|m| (name, m)))
    }
}

/// Device era selected by comparing the guest version against the
/// distro's modern threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum TemplateEra {
    /// Legacy emulated devices, safe for guests without virtio drivers.
    Old,
    /// Paravirtualized devices for guests known to carry virtio support.
    Modern,
}

/// Era device-model defaults for one architecture family.
///
/// The s390x entries are identical for both eras: device specs do not
/// vary with guest version on that family.
pub fn template_spec(family: ArchFamily, era: TemplateEra) -> DeviceSpec {
    match (family, era) {
        (ArchFamily::X86, TemplateEra::Old) => DeviceSpec {
            disk_bus: Some("ide"),
            nic_model: Some("e1000"),
            sound_model: Some("ich6"),
            ..DeviceSpec::EMPTY
        },
        (ArchFamily::X86, TemplateEra::Modern) => DeviceSpec {
            disk_bus: Some("virtio"),
            nic_model: Some("virtio"),
            sound_model: Some("ich6"),
            tablet_bus: Some("usb"),
            ..DeviceSpec::EMPTY
        },
        (ArchFamily::Power, TemplateEra::Old) => DeviceSpec {
            disk_bus: Some("scsi"),
            nic_model: Some("spapr-vlan"),
            cdrom_bus: Some("scsi"),
            kbd_type: Some("kbd"),
            kbd_bus: Some("usb"),
            mouse_bus: Some("usb"),
            tablet_bus: Some("usb"),
            ..DeviceSpec::EMPTY
        },
        (ArchFamily::Power, TemplateEra::Modern) => DeviceSpec {
            disk_bus: Some("virtio"),
            nic_model: Some("virtio"),
            cdrom_bus: Some("scsi"),
            kbd_type: Some("kbd"),
            kbd_bus: Some("usb"),
            mouse_bus: Some("usb"),
            tablet_bus: Some("usb"),
            ..DeviceSpec::EMPTY
        },
        (ArchFamily::Ppc64le, _) => DeviceSpec {
            disk_bus: Some("virtio"),
            nic_model: Some("virtio"),
            cdrom_bus: Some("scsi"),
            kbd_type: Some("keyboard"),
            kbd_bus: Some("usb"),
            mouse_bus: Some("usb"),
            tablet_bus: Some("usb"),
            ..DeviceSpec::EMPTY
        },
        (ArchFamily::S390x, _) => DeviceSpec {
            disk_bus: Some("virtio"),
            nic_model: Some("virtio"),
            cdrom_bus: Some("scsi"),
            ..DeviceSpec::EMPTY
        },
    }
}

/// Minimum guest version at which a distro gets the modern device spec
/// on the given family, or `None` when the distro has no entry there.
pub fn modern_version_base(family: ArchFamily, distro: &str) -> Option<&'static str> {
    match family {
        ArchFamily::X86 => match distro {
            "debian" => Some("6.0"),
            "ubuntu" => Some("7.10"),
            "opensuse" => Some("10.3"),
            "centos" => Some("5.3"),
            "rhel" => Some("6.0"),
            "fedora" => Some("16"),
            "gentoo" => Some("0"),
            "sles" => Some("11"),
            "arch" => Some("0"),
            _ => None,
        },
        ArchFamily::Power | ArchFamily::Ppc64le => match distro {
            "rhel" => Some("6.5"),
            "fedora" => Some("19"),
            "ubuntu" => Some("14.04"),
            "opensuse" => Some("13.1"),
            "sles" => Some("11sp3"),
            _ => None,
        },
        ArchFamily::S390x => None,
    }
}

/// A custom device override gated on a minimum guest version.
#[derive(Debug, Clone, Copy)]
pub struct CustomSpec {
    /// Guest version at or above which the override applies.
    pub version: &'static str,
    /// Family the override belongs to.
    pub family: ArchFamily,
    /// Fields to merge on top of the era spec.
    pub spec: DeviceSpec,
}

/// Custom overrides for a distro, applied after era selection.
pub fn custom_specs(distro: &str) -> &'static [CustomSpec] {
    const FEDORA: &[CustomSpec] = &[CustomSpec {
        version: "22",
        family: ArchFamily::X86,
        spec: DeviceSpec {
            video_model: Some("qxl"),
            ..DeviceSpec::EMPTY
        },
    }];
    const WINDOWS: &[CustomSpec] = &[CustomSpec {
        version: "xp",
        family: ArchFamily::X86,
        spec: DeviceSpec {
            nic_model: Some("pcnet"),
            ..DeviceSpec::EMPTY
        },
    }];
    match distro {
        "fedora" => FEDORA,
        "windows" => WINDOWS,
        _ => &[],
    }
}

/// Memory hot-plug device slot limit, keyed by raw machine type.
///
/// Ubuntu kernels on POWER expose far fewer hot-plug slots.
pub fn mem_dev_slots(machine: &str, host_is_ubuntu: bool) -> u32 {
    match machine {
        "ppc64" | "ppc64le" if host_is_ubuntu => 32,
        _ => 256,
    }
}

/// Distros that ship a branded icon in the plugin UI assets.
pub const ICON_DISTROS: &[&str] = &["centos", "debian", "fedora", "gentoo", "opensuse", "ubuntu"];

/// UI icon path for a distro, falling back to the generic VM icon.
pub fn icon_path(distro: Option<&str>) -> String {
    match distro {
        Some(d) if ICON_DISTROS.contains(&d) => format!("plugins/virt/images/icon-{d}.png"),
        _ => "plugins/virt/images/icon-vm.png".to_string(),
    }
}
