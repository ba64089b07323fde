//! Architecture classification for template defaults
//!
//! Maps raw machine strings into the small set of architecture families
//! the device-spec tables are keyed by, avoiding hardcoded architecture
//! assumptions elsewhere in the resolver.

use serde::Serialize;

use crate::error::OsinfoError;

/// Architecture families recognized by the device-spec tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchFamily {
    /// i386, i686, x86_64
    X86,
    /// Big-endian POWER (ppc, ppc64)
    Power,
    /// Little-endian POWER
    Ppc64le,
    /// IBM Z
    S390x,
}

impl ArchFamily {
    /// Classify a raw machine string (as reported by uname) into a family.
    ///
    /// Returns [`OsinfoError::UnsupportedArchitecture`] for anything outside
    /// the supported sets; callers should treat that as fatal at startup.
    pub fn classify(machine: &str) -> Result<Self, OsinfoError> {
        match machine {
            "i386" | "i686" | "x86_64" => Ok(ArchFamily::X86),
            "ppc" | "ppc64" => Ok(ArchFamily::Power),
            "ppc64le" => Ok(ArchFamily::Ppc64le),
            "s390x" => Ok(ArchFamily::S390x),
            other => Err(OsinfoError::UnsupportedArchitecture(other.to_string())),
        }
    }

    /// Family used for device-spec and version-threshold table lookups.
    ///
    /// ppc64le shares the power tables, matching the ppc64 normalization
    /// libvirt applies to the emitted architecture string.
    pub fn effective(self) -> Self {
        match self {
            ArchFamily::Ppc64le => ArchFamily::Power,
            other => other,
        }
    }

    /// Canonical name of this family.
    pub fn as_str(self) -> &'static str {
        match self {
            ArchFamily::X86 => "x86",
            ArchFamily::Power => "power",
            ArchFamily::Ppc64le => "ppc64le",
            ArchFamily::S390x => "s390x",
        }
    }
}

impl std::fmt::Display for ArchFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_machines() {
        for machine in ["i386", "i686", "x86_64"] {
            assert_eq!(ArchFamily::classify(machine).unwrap(), ArchFamily::X86);
        }
        for machine in ["ppc", "ppc64"] {
            assert_eq!(ArchFamily::classify(machine).unwrap(), ArchFamily::Power);
        }
        assert_eq!(
            ArchFamily::classify("ppc64le").unwrap(),
            ArchFamily::Ppc64le
        );
        assert_eq!(ArchFamily::classify("s390x").unwrap(), ArchFamily::S390x);
    }

    #[test]
    fn test_classify_unsupported() {
        for machine in ["aarch64", "riscv64", "mips", ""] {
            let err = ArchFamily::classify(machine).unwrap_err();
            assert!(matches!(err, OsinfoError::UnsupportedArchitecture(_)));
        }
    }

    #[test]
    fn test_effective_alias() {
        assert_eq!(ArchFamily::Ppc64le.effective(), ArchFamily::Power);
        assert_eq!(ArchFamily::X86.effective(), ArchFamily::X86);
        assert_eq!(ArchFamily::Power.effective(), ArchFamily::Power);
        assert_eq!(ArchFamily::S390x.effective(), ArchFamily::S390x);
    }
}
