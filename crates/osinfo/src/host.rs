//! Host introspection
//!
//! Gathers the facts about the running host the defaults computation
//! needs: raw machine type, total physical memory, and the distribution
//! ID (which feeds the POWER memory-slot rule). Read once at startup.

use serde::Serialize;

use crate::arch::ArchFamily;
use crate::error::OsinfoError;

/// Facts about the running host needed to compute template defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    /// Raw machine string as reported by uname(2), e.g. "x86_64".
    pub machine: String,
    /// Total physical memory in MiB.
    pub memory_mib: u64,
    /// Distribution ID from /etc/os-release, if readable.
    pub distro_id: Option<String>,
}

impl HostInfo {
    /// Gather facts from the running system.
    pub fn detect() -> Result<Self, OsinfoError> {
        let machine = rustix::system::uname()
            .machine()
            .to_string_lossy()
            .into_owned();
        let memory_mib = total_memory_mib("/proc/meminfo")?;
        let distro_id = os_release_id("/etc/os-release");
        Ok(HostInfo {
            machine,
            memory_mib,
            distro_id,
        })
    }

    /// Architecture family of this host.
    pub fn family(&self) -> Result<ArchFamily, OsinfoError> {
        ArchFamily::classify(&self.machine)
    }

    pub(crate) fn is_ubuntu(&self) -> bool {
        self.distro_id.as_deref() == Some("ubuntu")
    }
}

fn total_memory_mib(path: &str) -> Result<u64, OsinfoError> {
    let contents = std::fs::read_to_string(path)?;
    for line in contents.lines() {
        let Some(rest) = line.strip_prefix("MemTotal:") else {
            continue;
        };
        let kib: u64 = rest
            .trim()
            .trim_end_matches("kB")
            .trim()
            .parse()
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed MemTotal line in {path}: {line:?}"),
                )
            })?;
        return Ok(kib / 1024);
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("no MemTotal entry in {path}"),
    )
    .into())
}

fn os_release_id(path: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    for line in contents.lines() {
        let Some(value) = line.strip_prefix("ID=") else {
            continue;
        };
        return Some(value.trim().trim_matches('"').to_ascii_lowercase());
    }
    None
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_total_memory_mib() {
        let f = write_temp("MemFree:  1024 kB\nMemTotal:       16309656 kB\n");
        let mib = total_memory_mib(f.path().to_str().unwrap()).unwrap();
        assert_eq!(mib, 16309656 / 1024);
    }

    #[test]
    fn test_total_memory_missing_entry() {
        let f = write_temp("MemFree:  1024 kB\n");
        assert!(total_memory_mib(f.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_os_release_id() {
        let f = write_temp("NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"24.04\"\n");
        assert_eq!(
            os_release_id(f.path().to_str().unwrap()).as_deref(),
            Some("ubuntu")
        );
        let f = write_temp("NAME=Fedora\nID=\"fedora\"\n");
        assert_eq!(
            os_release_id(f.path().to_str().unwrap()).as_deref(),
            Some("fedora")
        );
        assert_eq!(os_release_id("/nonexistent/os-release"), None);
    }

    #[test]
    fn test_is_ubuntu() {
        let host = HostInfo {
            machine: "ppc64".to_string(),
            memory_mib: 4096,
            distro_id: Some("ubuntu".to_string()),
        };
        assert!(host.is_ubuntu());
        assert!(!HostInfo { distro_id: None, ..host }.is_ubuntu());
    }

    #[test]
    fn test_detect_on_this_host() {
        let host = HostInfo::detect().unwrap();
        assert!(!host.machine.is_empty());
        assert!(host.memory_mib > 0);
    }
}
