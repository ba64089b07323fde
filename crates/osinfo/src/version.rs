//! Loose version ordering for guest OS version strings
//!
//! Distro versions in the threshold tables are dotted-numeric strings with
//! occasional alphabetic suffixes ("11sp3") or purely alphabetic values
//! ("xp"). This module provides the package-manager-style loose ordering
//! used to decide whether a guest version meets a threshold: numeric
//! components compare numerically, alphabetic components compare lexically,
//! and missing trailing components count as zero. An alphabetic component
//! sorts above a padded zero, so "11sp3" is at least "11".

use std::cmp::Ordering;

/// One parsed component of a version string.
///
/// The derived ordering compares numbers before text, which gives
/// alphabetic suffixes a position above the zero padding used for absent
/// components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// A version string parsed into ordered components.
#[derive(Debug, Clone)]
pub struct LooseVersion(Vec<Component>);

impl LooseVersion {
    /// Parse a version string, splitting on separators and on transitions
    /// between digit and non-digit runs. The empty string parses to no
    /// components.
    pub fn parse(version: &str) -> Self {
        let mut components = Vec::new();
        let mut current = String::new();
        let mut numeric = false;
        for ch in version.trim().chars() {
            if matches!(ch, '.' | '-' | '_') {
                flush(&mut components, &mut current, numeric);
                continue;
            }
            if !current.is_empty() && ch.is_ascii_digit() != numeric {
                flush(&mut components, &mut current, numeric);
            }
            numeric = ch.is_ascii_digit();
            current.push(ch);
        }
        flush(&mut components, &mut current, numeric);
        LooseVersion(components)
    }
}

fn flush(components: &mut Vec<Component>, current: &mut String, numeric: bool) {
    if current.is_empty() {
        return;
    }
    let component = if numeric {
        // Digit runs longer than a u64 are clamped; nothing in the
        // threshold tables comes anywhere near that.
        current.parse().map(Component::Number).unwrap_or(Component::Number(u64::MAX))
    } else {
        Component::Text(std::mem::take(current))
    };
    current.clear();
    components.push(component);
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let ord = match (self.0.get(i), other.0.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(a), None) => a.cmp(&Component::Number(0)),
                (None, Some(b)) => Component::Number(0).cmp(b),
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with the zero-padding ordering: "6" and "6.0"
// compare equal despite parsing to different component lists.
impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LooseVersion {}

/// Whether `actual` meets or exceeds `threshold` under the loose ordering.
///
/// An empty or whitespace-only `actual` is never at least a non-empty
/// threshold: an unknown guest version must not be assumed to satisfy a
/// known minimum.
pub fn version_at_least(actual: &str, threshold: &str) -> bool {
    if actual.trim().is_empty() && !threshold.trim().is_empty() {
        return false;
    }
    LooseVersion::parse(actual) >= LooseVersion::parse(threshold)
}
