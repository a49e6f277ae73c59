//! Protocol version negotiation.
//!
//! UMA versions are `"<major>.<minor>"` strings. Two VASPs running different
//! protocol revisions interoperate by agreeing on the weaker of what either
//! side supports. The rules live on [`ProtocolVersionTable`], a value built
//! once at startup and passed to the components that need it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Result, UmaError};

/// A parsed `"<major>.<minor>"` protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedVersion {
    pub major: u16,
    pub minor: u16,
}

impl ParsedVersion {
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl FromStr for ParsedVersion {
    type Err = UmaError;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| UmaError::InvalidVersionString(s.to_string()))?;
        if minor.contains('.') {
            return Err(UmaError::InvalidVersionString(s.to_string()));
        }
        let major = major
            .parse::<u16>()
            .map_err(|_| UmaError::InvalidVersionString(s.to_string()))?;
        let minor = minor
            .parse::<u16>()
            .map_err(|_| UmaError::InvalidVersionString(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

/// Returns whichever of two versions has the smaller (major, minor) pair.
///
/// Used by a receiver to pick the weaker of "what the sender asked for" vs
/// "what I support" so neither side is forced beyond its stated capability.
pub fn select_lower_version(v1: &str, v2: &str) -> Result<String> {
    let a: ParsedVersion = v1.parse()?;
    let b: ParsedVersion = v2.parse()?;
    Ok(a.min(b).to_string())
}

/// The set of protocol versions this engine speaks.
///
/// Immutable once constructed. The engine's current version plus the highest
/// supported minor for each back-compatible major.
#[derive(Clone, Debug)]
pub struct ProtocolVersionTable {
    current: ParsedVersion,
    // major -> highest supported minor
    supported: BTreeMap<u16, u16>,
}

impl ProtocolVersionTable {
    /// The version table for this release: current version 1.0, with major 0
    /// supported up to minor 3 for back compatibility.
    pub fn current() -> Self {
        let mut supported = BTreeMap::new();
        supported.insert(0, 3);
        supported.insert(1, 0);
        Self {
            current: ParsedVersion::new(1, 0),
            supported,
        }
    }

    /// Build a custom table. The current version's major must appear in the
    /// supported map with a minor at least as high as the current minor.
    pub fn new(current: ParsedVersion, supported: BTreeMap<u16, u16>) -> Result<Self> {
        match supported.get(&current.major) {
            Some(minor) if *minor >= current.minor => Ok(Self { current, supported }),
            _ => Err(UmaError::invalid_input(
                "supported",
                "current version must be within the supported set",
            )),
        }
    }

    /// The current `"<major>.<minor>"` version string.
    pub fn current_version(&self) -> String {
        self.current.to_string()
    }

    /// All major versions this engine accepts, ascending.
    pub fn supported_major_versions(&self) -> Vec<u16> {
        self.supported.keys().copied().collect()
    }

    /// Comma-joined `"<major>.<minor>"` list of every supported version,
    /// ascending. Used in the invoice `umaVersions` field.
    pub fn supported_versions_string(&self) -> String {
        self.supported
            .iter()
            .map(|(major, minor)| format!("{major}.{minor}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// True iff the version's major component is supported. Unknown minors
    /// within a supported major are accepted (forward compatible).
    pub fn is_version_supported(&self, version: &str) -> bool {
        version
            .parse::<ParsedVersion>()
            .map(|v| self.supported.contains_key(&v.major))
            .unwrap_or(false)
    }

    /// Given a counterparty's supported major versions, returns this engine's
    /// highest minor for the greatest major both sides support.
    pub fn select_highest_supported_version(&self, other_majors: &[u16]) -> Result<String> {
        self.supported
            .iter()
            .rev()
            .find(|(major, _)| other_majors.contains(major))
            .map(|(major, minor)| ParsedVersion::new(*major, *minor).to_string())
            .ok_or_else(|| UmaError::NoCompatibleVersion {
                supported_major_versions: self.supported_major_versions(),
            })
    }

    /// Build the error surfaced when a counterparty's version major is
    /// unsupported, carrying the supported list so the caller can retry.
    pub fn unsupported_version_error(&self, version: &str) -> UmaError {
        UmaError::UnsupportedVersion {
            version: version.to_string(),
            supported_major_versions: self.supported_major_versions(),
        }
    }
}
