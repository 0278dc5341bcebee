//! Wire format versions of the schema encoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A version of the schema wire encoding.
///
/// Each version only adds features to the previous one:
/// - `V0`: atoms only
/// - `V1`: full recursive structure, no sharing, no metadata
/// - `V2`: named sharing
/// - `V3`: record and variant metadata blocks (all-float layout, kind,
///   field and case indices, tags)
/// - `V4`: field mutability and case argument labels
/// - `V5`: the canonical form, identical to the in-memory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl WireVersion {
    /// All versions, oldest first
    pub const ALL: [WireVersion; 6] = [
        WireVersion::V0,
        WireVersion::V1,
        WireVersion::V2,
        WireVersion::V3,
        WireVersion::V4,
        WireVersion::V5,
    ];

    /// The version matching the in-memory tree
    pub const LATEST: WireVersion = WireVersion::V5;

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Parse "3" or "v3"
    pub fn parse(version_str: &str) -> Option<Self> {
        // Strip leading 'v' if present
        let trimmed = version_str.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let number: usize = digits.parse().ok()?;
        Self::ALL.get(number).copied()
    }
}

impl Default for WireVersion {
    fn default() -> Self {
        WireVersion::LATEST
    }
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

impl FromStr for WireVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown wire version '{}', expected v0 to v5", s))
    }
}
