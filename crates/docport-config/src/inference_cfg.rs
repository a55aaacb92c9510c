//! Schema inference configuration.
//!
//! Controls which string and number formats the value classifier tries to
//! recognize, and what happens when two samples disagree on a field type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Format detectors consulted by the value classifier.
///
/// UUID and date-time detection are on by default; byte-array detection is
/// off because plenty of ordinary words are valid base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Treat non-empty standard base64 strings as byte arrays.
    #[serde(default)]
    pub byte_arrays: bool,

    /// Treat canonical hyphenated UUID strings as UUIDs.
    #[serde(default = "default_true")]
    pub uuids: bool,

    /// Treat RFC 3339 strings as date-times.
    #[serde(default = "default_true")]
    pub times: bool,

    /// Distinguish integers from floating point numbers.
    #[serde(default = "default_true")]
    pub integers: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            byte_arrays: false,
            uuids: true,
            times: true,
            integers: true,
        }
    }
}

impl DetectorConfig {
    /// Every detector switched off: strings stay strings, numbers are floats.
    pub fn plain() -> Self {
        Self {
            byte_arrays: false,
            uuids: false,
            times: false,
            integers: false,
        }
    }
}

/// What to do when two samples impose incompatible types on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Surface the conflict as an error and abort the batch.
    #[default]
    Fail,
    /// Replace the conflicting leaf with `string` and keep going.
    CoerceToString,
}

impl ConflictPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Fail => "fail",
            ConflictPolicy::CoerceToString => "coerce-to-string",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(ConflictPolicy::Fail),
            "coerce-to-string" | "coerce_to_string" => {
                Ok(ConflictPolicy::CoerceToString)
            }
            other => Err(format!(
                "unknown conflict policy '{other}', expected 'fail' or 'coerce-to-string'"
            )),
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}
