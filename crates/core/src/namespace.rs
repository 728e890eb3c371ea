//! Namespaces isolate solo and couple progress records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which identity a progress record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// A single user reflecting alone
    Solo,
    /// A paired user reflecting on the relationship
    Couple,
}

impl Mode {
    /// Key prefix used for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Solo => "solo",
            Mode::Couple => "couple",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Isolation key for one progress record, rendered as `solo:<id>` or `couple:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    mode: Mode,
    id: String,
}

impl Namespace {
    /// Create a namespace for the given mode and identity.
    pub fn new(mode: Mode, id: impl Into<String>) -> Self {
        Self { mode, id: id.into() }
    }

    /// Solo namespace for a user id.
    pub fn solo(id: impl Into<String>) -> Self {
        Self::new(Mode::Solo, id)
    }

    /// Couple namespace for a couple id.
    pub fn couple(id: impl Into<String>) -> Self {
        Self::new(Mode::Couple, id)
    }

    /// The mode this namespace belongs to.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The identity inside the mode.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fully qualified storage key, e.g. `solo:abc:dayCount`.
    pub fn key(&self, key: &str) -> String {
        format!("{}:{}", self, key)
    }

    /// Strip this namespace's prefix from a fully qualified key.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key
            .strip_prefix(self.mode.as_str())?
            .strip_prefix(':')?
            .strip_prefix(self.id.as_str())?
            .strip_prefix(':')
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.id)
    }
}

/// Error returned when a namespace string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid namespace '{0}': expected solo:<id> or couple:<id>")]
pub struct ParseNamespaceError(pub String);

impl std::str::FromStr for Namespace {
    type Err = ParseNamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mode, id) = s
            .split_once(':')
            .ok_or_else(|| ParseNamespaceError(s.to_string()))?;
        let mode = match mode {
            "solo" => Mode::Solo,
            "couple" => Mode::Couple,
            _ => return Err(ParseNamespaceError(s.to_string())),
        };
        if id.is_empty() {
            return Err(ParseNamespaceError(s.to_string()));
        }
        Ok(Self::new(mode, id))
    }
}
