//! Owner identities that partition tables into isolated key namespaces.
//!
//! Every key carries the string rendering of its owner. Callers that do not
//! supply an owner are stored under the [`OwnerId::Root`] sentinel.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Rendering of the root sentinel inside keys.
pub const ROOT_OWNER: &str = "root";

/// Opaque identity owning a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OwnerId {
    /// Sentinel used when no owner is supplied.
    #[default]
    Root,
    /// A tenant or subject identified by a UUID.
    Uuid(Uuid),
}

impl OwnerId {
    /// Generates a fresh random owner identity.
    #[must_use]
    pub fn new_v4() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Resolves an optional owner, substituting the root sentinel when absent.
    #[must_use]
    pub fn resolve(owner: Option<&Self>) -> Self {
        owner.copied().unwrap_or_default()
    }

    /// Returns `true` for the root sentinel.
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str(ROOT_OWNER),
            Self::Uuid(id) => id.hyphenated().fmt(f),
        }
    }
}

impl FromStr for OwnerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ROOT_OWNER {
            return Ok(Self::Root);
        }
        Uuid::parse_str(s).map(Self::Uuid)
    }
}

impl From<Uuid> for OwnerId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}
