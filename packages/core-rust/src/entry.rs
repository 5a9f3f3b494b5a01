//! The atomic storage unit and its composite key layout.
//!
//! One [`Entry`] holds one column value of one record instance. Keys are
//! ASCII, dot-separated and compared lexicographically by the engine:
//!
//! ```text
//! <table>.<column>.<owner>.<row>
//! ```
//!
//! The row id is rendered as unpadded decimal, so lexicographic key order is
//! not numeric row order once ids reach two digits. Scans must not rely on it.

use crate::error::CodecError;
use crate::owner::OwnerId;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '.';

/// One column's value for one record instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub table_name: String,
    pub column_name: String,
    /// Owning identity; `None` resolves to [`OwnerId::Root`].
    pub owner: Option<OwnerId>,
    pub row_id: u32,
    pub data: Vec<u8>,
}

impl Entry {
    /// Creates an entry without data.
    #[must_use]
    pub fn blank(
        table_name: &str,
        column_name: &str,
        owner: Option<&OwnerId>,
        row_id: u32,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            owner: owner.copied(),
            row_id,
            data: Vec::new(),
        }
    }

    /// The owner this entry is stored under, with the root sentinel substituted.
    #[must_use]
    pub fn resolved_owner(&self) -> OwnerId {
        OwnerId::resolve(self.owner.as_ref())
    }

    /// `table.column.owner`
    #[must_use]
    pub fn prefix_key(&self) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.table_name,
            self.column_name,
            self.resolved_owner()
        )
    }

    /// `table.column.owner.row`
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.prefix_key(), self.row_id)
    }

    /// Prefix shared by every row of this column and owner, including the
    /// trailing separator so that one owner's rendering never matches another
    /// owner it happens to prefix.
    #[must_use]
    pub fn scan_prefix(&self) -> String {
        format!("{}{KEY_SEPARATOR}", self.prefix_key())
    }
}

/// Extracts the row id from a key found under `scan_prefix`.
///
/// # Errors
///
/// Returns [`CodecError::MalformedKey`] if the key does not start with the
/// prefix or its remainder is not an unsigned decimal row id.
pub fn parse_row_id(scan_prefix: &str, key: &str) -> Result<u32, CodecError> {
    key.strip_prefix(scan_prefix)
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| CodecError::MalformedKey {
            key: key.to_string(),
        })
}
