//! Records and their conversion to and from [`Entry`] sets.
//!
//! A record type describes itself through a static table of [`Field`]
//! descriptors, normally generated by the [`record!`](crate::record!) macro.
//! Each descriptor pairs a column with the encode/decode functions of the
//! codec chosen for it at registration time, so conversion never inspects
//! types at runtime.

use tracing::trace;

use crate::codec::CodecKind;
use crate::entry::Entry;
use crate::error::{CodecError, DecodeError};
use crate::owner::OwnerId;

/// Descriptor of one record field.
pub struct Field<R> {
    /// Field name as declared. The column name is its lower-cased form.
    pub name: &'static str,
    /// Ignored fields are neither stored nor matched on load.
    pub ignore: bool,
    pub kind: CodecKind,
    pub encode: fn(&R) -> Result<Vec<u8>, serde_json::Error>,
    pub decode: fn(&mut R, &[u8]) -> Result<(), DecodeError>,
}

impl<R> Field<R> {
    /// Column name this field is stored under.
    #[must_use]
    pub fn column_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Case-insensitive match against a stored column name.
    #[must_use]
    pub fn matches(&self, column_name: &str) -> bool {
        !self.ignore && self.name.eq_ignore_ascii_case(column_name)
    }
}

/// A typed value that can be stored as a row of a table.
///
/// `Default` supplies the blank instance that scans decode into.
pub trait Record: Default + 'static {
    /// Table the record's rows live in.
    fn table_name() -> &'static str;

    /// Field descriptors in declaration order.
    fn fields() -> &'static [Field<Self>];

    /// Receives the row id assigned on save or found on load.
    fn set_row_id(&mut self, _row_id: u32) {}

    /// Descriptors of the fields that are actually stored.
    fn stored_fields() -> impl Iterator<Item = &'static Field<Self>> {
        Self::fields().iter().filter(|field| !field.ignore)
    }
}

/// Converts a record into one entry per stored field, in declaration order.
///
/// With `include_data` unset the entries carry no data, which is what key
/// lookups and deletions need.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if a JSON-coded field fails to serialize.
pub fn to_entries<R: Record>(
    table: &str,
    owner: Option<&OwnerId>,
    row_id: u32,
    record: &R,
    include_data: bool,
) -> Result<Vec<Entry>, CodecError> {
    R::stored_fields()
        .map(|field| {
            let column = field.column_name();
            let mut entry = Entry::blank(table, &column, owner, row_id);
            if include_data {
                entry.data = (field.encode)(record).map_err(|source| CodecError::Encode {
                    column,
                    source,
                })?;
            }
            Ok(entry)
        })
        .collect()
}

/// Entries without data for every stored field of `R`.
#[must_use]
pub fn blank_entries<R: Record>(table: &str, owner: Option<&OwnerId>, row_id: u32) -> Vec<Entry> {
    R::stored_fields()
        .map(|field| Entry::blank(table, &field.column_name(), owner, row_id))
        .collect()
}

/// Decodes one entry into the field whose name matches its column.
///
/// # Errors
///
/// Returns [`CodecError::FieldNotFound`] if no stored field matches the
/// column, or [`CodecError::Decode`] if the data does not fit the field.
pub fn load_entry<R: Record>(record: &mut R, entry: &Entry) -> Result<(), CodecError> {
    let field = R::fields()
        .iter()
        .find(|field| field.matches(&entry.column_name))
        .ok_or_else(|| CodecError::FieldNotFound {
            table: entry.table_name.clone(),
            column: entry.column_name.clone(),
        })?;

    trace!(column = %entry.column_name, bytes = entry.data.len(), "decoding entry");

    (field.decode)(record, &entry.data).map_err(|source| CodecError::Decode {
        column: entry.column_name.clone(),
        source,
    })
}

/// Decodes every entry into `record`, stopping at the first failure.
///
/// # Errors
///
/// See [`load_entry`].
pub fn from_entries<R: Record>(record: &mut R, entries: &[Entry]) -> Result<(), CodecError> {
    entries.iter().try_for_each(|entry| load_entry(record, entry))
}

/// Implements [`Record`] for a struct by registering its fields.
///
/// Each field names the codec it is stored with: `bytes`, `text`, `identity`,
/// `json`, or `ignore` for fields that are not persisted. The optional
/// `row_id` names a `u32` field that receives the row id on save and load.
///
/// ```
/// use kvs_core::record;
///
/// #[derive(Debug, Default)]
/// struct Balloon {
///     id: u32,
///     color: String,
///     size: i64,
/// }
///
/// record! {
///     Balloon {
///         table: "balloons",
///         row_id: id,
///         fields: {
///             id => ignore,
///             color => text,
///             size => json,
///         },
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $ty:ident {
            table: $table:expr,
            $(row_id: $row_id:ident,)?
            fields: { $($field:ident => $codec:ident),* $(,)? } $(,)?
        }
    ) => {
        impl $crate::record::Record for $ty {
            fn table_name() -> &'static str {
                $table
            }

            fn fields() -> &'static [$crate::record::Field<Self>] {
                static FIELDS: &[$crate::record::Field<$ty>] = &[
                    $($crate::record!(@field $ty, $field, $codec)),*
                ];
                FIELDS
            }

            $(
                fn set_row_id(&mut self, row_id: u32) {
                    self.$row_id = row_id;
                }
            )?
        }
    };
    (@field $ty:ident, $field:ident, ignore) => {
        $crate::record::Field {
            name: stringify!($field),
            ignore: true,
            kind: $crate::codec::CodecKind::Bytes,
            encode: |_: &$ty| Ok(::std::vec::Vec::new()),
            decode: |_: &mut $ty, _: &[u8]| Ok(()),
        }
    };
    (@field $ty:ident, $field:ident, bytes) => {
        $crate::record!(@typed $ty, $field, $crate::codec::BytesCodec)
    };
    (@field $ty:ident, $field:ident, text) => {
        $crate::record!(@typed $ty, $field, $crate::codec::TextCodec)
    };
    (@field $ty:ident, $field:ident, identity) => {
        $crate::record!(@typed $ty, $field, $crate::codec::IdentityCodec)
    };
    (@field $ty:ident, $field:ident, json) => {
        $crate::record!(@typed $ty, $field, $crate::codec::JsonCodec)
    };
    (@typed $ty:ident, $field:ident, $codec:ty) => {
        $crate::record::Field {
            name: stringify!($field),
            ignore: false,
            kind: <$codec as $crate::codec::Codec>::KIND,
            encode: |record: &$ty| {
                <$codec as $crate::codec::ValueCodec<_>>::encode(&record.$field)
            },
            decode: |record: &mut $ty, data: &[u8]| {
                record.$field = <$codec as $crate::codec::ValueCodec<_>>::decode(data)?;
                Ok(())
            },
        }
    };
}
