//! Immutable filter queries evaluated while a table is scanned.
//!
//! Queries are values: every builder call returns a new [`Query`] and leaves
//! the one it was called on untouched.
//!
//! ```ignore
//! let white = Query::new().filter("color").eq(["WHITE"]);
//! let small_white = white.filter("size").lt([400]);
//! let balloons: Vec<Balloon> = small_white.run(&store, None)?;
//! ```
//!
//! Within a clause the candidate values are alternatives; clauses combine by
//! conjunction. An entry whose column no clause names passes.
//!
//! Before a scan the query is bound to the record type, which fixes the codec
//! of every constrained column. Stored values are compared as that codec
//! decodes them: text and identity columns as UTF-8 text, byte columns as raw
//! bytes, JSON columns as JSON values with numbers compared numerically.
//! A candidate of another kind never matches.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use kvs_core::{CodecError, CodecKind, Entry, OwnerId, Record};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::Result;
use crate::storage::Store;

/// Comparison applied by a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Stored value equals a candidate.
    Eq,
    /// Stored value is less than a candidate.
    Lt,
}

impl Operator {
    fn admits(self, ordering: Option<Ordering>) -> bool {
        match self {
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Lt => ordering == Some(Ordering::Less),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => f.write_str("equal"),
            Self::Lt => f.write_str("less than"),
        }
    }
}

/// Candidate value a stored entry is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl Operand {
    /// Wraps any serializable value as a JSON operand.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> std::result::Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    /// Orders the decoded stored value against this operand, or `None` when
    /// the two are not comparable.
    fn compare(&self, kind: CodecKind, data: &[u8]) -> Option<Ordering> {
        match kind {
            CodecKind::Text | CodecKind::Identity => {
                let stored = std::str::from_utf8(data).ok()?;
                Some(stored.cmp(self.as_text()?))
            }
            CodecKind::Bytes => match self {
                Self::Bytes(bytes) => Some(data.cmp(bytes.as_slice())),
                _ => None,
            },
            CodecKind::Json => {
                let stored: Value = serde_json::from_slice(data).ok()?;
                compare_values(&stored, &*self.as_json()?)
            }
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Json(Value::String(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    fn as_json(&self) -> Option<Cow<'_, Value>> {
        match self {
            Self::Text(text) => Some(Cow::Owned(Value::String(text.clone()))),
            Self::Json(value) => Some(Cow::Borrowed(value)),
            Self::Bytes(_) => None,
        }
    }
}

fn compare_values(stored: &Value, bound: &Value) -> Option<Ordering> {
    match (stored, bound) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        // arrays, objects and null only support equality
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&[u8]> for Operand {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Operand {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<OwnerId> for Operand {
    fn from(value: OwnerId) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

macro_rules! json_operand {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Self::Json(Value::from(value))
                }
            }
        )*
    };
}

json_operand!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// One condition on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Operand>,
}

impl Clause {
    /// Whether this clause constrains `column_name`.
    #[must_use]
    pub fn applies_to(&self, column_name: &str) -> bool {
        self.field.eq_ignore_ascii_case(column_name)
    }

    /// Whether `data`, stored with a codec of `kind`, satisfies the operator
    /// for any candidate. A clause without candidates accepts nothing.
    #[must_use]
    pub fn accepts(&self, kind: CodecKind, data: &[u8]) -> bool {
        self.values
            .iter()
            .any(|value| self.operator.admits(value.compare(kind, data)))
    }
}

/// A conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// A query without clauses, matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a clause on `field` of a copy of this query.
    #[must_use]
    pub fn filter(&self, field: impl Into<String>) -> Filter {
        Filter {
            query: self.clone(),
            field: field.into(),
        }
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Resolves every clause to the stored column of `R` it names.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldNotFound`] for the first clause whose column
    /// `R` does not store.
    pub fn bind<R: Record>(&self) -> std::result::Result<BoundQuery<'_>, CodecError> {
        let clauses = self
            .clauses
            .iter()
            .map(|clause| {
                R::stored_fields()
                    .find(|field| field.matches(&clause.field))
                    .map(|field| (clause, field.kind))
                    .ok_or_else(|| CodecError::FieldNotFound {
                        table: R::table_name().to_string(),
                        column: clause.field.clone(),
                    })
            })
            .collect::<std::result::Result<_, _>>()?;
        Ok(BoundQuery { clauses })
    }

    /// Loads the rows of `R`'s table under `owner` that satisfy every clause.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldNotFound`] if a clause names a column `R`
    /// does not store, otherwise whatever [`Store::load_all_with`] returns.
    pub fn run<R: Record>(&self, store: &Store, owner: Option<&OwnerId>) -> Result<Vec<R>> {
        let bound = self.bind::<R>()?;
        store.load_all_with(owner, |entry| bound.matches(entry))
    }
}

/// A [`Query`] whose clauses are resolved to column codecs.
#[derive(Debug, Clone)]
pub struct BoundQuery<'q> {
    clauses: Vec<(&'q Clause, CodecKind)>,
}

impl BoundQuery<'_> {
    /// Evaluates every clause that applies to `entry`'s column.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        self.clauses
            .iter()
            .filter(|(clause, _)| clause.applies_to(&entry.column_name))
            .all(|(clause, kind)| clause.accepts(*kind, &entry.data))
    }
}

/// Runs `query` against `store`. See [`Query::run`].
///
/// # Errors
///
/// See [`Query::run`].
pub fn run<R: Record>(store: &Store, owner: Option<&OwnerId>, query: &Query) -> Result<Vec<R>> {
    query.run(store, owner)
}

/// A clause under construction; completed by [`eq`](Filter::eq) or
/// [`lt`](Filter::lt).
#[derive(Debug, Clone)]
pub struct Filter {
    query: Query,
    field: String,
}

impl Filter {
    /// Matches rows whose column equals any of `values`.
    #[must_use]
    pub fn eq<I, V>(self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.complete(Operator::Eq, values)
    }

    /// Matches rows whose column is less than any of `values`.
    #[must_use]
    pub fn lt<I, V>(self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.complete(Operator::Lt, values)
    }

    fn complete<I, V>(self, operator: Operator, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        let Self { mut query, field } = self;
        query.clauses.push(Clause {
            field,
            operator,
            values: values.into_iter().map(Into::into).collect(),
        });
        query
    }
}
