//! Abstractions over the hosted columnar tables that store read mappings.
//!
//! The exporter never talks to a remote service directly; it runs against the
//! [`MappingsTable`] trait. The CLI provides an HTTP-backed implementation and
//! [`memory::MemoryTable`] provides an in-process one for tests.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpoolError};

pub mod memory;

/// A single cell value from a mappings table.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Returns the integer content, if this value is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the floating point content, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// One table row: the row id plus cell values keyed by column name. Columns
/// the table did not populate are simply absent.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub id: u64,
    pub values: HashMap<String, Value>,
}

impl Row {
    pub fn new(id: u64, values: HashMap<String, Value>) -> Self {
        Self { id, values }
    }
}

/// A column descriptor: the column name and its declared scalar type (e.g.
/// `int32`, `float`, `string`, `boolean`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ColumnDesc {
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, kind: S2) -> Self {
        Self { name: name.into(), kind: kind.into() }
    }
}

/// The result of describing a table: its name, row count, and ordered columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub length: u64,
    pub columns: Vec<ColumnDesc>,
}

/// One read group attached to a mappings table. Only the number of read
/// groups matters to the exporter; the counts are carried through for logging.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadGroup {
    #[serde(default)]
    pub num_pairs: u64,
    #[serde(default)]
    pub num_singles: u64,
}

/// Table details: the linked reference contig set (if any) and read groups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDetails {
    #[serde(default)]
    pub original_contigset: Option<String>,
    #[serde(default)]
    pub read_groups: Vec<ReadGroup>,
}

/// A named reference sequence and its length in bases.
#[derive(Clone, Debug, PartialEq)]
pub struct Contig {
    pub name: String,
    pub length: u64,
}

/// An ordered set of reference contigs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContigSet {
    contigs: Vec<Contig>,
}

impl ContigSet {
    /// Zips parallel `names` and `sizes` arrays, as stored on contig-set
    /// records, into an ordered contig set.
    pub fn from_parallel(names: Vec<String>, sizes: Vec<u64>) -> Result<Self> {
        if names.len() != sizes.len() {
            return Err(SpoolError::ContigMismatch { names: names.len(), sizes: sizes.len() });
        }
        let contigs = names
            .into_iter()
            .zip(sizes)
            .map(|(name, length)| Contig { name, length })
            .collect();
        Ok(Self { contigs })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contig> {
        self.contigs.iter()
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
}

/// How a genomic range query matches rows against the queried interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Match rows whose interval overlaps the query interval.
    Overlap,
    /// Match rows whose interval lies entirely within the query interval.
    Enclose,
}

/// An opaque, prepared genomic range query. Obtained from
/// [`MappingsTable::genomic_range_query`] and consumed by
/// [`MappingsTable::iterate_query_rows`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenomicRangeQuery {
    pub chr: String,
    pub lo: i64,
    pub hi: i64,
    pub mode: QueryMode,
    pub index: String,
}

/// A finite, lazy, non-restartable stream of rows. Fetch failures surface as
/// `Err` items and abort the export.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// The contract the exporter requires of a mappings table.
///
/// All methods may perform remote calls; any failure is fatal to the run.
pub trait MappingsTable {
    /// Describes the table: name, total row count, and ordered columns.
    fn describe(&self) -> Result<TableDescription>;

    /// Fetches the table details (reference contig-set link, read groups).
    fn details(&self) -> Result<TableDetails>;

    /// The ordered column names, matching the positional cell order of rows
    /// on the wire.
    fn column_names(&self) -> Result<Vec<String>>;

    /// Streams rows `start..end` (end exclusive), or from `start` to the end
    /// of the table when `end` is `None`.
    fn iterate_rows(&self, start: u64, end: Option<u64>) -> Result<RowStream<'_>>;

    /// Prepares a genomic range query against the named index.
    fn genomic_range_query(
        &self,
        chr: &str,
        lo: i64,
        hi: i64,
        mode: QueryMode,
        index: &str,
    ) -> Result<GenomicRangeQuery>;

    /// Streams the rows matched by a prepared query, in table order.
    fn iterate_query_rows(&self, query: &GenomicRangeQuery) -> Result<RowStream<'_>>;

    /// Looks up a contig-set record by identifier.
    fn contig_set(&self, id: &str) -> Result<ContigSet>;
}
