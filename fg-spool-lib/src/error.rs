use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Errors raised while exporting a mappings table. Every variant is fatal to
/// the run; there is no per-row recovery.
#[derive(Error, Debug)]
pub enum SpoolError {
    /// No reference contig set was given and the table does not link one.
    #[error("the original reference genome must be attached to the mappings table")]
    MissingReference,

    #[error("unable to access reference contig set {id}: {reason}")]
    ReferenceInaccessible { id: String, reason: String },

    #[error("contig names and sizes differ in length ({names} names, {sizes} sizes)")]
    ContigMismatch { names: usize, sizes: usize },

    #[error("start row {start} is beyond the table length {length}")]
    StartRowBeyondTable { start: u64, length: u64 },

    #[error("end row {end} precedes start row {start}")]
    EndRowBeforeStart { start: u64, end: u64 },

    #[error("table {table} exposes no columns")]
    EmptySchema { table: String },

    #[error("malformed region {text:?}")]
    InvalidRegion { text: String },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A remote table call failed. The reason is whatever the table
    /// implementation could report.
    #[error("table access failed: {reason}")]
    Table { reason: String },
}
