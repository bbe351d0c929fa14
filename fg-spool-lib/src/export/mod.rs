//! Conversion of mappings-table rows into SAM text.

pub mod record;
pub mod regions;
pub mod run;
pub mod sam;
pub mod schema;

pub use record::{MappingRecord, MappingStatus, MateId};
pub use regions::Region;
pub use run::{run_export, Builder, ExportOptions};
pub use schema::TableSchema;
