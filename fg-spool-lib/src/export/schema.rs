//! Resolution of a table's declared columns into the exporter's schema.

use std::collections::HashMap;

use derive_getters::Getters;
use log::debug;

use crate::error::{Result, SpoolError};
use crate::table::{ColumnDesc, TableDescription};

/// Columns whose name starts with this prefix carry SAM tag values; the tag
/// name is the remainder of the column name.
pub const TAG_COLUMN_PREFIX: &str = "sam_field_";

/// A column whose non-empty cells are appended verbatim, already formatted
/// as SAM tags.
pub const RAW_TAG_COLUMN: &str = "sam_optional_fields";

/// How a tag column's values are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagColumnType {
    Int32,
    Float,
    Text,
}

impl TagColumnType {
    /// Maps a declared column type onto a tag encoding. Anything that is not
    /// `int32` or `float` is rendered as text; unrecognized declared types
    /// fall back to text rather than failing.
    fn from_declared(declared: &str) -> TagColumnType {
        match declared {
            "int32" => TagColumnType::Int32,
            "float" => TagColumnType::Float,
            _ => TagColumnType::Text,
        }
    }

    /// The SAM tag type code.
    pub fn code(self) -> char {
        match self {
            TagColumnType::Int32 => 'i',
            TagColumnType::Float => 'f',
            TagColumnType::Text => 'Z',
        }
    }
}

/// One resolved tag column.
#[derive(Clone, Debug, PartialEq)]
pub struct TagColumnSpec {
    /// The full column name as it appears in the table.
    pub column: String,
    /// The SAM tag name (the column name with the prefix stripped).
    pub tag: String,
    pub kind: TagColumnType,
    /// True for the raw passthrough column.
    pub raw: bool,
}

/// A table's columns resolved for export: the ordinal of every column and
/// the tag columns in table order.
#[derive(Clone, Debug, Getters)]
pub struct TableSchema {
    positions: HashMap<String, usize>,
    tag_columns: Vec<TagColumnSpec>,
}

impl TableSchema {
    /// Resolves the schema from a table description and its ordered column
    /// names. A table without columns cannot be exported.
    pub fn resolve(
        description: &TableDescription,
        column_names: &[String],
    ) -> Result<TableSchema> {
        if description.columns.is_empty() {
            return Err(SpoolError::EmptySchema { table: description.name.clone() });
        }
        let positions = column_names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| (name.clone(), ordinal))
            .collect();
        let tag_columns: Vec<TagColumnSpec> =
            description.columns.iter().filter_map(Self::tag_spec).collect();
        debug!(
            "resolved {} columns, {} of them tag columns",
            description.columns.len(),
            tag_columns.len()
        );
        Ok(TableSchema { positions, tag_columns })
    }

    fn tag_spec(column: &ColumnDesc) -> Option<TagColumnSpec> {
        if column.name == RAW_TAG_COLUMN {
            return Some(TagColumnSpec {
                column: column.name.clone(),
                tag: column.name.clone(),
                kind: TagColumnType::Text,
                raw: true,
            });
        }
        let tag = column.name.strip_prefix(TAG_COLUMN_PREFIX)?;
        let kind = TagColumnType::from_declared(&column.kind);
        if kind == TagColumnType::Text && !matches!(column.kind.as_str(), "string" | "text") {
            debug!("encoding column {} of declared type {} as text", column.name, column.kind);
        }
        Some(TagColumnSpec {
            column: column.name.clone(),
            tag: tag.to_string(),
            kind,
            raw: false,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }
}
