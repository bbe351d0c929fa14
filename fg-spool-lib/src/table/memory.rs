//! An in-process [`MappingsTable`] backed by plain vectors. Used by the unit
//! tests in this crate and available to downstream tests.

use std::collections::HashMap;

use crate::error::{Result, SpoolError};
use crate::table::{
    ColumnDesc, ContigSet, GenomicRangeQuery, MappingsTable, QueryMode, Row, RowStream,
    TableDescription, TableDetails, Value,
};

/// A mappings table held entirely in memory. Rows are kept in insertion order
/// and ids are assigned sequentially from zero.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnDesc>,
    details: TableDetails,
    contig_sets: HashMap<String, ContigSet>,
    rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new<S: Into<String>>(name: S, columns: Vec<ColumnDesc>) -> Self {
        Self { name: name.into(), columns, ..Self::default() }
    }

    pub fn with_details(mut self, details: TableDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_contig_set<S: Into<String>>(mut self, id: S, contigs: ContigSet) -> Self {
        self.contig_sets.insert(id.into(), contigs);
        self
    }

    /// Appends a row and returns its id. Unlisted columns are left absent.
    pub fn push_row<I, S>(&mut self, values: I) -> u64
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let id = self.rows.len() as u64;
        let values = values.into_iter().map(|(name, value)| (name.into(), value)).collect();
        self.rows.push(Row::new(id, values));
        id
    }

    fn matches(row: &Row, query: &GenomicRangeQuery) -> bool {
        let chr = row.values.get("chr").and_then(Value::as_str);
        let lo = row.values.get("lo").and_then(Value::as_i64);
        let hi = row.values.get("hi").and_then(Value::as_i64);
        match (chr, lo, hi) {
            (Some(chr), Some(lo), Some(hi)) if chr == query.chr => match query.mode {
                QueryMode::Overlap => lo < query.hi && query.lo < hi,
                QueryMode::Enclose => query.lo <= lo && hi <= query.hi,
            },
            _ => false,
        }
    }
}

impl MappingsTable for MemoryTable {
    fn describe(&self) -> Result<TableDescription> {
        Ok(TableDescription {
            name: self.name.clone(),
            length: self.rows.len() as u64,
            columns: self.columns.clone(),
        })
    }

    fn details(&self) -> Result<TableDetails> {
        Ok(self.details.clone())
    }

    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns.iter().map(|column| column.name.clone()).collect())
    }

    fn iterate_rows(&self, start: u64, end: Option<u64>) -> Result<RowStream<'_>> {
        let len = self.rows.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = end.map_or(len, |end| usize::try_from(end).unwrap_or(len).min(len));
        let slice = if start >= end { &self.rows[0..0] } else { &self.rows[start..end] };
        Ok(Box::new(slice.iter().cloned().map(Ok)))
    }

    fn genomic_range_query(
        &self,
        chr: &str,
        lo: i64,
        hi: i64,
        mode: QueryMode,
        index: &str,
    ) -> Result<GenomicRangeQuery> {
        Ok(GenomicRangeQuery { chr: chr.to_string(), lo, hi, mode, index: index.to_string() })
    }

    fn iterate_query_rows(&self, query: &GenomicRangeQuery) -> Result<RowStream<'_>> {
        let query = query.clone();
        Ok(Box::new(
            self.rows.iter().filter(move |row| Self::matches(row, &query)).cloned().map(Ok),
        ))
    }

    fn contig_set(&self, id: &str) -> Result<ContigSet> {
        self.contig_sets.get(id).cloned().ok_or_else(|| SpoolError::ReferenceInaccessible {
            id: id.to_string(),
            reason: "no such contig set".to_string(),
        })
    }
}
