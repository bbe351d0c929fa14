//! The HTTP-backed [`MappingsTable`] implementation.
//!
//! Talks to a JSON API: `POST {base}/{record}/{verb}` where the verbs are
//! `describe`, `details`, `rows`, and `query`. Row cells arrive positionally
//! (`[id, v1, v2, ...]`) and are zipped against the table's described column
//! order; `rows` pages by start offset, `query` pages by server cursor.

use anyhow::Context;
use log::debug;
use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use spool::{
    table::{
        ColumnDesc, ContigSet, GenomicRangeQuery, MappingsTable, QueryMode, Row, RowStream,
        TableDescription, TableDetails, Value,
    },
    Result, SpoolError,
};
use std::{cell::RefCell, collections::HashMap, env, time::Duration, vec};

/// The environment variable holding the API base URL.
pub const API_URL_ENV: &str = "SPOOL_API_URL";

/// The environment variable holding the optional bearer token.
pub const API_TOKEN_ENV: &str = "SPOOL_API_TOKEN";

/// Rows fetched per request.
const PAGE_SIZE: u64 = 10_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A remote mappings table reached over HTTP. The table description is
/// fetched once and reused for every positional-row zip.
pub struct ApiTable {
    client: Client,
    base_url: String,
    token: Option<String>,
    id: String,
    description: RefCell<Option<TableDescription>>,
}

impl ApiTable {
    /// Builds a client for `id` from `SPOOL_API_URL` and `SPOOL_API_TOKEN`.
    pub fn from_env(id: &str) -> anyhow::Result<Self> {
        let base_url = env::var(API_URL_ENV)
            .with_context(|| format!("{API_URL_ENV} must be set to the mappings API base URL"))?;
        let token = env::var(API_TOKEN_ENV).ok();
        Self::new(base_url, token, id)
    }

    pub fn new<S: Into<String>>(
        base_url: S,
        token: Option<String>,
        id: &str,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token,
            id: id.to_string(),
            description: RefCell::new(None),
        })
    }

    fn endpoint(&self, record: &str, verb: &str) -> String {
        format!("{}/{record}/{verb}", self.base_url)
    }

    fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        record: &str,
        verb: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(record, verb);
        debug!("POST {url}");
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|error| SpoolError::Table { reason: error.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpoolError::Table {
                reason: format!("{verb} on {record} returned {status}"),
            });
        }
        response.json().map_err(|error| SpoolError::Table { reason: error.to_string() })
    }

    fn cached_describe(&self) -> Result<TableDescription> {
        if let Some(description) = self.description.borrow().as_ref() {
            return Ok(description.clone());
        }
        let description: TableDescription = self.post(&self.id, "describe", &json!({}))?;
        *self.description.borrow_mut() = Some(description.clone());
        Ok(description)
    }
}

impl MappingsTable for ApiTable {
    fn describe(&self) -> Result<TableDescription> {
        self.cached_describe()
    }

    fn details(&self) -> Result<TableDetails> {
        self.post(&self.id, "details", &json!({}))
    }

    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.cached_describe()?.columns.iter().map(|column| column.name.clone()).collect())
    }

    fn iterate_rows(&self, start: u64, end: Option<u64>) -> Result<RowStream<'_>> {
        let columns = self.cached_describe()?.columns;
        Ok(Box::new(TableRows {
            table: self,
            columns,
            next: start,
            end,
            page: Vec::new().into_iter(),
            exhausted: false,
            failed: false,
        }))
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
        let columns = self.cached_describe()?.columns;
        Ok(Box::new(QueryRows {
            table: self,
            columns,
            query: query.clone(),
            cursor: None,
            page: Vec::new().into_iter(),
            exhausted: false,
            failed: false,
        }))
    }

    fn contig_set(&self, id: &str) -> Result<ContigSet> {
        let record: ContigSetRecord =
            self.post(id, "details", &json!({})).map_err(|error| {
                SpoolError::ReferenceInaccessible { id: id.to_string(), reason: error.to_string() }
            })?;
        ContigSet::from_parallel(record.contigs.names, record.contigs.sizes)
    }
}

/// One page of positional rows. The cursor is only present for `query` pages
/// with more data behind them.
#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContigSetRecord {
    contigs: ContigArrays,
}

#[derive(Debug, Deserialize)]
struct ContigArrays {
    names: Vec<String>,
    sizes: Vec<u64>,
}

/// Streams `rows` pages by start offset until a short page.
struct TableRows<'a> {
    table: &'a ApiTable,
    columns: Vec<ColumnDesc>,
    next: u64,
    end: Option<u64>,
    page: vec::IntoIter<Vec<serde_json::Value>>,
    exhausted: bool,
    failed: bool,
}

impl Iterator for TableRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(cells) = self.page.next() {
                let row = to_row(&self.columns, cells);
                self.failed = row.is_err();
                return Some(row);
            }
            if self.exhausted {
                return None;
            }
            let remaining = self.end.map(|end| end.saturating_sub(self.next));
            if remaining == Some(0) {
                self.exhausted = true;
                return None;
            }
            let limit = remaining.map_or(PAGE_SIZE, |left| left.min(PAGE_SIZE));
            let body = match self.end {
                Some(end) => json!({ "start": self.next, "end": end, "limit": limit }),
                None => json!({ "start": self.next, "limit": limit }),
            };
            match self.table.post::<_, RowsResponse>(&self.table.id, "rows", &body) {
                Ok(response) => {
                    if (response.rows.len() as u64) < limit {
                        self.exhausted = true;
                    }
                    self.next += response.rows.len() as u64;
                    self.page = response.rows.into_iter();
                }
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Streams `query` pages until the server stops returning a cursor.
struct QueryRows<'a> {
    table: &'a ApiTable,
    columns: Vec<ColumnDesc>,
    query: GenomicRangeQuery,
    cursor: Option<String>,
    page: vec::IntoIter<Vec<serde_json::Value>>,
    exhausted: bool,
    failed: bool,
}

impl QueryRows<'_> {
    fn page_body(&self) -> Result<serde_json::Value> {
        let mut body = serde_json::to_value(&self.query)
            .map_err(|error| SpoolError::Table { reason: error.to_string() })?;
        body["limit"] = json!(PAGE_SIZE);
        if let Some(cursor) = &self.cursor {
            body["cursor"] = json!(cursor);
        }
        Ok(body)
    }
}

impl Iterator for QueryRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(cells) = self.page.next() {
                let row = to_row(&self.columns, cells);
                self.failed = row.is_err();
                return Some(row);
            }
            if self.exhausted {
                return None;
            }
            let body = match self.page_body() {
                Ok(body) => body,
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            };
            match self.table.post::<_, RowsResponse>(&self.table.id, "query", &body) {
                Ok(response) => {
                    self.cursor = response.cursor;
                    if self.cursor.is_none() {
                        self.exhausted = true;
                    }
                    self.page = response.rows.into_iter();
                }
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Zips one positional row (`[id, v1, v2, ...]`) against the column order.
/// Null cells are left absent so the materializer falls back to defaults.
fn to_row(columns: &[ColumnDesc], cells: Vec<serde_json::Value>) -> Result<Row> {
    let mut cells = cells.into_iter();
    let id = match cells.next().and_then(|cell| cell.as_u64()) {
        Some(id) => id,
        None => {
            return Err(SpoolError::Table { reason: "row without a numeric id".to_string() })
        }
    };
    let mut values = HashMap::new();
    for (column, cell) in columns.iter().zip(cells) {
        if let Some(value) = to_value(cell) {
            values.insert(column.name.clone(), value);
        }
    }
    Ok(Row::new(id, values))
}

fn to_value(cell: serde_json::Value) -> Option<Value> {
    match cell {
        serde_json::Value::Bool(flag) => Some(Value::Bool(flag)),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Some(Value::Int(value)),
            None => number.as_f64().map(Value::Float),
        },
        serde_json::Value::String(text) => Some(Value::Str(text)),
        _ => None,
    }
}
