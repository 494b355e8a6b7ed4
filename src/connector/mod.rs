// Connection acquisition and the driver-facing seam used by the engines
pub mod clickhouse_http;

#[cfg(test)]
pub(crate) mod memory;


use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::error::{IngestError, Result};
use crate::sql_generator::InsertBatch;
use crate::types::{ColumnList, ConnectionProfile, Row};

pub use self::clickhouse_http::{ClickHouseConnection, ClickHouseConnector};

/// A live connection scoped to one operation
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Run a statement that returns no rows
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query and materialize the whole result
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Send every queued row of the batch in a single call
    async fn execute_batch(&self, batch: &InsertBatch) -> Result<u64>;

    async fn close(&self) -> Result<()>;
}

/// Opens connections from a profile
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Box<dyn Connection>>;
}

/// Close a connection at the end of an operation; failures are only logged
pub async fn release(connection: Box<dyn Connection>) {
    if let Err(e) = connection.close().await {
        warn!(error = %e, "failed to close connection");
    }
}

/// Fully materialized query result, addressable by position or by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Parse `JSONCompactEachRowWithNames` output: a line of names, then one array per row
    pub fn from_compact_json(bytes: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| IngestError::query(format!("result is not valid UTF-8: {}", e)))?;
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());

        let columns: Vec<String> = match lines.next() {
            Some(header) => serde_json::from_str::<Vec<Value>>(header)
                .map_err(|e| IngestError::query(format!("malformed result header: {}", e)))?
                .iter()
                .map(cell_text)
                .collect(),
            None => return Ok(Self::default()),
        };

        let mut rows = Vec::new();
        for line in lines {
            let values: Vec<Value> = serde_json::from_str(line)
                .map_err(|e| IngestError::query(format!("malformed result row: {}", e)))?;
            if values.len() != columns.len() {
                return Err(IngestError::query(format!(
                    "result row has {} values but {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            rows.push(values.iter().map(cell_text).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column by position, in row order
    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).cloned())
            .collect()
    }

    /// Position of a named column; exact match first, then ASCII case-insensitive
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// Rebuild every row in the caller's column order, looking each column up by name
    pub fn project(&self, columns: &ColumnList) -> Result<Vec<Row>> {
        let indices = columns
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    IngestError::query(format!("column '{}' not present in result", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }
}

/// Text form of one JSON cell; NULL becomes an empty cell
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
