// In-memory stand-in for ClickHouse used by the engine tests.
// Understands exactly the statement shapes SqlGenerator produces.
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{Connection, Connector, ResultSet};
use crate::error::{IngestError, Result};
use crate::sql_generator::InsertBatch;
use crate::types::{ConnectionProfile, Row};

#[derive(Debug, Default, Clone)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub tables: BTreeMap<String, MemoryTable>,
    pub statements: Vec<String>,
    pub connects: usize,
    pub closes: usize,
    pub fail_connect: bool,
    pub fail_batch: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<&str>>) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(str::to_string).collect())
                    .collect(),
            },
        );
        self
    }

    pub fn failing_connect(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    pub fn failing_batch(self) -> Self {
        self.state.lock().unwrap().fail_batch = true;
        self
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.state.lock().unwrap().tables.get(name).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(IngestError::connection(format!(
                "failed to connect to {}: authentication failed",
                profile.target()
            )));
        }
        state.connects += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());

        let rest = sql
            .strip_prefix("CREATE TABLE IF NOT EXISTS ")
            .ok_or_else(|| IngestError::query(format!("unsupported statement: {}", sql)))?;
        let (name, rest) = rest.split_once(" (").unwrap();
        let (definitions, _) = rest.split_once(") ENGINE").unwrap();
        let columns = definitions
            .split(", ")
            .map(|d| d.trim_end_matches(" String").to_string())
            .collect();

        state
            .tables
            .entry(name.to_string())
            .or_insert(MemoryTable { columns, rows: Vec::new() });
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());

        if sql == "SHOW TABLES" {
            let rows = state.tables.keys().map(|name| vec![name.clone()]).collect();
            return Ok(ResultSet::new(vec!["name".to_string()], rows));
        }

        if let Some(name) = sql.strip_prefix("DESCRIBE TABLE ") {
            let table = state
                .tables
                .get(name)
                .ok_or_else(|| IngestError::query(format!("Table default.{} does not exist", name)))?;
            let rows = table
                .columns
                .iter()
                .map(|c| vec![c.clone(), "String".to_string()])
                .collect();
            return Ok(ResultSet::new(vec!["name".to_string(), "type".to_string()], rows));
        }

        let rest = sql
            .strip_prefix("SELECT ")
            .ok_or_else(|| IngestError::query(format!("unsupported query: {}", sql)))?;
        let (columns, rest) = rest.split_once(" FROM ").unwrap();
        let (name, limit) = rest.split_once(" LIMIT ").unwrap();
        let limit: usize = limit.parse().unwrap();
        let table = state
            .tables
            .get(name)
            .ok_or_else(|| IngestError::query(format!("Table default.{} does not exist", name)))?;

        let selected: Vec<String> = columns.split(", ").map(str::to_string).collect();
        let mut indices = Vec::new();
        for column in &selected {
            let index = table
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| IngestError::query(format!("Unknown identifier: {}", column)))?;
            indices.push(index);
        }
        let rows = table
            .rows
            .iter()
            .take(limit)
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(ResultSet::new(selected, rows))
    }

    async fn execute_batch(&self, batch: &InsertBatch) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(batch.statement().to_string());
        if state.fail_batch {
            return Err(IngestError::query("INSERT failed: too many parts"));
        }

        let table = state
            .tables
            .get_mut(batch.table())
            .ok_or_else(|| IngestError::query(format!("Table default.{} does not exist", batch.table())))?;
        let mut positions = Vec::new();
        for column in batch.columns() {
            let index = table
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| IngestError::query(format!("No such column {}", column)))?;
            positions.push(index);
        }
        for row in batch.rows() {
            let mut stored = vec![String::new(); table.columns.len()];
            for (cell, &index) in row.iter().zip(&positions) {
                stored[index] = cell.clone();
            }
            table.rows.push(stored);
        }
        Ok(batch.len() as u64)
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
