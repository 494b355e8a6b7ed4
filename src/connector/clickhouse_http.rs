//! ClickHouse connections over the HTTP interface

use async_trait::async_trait;
use clickhouse::{Client, Compression};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::debug;

use super::{Connection, Connector, ResultSet};
use crate::error::{IngestError, Result};
use crate::sql_generator::InsertBatch;
use crate::types::ConnectionProfile;

/// Result format requested for every query; keeps column order and names
const RESULT_FORMAT: &str = "JSONCompactEachRowWithNames";

/// Opens a fresh, unpooled ClickHouse client per operation
#[derive(Debug, Default, Clone, Copy)]
pub struct ClickHouseConnector;

impl ClickHouseConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for ClickHouseConnector {
    #[tracing::instrument(skip(self, profile), fields(target = %profile.target(), user = %profile.user))]
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Box<dyn Connection>> {
        debug!("connecting to ClickHouse");

        let client = Client::default()
            .with_url(profile.base_url())
            .with_user(profile.user.clone())
            .with_password(profile.credential.clone())
            .with_database(profile.database.clone())
            .with_compression(Compression::None);

        // The HTTP client is lazy; probe so bad hosts and credentials fail here
        client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map_err(|e| {
                IngestError::connection(format!(
                    "failed to connect to {}: {}",
                    profile.target(),
                    e
                ))
            })?;

        debug!("ClickHouse connection established");
        Ok(Box::new(ClickHouseConnection::new(
            client,
            profile.database.clone(),
        )))
    }
}

/// One operation's ClickHouse client
pub struct ClickHouseConnection {
    client: Client,
    database: String,
    closed: AtomicBool,
}

impl ClickHouseConnection {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::connection("connection is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for ClickHouseConnection {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        let start = Instant::now();
        debug!(sql = sql, "executing statement");

        self.client
            .query(sql)
            .execute()
            .await
            .map_err(|e| IngestError::query(format!("{} failed: {}", statement_kind(sql), e)))?;

        debug!(duration_ms = start.elapsed().as_millis() as u64, "statement completed");
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<ResultSet> {
        self.ensure_open()?;
        let start = Instant::now();
        debug!(sql = sql, "running query");

        let mut cursor = self
            .client
            .query(sql)
            .fetch_bytes(RESULT_FORMAT)
            .map_err(|e| IngestError::query(format!("{} failed: {}", statement_kind(sql), e)))?;

        let mut all_bytes = Vec::new();
        while let Some(chunk) = cursor
            .next()
            .await
            .map_err(|e| IngestError::query(format!("{} failed: {}", statement_kind(sql), e)))?
        {
            all_bytes.extend_from_slice(&chunk);
        }

        let result = ResultSet::from_compact_json(&all_bytes)?;
        debug!(
            row_count = result.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "query completed"
        );
        Ok(result)
    }

    async fn execute_batch(&self, batch: &InsertBatch) -> Result<u64> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();
        debug!(sql = batch.statement(), rows = batch.len(), "executing insert batch");

        // Every row is inlined as escaped literals; one request carries the whole batch
        let sql = batch.render();
        debug!(bytes = sql.len(), "rendered insert batch");
        self.client
            .query(&sql)
            .execute()
            .await
            .map_err(|e| IngestError::query(format!("INSERT failed: {}", e)))?;

        debug!(
            rows = batch.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "insert batch completed"
        );
        Ok(batch.len() as u64)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!(database = %self.database, "ClickHouse connection closed");
        Ok(())
    }
}

impl Drop for ClickHouseConnection {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(database = %self.database, "ClickHouse connection released on drop");
        }
    }
}

impl fmt::Debug for ClickHouseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseConnection")
            .field("database", &self.database)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Leading keyword of a statement, used to label driver errors
fn statement_kind(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("statement")
}
