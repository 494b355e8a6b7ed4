// Table and column discovery
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransferSettings;
use crate::connector::{release, Connection, Connector};
use crate::error::{IngestError, Result};
use crate::sql_generator::SqlGenerator;
use crate::types::{ConnectionProfile, TableRef};

/// Lists tables and describes their columns, one connection per call
pub struct SchemaInspector {
    connector: Arc<dyn Connector>,
    sql: SqlGenerator,
}

impl SchemaInspector {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_settings(connector, &TransferSettings::default())
    }

    pub fn with_settings(connector: Arc<dyn Connector>, settings: &TransferSettings) -> Self {
        Self {
            connector,
            sql: SqlGenerator::new(settings.identifier_policy),
        }
    }

    /// Names of the tables in the profile's database
    pub async fn list_tables(&self, profile: &ConnectionProfile) -> Result<Vec<String>> {
        let connection = self.connector.connect(profile).await?;
        let tables = fetch_tables(connection.as_ref(), &self.sql).await;
        release(connection).await;

        let tables = tables?;
        info!(database = %profile.database, count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Column names of a table, in table order
    pub async fn describe_table(
        &self,
        profile: &ConnectionProfile,
        table: &TableRef,
    ) -> Result<Vec<String>> {
        // Reject bad names before opening a connection
        self.sql.describe_table(table)?;

        let connection = self.connector.connect(profile).await?;
        let columns = fetch_columns(connection.as_ref(), &self.sql, table).await;
        release(connection).await;

        let columns = columns?;
        info!(table = %table, count = columns.len(), "Described table");
        Ok(columns)
    }
}

/// `SHOW TABLES` on an open connection; the first column of each row
pub async fn fetch_tables(connection: &dyn Connection, sql: &SqlGenerator) -> Result<Vec<String>> {
    let result = connection.query(&sql.show_tables()).await?;
    Ok(result.column_values(0))
}

/// `DESCRIBE TABLE` on an open connection; only the `name` component of each column
pub async fn fetch_columns(
    connection: &dyn Connection,
    sql: &SqlGenerator,
    table: &TableRef,
) -> Result<Vec<String>> {
    let result = connection.query(&sql.describe_table(table)?).await?;
    let name_index = result
        .column_index("name")
        .ok_or_else(|| IngestError::query(format!("DESCRIBE TABLE {} returned no name column", table)))?;
    let columns = result.column_values(name_index);
    debug!(table = %table, columns = ?columns, "fetched column names");
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::memory::MemoryConnector;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("localhost", 8123, "default", "default", "")
    }

    #[tokio::test]
    async fn test_list_tables() {
        let connector = MemoryConnector::new()
            .with_table("events", &["a"], vec![])
            .with_table("users", &["id"], vec![]);
        let inspector = SchemaInspector::new(Arc::new(connector.clone()));

        let tables = inspector.list_tables(&profile()).await.unwrap();
        assert_eq!(tables, vec!["events", "users"]);
        assert_eq!(connector.statements(), vec!["SHOW TABLES"]);
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn test_describe_table_keeps_creation_order() {
        let connector = MemoryConnector::new().with_table("events", &["zeta", "alpha", "mid"], vec![]);
        let inspector = SchemaInspector::new(Arc::new(connector.clone()));

        let table = TableRef::new("events").unwrap();
        let columns = inspector.describe_table(&profile(), &table).await.unwrap();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
        assert_eq!(connector.statements(), vec!["DESCRIBE TABLE events"]);
    }

    #[tokio::test]
    async fn test_describe_missing_table_is_query_error_and_releases() {
        let connector = MemoryConnector::new();
        let inspector = SchemaInspector::new(Arc::new(connector.clone()));

        let table = TableRef::new("nope").unwrap();
        let err = inspector.describe_table(&profile(), &table).await.unwrap_err();
        assert!(matches!(err, IngestError::Query { .. }));
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn test_invalid_table_name_never_connects() {
        let connector = MemoryConnector::new();
        let inspector = SchemaInspector::new(Arc::new(connector.clone()));

        let table = TableRef::new("events; DROP TABLE x").unwrap();
        let err = inspector.describe_table(&profile(), &table).await.unwrap_err();
        assert!(matches!(err, IngestError::Config { .. }));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_propagates() {
        let connector = MemoryConnector::new().failing_connect();
        let inspector = SchemaInspector::new(Arc::new(connector));

        let err = inspector.list_tables(&profile()).await.unwrap_err();
        assert!(matches!(err, IngestError::Connection { .. }));
    }
}
