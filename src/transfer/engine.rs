use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{EXPORT_REDIRECT_MESSAGE, INGEST_SUCCESS_MESSAGE};
use crate::config::TransferSettings;
use crate::connector::{release, Connection, Connector};
use crate::csv_codec::{encode_rows, CsvDecoder, DecodeOptions};
use crate::error::{IngestError, Result};
use crate::monitoring::OperationTracker;
use crate::schema_inspector::fetch_columns;
use crate::sql_generator::{InsertBatch, SqlGenerator};
use crate::types::{
    ColumnList, ExportPayload, IngestionRequest, TableRef, TransferDirection, TransferOutcome,
};

/// Result of [`TransferEngine::run`], one variant per direction
#[derive(Debug)]
pub enum TransferResult {
    Ingested(TransferOutcome),
    Exported(ExportPayload),
}

/// Everything a file load needs, resolved and validated before connecting
struct IngestPlan<'a> {
    file: &'a [u8],
    target: TableRef,
    columns: ColumnList,
    delimiter: u8,
    create_table: Option<String>,
    batch: InsertBatch,
}

/// Orchestrates both transfer directions.
///
/// Each call opens its own connection and releases it before returning,
/// whether the call succeeded or not.
pub struct TransferEngine {
    connector: Arc<dyn Connector>,
    settings: TransferSettings,
    sql: SqlGenerator,
}

impl TransferEngine {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_settings(connector, TransferSettings::default())
    }

    pub fn with_settings(connector: Arc<dyn Connector>, settings: TransferSettings) -> Self {
        let sql = SqlGenerator::new(settings.identifier_policy);
        Self {
            connector,
            settings,
            sql,
        }
    }

    /// Dispatch a request by its direction
    pub async fn run(&self, request: &IngestionRequest, file: Option<&[u8]>) -> Result<TransferResult> {
        match request.direction()? {
            TransferDirection::FileToStore => Ok(TransferResult::Ingested(self.ingest(request, file).await)),
            TransferDirection::StoreToFile => Ok(TransferResult::Exported(self.export(request).await?)),
        }
    }

    /// Load a CSV file into a table; every failure becomes a failed outcome
    pub async fn ingest(&self, request: &IngestionRequest, file: Option<&[u8]>) -> TransferOutcome {
        let direction = match request.direction() {
            Ok(direction) => direction,
            Err(e) => {
                warn!(direction = %request.direction, "Rejected ingest request");
                return TransferOutcome::failure(e.to_string());
            }
        };

        if direction == TransferDirection::StoreToFile {
            info!("Store to file requested through ingest; redirecting to export");
            return TransferOutcome::success(EXPORT_REDIRECT_MESSAGE, 0);
        }

        let mut tracker = OperationTracker::start("ingest");
        match self.ingest_file(request, file).await {
            Ok(count) => {
                tracker.update_progress(count);
                tracker.complete_success();
                TransferOutcome::success(INGEST_SUCCESS_MESSAGE, count)
            }
            Err(e) => {
                let message = format!("Ingestion failed: {}", e);
                tracker.complete_failure(&message);
                TransferOutcome::failure(message)
            }
        }
    }

    /// Run the bounded select and serialize it; no partial payload on failure
    pub async fn export(&self, request: &IngestionRequest) -> Result<ExportPayload> {
        let mut tracker = OperationTracker::start("export");
        match self.export_rows(request).await {
            Ok(payload) => {
                tracker.update_progress(payload.row_count);
                tracker.complete_success();
                Ok(payload)
            }
            Err(e) => {
                let err = match e {
                    IngestError::Export { .. } => e,
                    other => IngestError::export(other.to_string()),
                };
                tracker.complete_failure(&err.to_string());
                Err(err)
            }
        }
    }

    async fn ingest_file(&self, request: &IngestionRequest, file: Option<&[u8]>) -> Result<u64> {
        let plan = self.plan_ingest(request, file)?;

        let connection = self.connector.connect(&request.clickhouse_config).await?;
        let loaded = self.load(connection.as_ref(), plan).await;
        release(connection).await;

        loaded
    }

    fn plan_ingest<'a>(&self, request: &IngestionRequest, file: Option<&'a [u8]>) -> Result<IngestPlan<'a>> {
        let file = file.ok_or_else(|| IngestError::config("no input file supplied"))?;
        let columns = request.column_list()?;
        let target = request.target()?;
        let delimiter = request.flat_file_config.delimiter_byte()?;

        let create_table = if request.create_table {
            Some(self.sql.create_table(&target, &columns)?)
        } else {
            None
        };
        let batch = self.sql.insert(&target, &columns)?;

        if !request.flat_file_config.has_header {
            debug!("input header flag ignored; the first line of an ingested file is always its header");
        }

        Ok(IngestPlan {
            file,
            target,
            columns,
            delimiter,
            create_table,
            batch,
        })
    }

    async fn load(&self, connection: &dyn Connection, plan: IngestPlan<'_>) -> Result<u64> {
        let IngestPlan {
            file,
            target,
            columns,
            delimiter,
            create_table,
            mut batch,
        } = plan;

        let decoder = CsvDecoder::new(
            file,
            DecodeOptions {
                has_header: true,
                delimiter,
            },
        )?;

        if let Some(create_sql) = create_table {
            info!(table = %target, "Creating table if it does not exist");
            connection.execute(&create_sql).await?;
            self.require_columns(connection, &target, &columns).await?;
        }

        for record in decoder.records() {
            let record = record?;
            batch.add(record.project(&columns)?)?;
        }

        if batch.is_empty() {
            info!(table = %target, "Input file has no records; nothing to insert");
            return Ok(0);
        }

        info!(table = %target, rows = batch.len(), "Executing insert batch");
        let inserted = connection.execute_batch(&batch).await?;
        Ok(inserted)
    }

    /// A pre-existing table must hold every requested column
    async fn require_columns(
        &self,
        connection: &dyn Connection,
        table: &TableRef,
        columns: &ColumnList,
    ) -> Result<()> {
        let existing = fetch_columns(connection, &self.sql, table).await?;
        match columns.iter().find(|c| !existing.contains(c)) {
            Some(missing) => Err(IngestError::query(format!(
                "table {} has no column '{}'",
                table, missing
            ))),
            None => Ok(()),
        }
    }

    async fn export_rows(&self, request: &IngestionRequest) -> Result<ExportPayload> {
        let columns = request.column_list()?;
        let source = request.source()?;
        let delimiter = request.flat_file_config.delimiter_byte()?;
        let select = self
            .sql
            .select_bounded(&source, &columns, self.settings.export_limit)?;

        let connection = self.connector.connect(&request.clickhouse_config).await?;
        let result = connection.query(&select).await;
        release(connection).await;

        let rows = result?.project(&columns)?;
        let bytes = encode_rows(
            &columns,
            &rows,
            request.flat_file_config.include_header,
            delimiter,
        )?;

        info!(table = %source, rows = rows.len(), bytes = bytes.len(), "Exported table");
        Ok(ExportPayload {
            filename: request.flat_file_config.output_filename().to_string(),
            bytes,
            row_count: rows.len() as u64,
        })
    }
}
