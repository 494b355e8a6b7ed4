// Bounded previews of tables and local flat files
use std::sync::Arc;
use tracing::info;

use crate::config::TransferSettings;
use crate::connector::{release, Connector};
use crate::csv_codec::{CsvDecoder, DecodeOptions};
use crate::error::Result;
use crate::sql_generator::SqlGenerator;
use crate::types::{ColumnList, ConnectionProfile, FlatFileSpec, Row, TableRef};

/// Runs bounded selects for display.
///
/// Results are a header row (the requested columns, as given) followed by
/// the data rows, each cell looked up by column name.
pub struct PreviewEngine {
    connector: Arc<dyn Connector>,
    settings: TransferSettings,
    sql: SqlGenerator,
}

impl PreviewEngine {
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

    pub async fn preview(
        &self,
        profile: &ConnectionProfile,
        table: &TableRef,
        columns: &ColumnList,
    ) -> Result<Vec<Row>> {
        let select = self
            .sql
            .select_bounded(table, columns, self.settings.preview_limit)?;

        let connection = self.connector.connect(profile).await?;
        let result = connection.query(&select).await;
        release(connection).await;

        let rows = result?.project(columns)?;
        info!(table = %table, rows = rows.len(), "Previewed table");

        let mut preview = Vec::with_capacity(rows.len() + 1);
        preview.push(columns.as_slice().to_vec());
        preview.extend(rows);
        Ok(preview)
    }

    /// Head of a local file, using the configured row count when `limit` is `None`
    pub fn preview_file(&self, bytes: &[u8], spec: &FlatFileSpec, limit: Option<usize>) -> Result<Vec<Row>> {
        preview_file(bytes, spec, limit.unwrap_or(self.settings.file_preview_rows))
    }
}

/// Header plus the first `limit` records of a delimited file.
///
/// Files without a header get positional names `column_1..n`, sized by the
/// first record.
pub fn preview_file(bytes: &[u8], spec: &FlatFileSpec, limit: usize) -> Result<Vec<Row>> {
    let decoder = CsvDecoder::new(
        bytes,
        DecodeOptions {
            has_header: spec.has_header,
            delimiter: spec.delimiter_byte()?,
        },
    )?;

    let header = decoder.headers().map(|names| names.to_vec());
    let records = decoder
        .records()
        .take(limit)
        .map(|record| record.map(|r| r.into_row()))
        .collect::<Result<Vec<Row>>>()?;

    let header = match header {
        Some(names) => names,
        None => match records.first() {
            Some(first) => (1..=first.len()).map(|i| format!("column_{}", i)).collect(),
            None => return Ok(Vec::new()),
        },
    };

    let mut preview = Vec::with_capacity(records.len() + 1);
    preview.push(header);
    preview.extend(records);
    Ok(preview)
}
