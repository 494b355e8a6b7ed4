use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;

use crate::error::{IngestError, Result};
use crate::types::{ColumnList, Row};

/// Writes rows of a fixed width; fields are quoted only when they need it
pub struct CsvEncoder<W: Write> {
    writer: csv::Writer<W>,
    width: usize,
    rows_written: u64,
}

impl<W: Write> CsvEncoder<W> {
    pub fn new(sink: W, columns: &ColumnList, delimiter: u8) -> Self {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::CRLF)
            .from_writer(sink);
        Self {
            writer,
            width: columns.len(),
            rows_written: 0,
        }
    }

    pub fn write_header(&mut self, columns: &ColumnList) -> Result<()> {
        self.writer.write_record(columns.iter())?;
        Ok(())
    }

    pub fn write_row(&mut self, row: &[String]) -> Result<()> {
        if row.len() != self.width {
            return Err(IngestError::codec(format!(
                "row has {} cells but {} columns were requested",
                row.len(),
                self.width
            )));
        }
        self.writer.write_record(row)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Data rows written so far, header excluded
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| IngestError::Io(e.into_error()))
    }
}

/// Encode rows into an in-memory CSV buffer
pub fn encode_rows(
    columns: &ColumnList,
    rows: &[Row],
    include_header: bool,
    delimiter: u8,
) -> Result<Vec<u8>> {
    let mut encoder = CsvEncoder::new(Vec::new(), columns, delimiter);
    if include_header {
        encoder.write_header(columns)?;
    }
    for row in rows {
        encoder.write_row(row)?;
    }
    encoder.finish()
}
