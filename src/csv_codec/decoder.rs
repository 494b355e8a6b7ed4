use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::types::{ColumnList, Row};

/// How an input file is read
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub has_header: bool,
    pub delimiter: u8,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
        }
    }
}

/// Header names with a lookup table; the first occurrence of a duplicate name wins
#[derive(Debug)]
struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(record: &StringRecord) -> Self {
        let names: Vec<String> = record.iter().map(str::to_string).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(index);
        }
        Self { names, positions }
    }
}

/// Streaming CSV reader over any byte source
pub struct CsvDecoder<R: Read> {
    reader: csv::Reader<R>,
    headers: Option<Arc<HeaderIndex>>,
}

impl<R: Read> CsvDecoder<R> {
    /// Open a reader; with a header, the first line is consumed as column names
    pub fn new(source: R, options: DecodeOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(options.has_header)
            .delimiter(options.delimiter)
            .flexible(false)
            .from_reader(source);

        let headers = if options.has_header {
            let header = reader.headers()?;
            debug!(columns = header.len(), "read CSV header");
            Some(Arc::new(HeaderIndex::new(header)))
        } else {
            None
        };

        Ok(Self { reader, headers })
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_ref().map(|h| h.names.as_slice())
    }

    /// Lazily decode the remaining records
    pub fn records(self) -> CsvRecords<R> {
        CsvRecords {
            inner: self.reader.into_records(),
            headers: self.headers,
        }
    }
}

/// Lazy record sequence produced by [`CsvDecoder::records`]
pub struct CsvRecords<R: Read> {
    inner: StringRecordsIntoIter<R>,
    headers: Option<Arc<HeaderIndex>>,
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<CsvRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.inner.next()?;
        Some(record.map_err(IngestError::from).map(|fields| CsvRecord {
            line: fields.position().map(|p| p.line()).unwrap_or(0),
            headers: self.headers.clone(),
            fields,
        }))
    }
}

/// One decoded line, addressable by header name
#[derive(Debug, Clone)]
pub struct CsvRecord {
    headers: Option<Arc<HeaderIndex>>,
    fields: StringRecord,
    line: u64,
}

impl CsvRecord {
    /// Source line number, 1-based
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        let index = *headers.positions.get(name)?;
        self.fields.get(index)
    }

    /// Cells in the caller's column order; a column the record lacks is an error
    pub fn project(&self, columns: &ColumnList) -> Result<Row> {
        columns
            .iter()
            .map(|name| {
                self.get(name).map(str::to_string).ok_or_else(|| {
                    IngestError::codec(format!(
                        "record on line {} has no column '{}'",
                        self.line, name
                    ))
                })
            })
            .collect()
    }

    /// All cells in file order
    pub fn into_row(self) -> Row {
        self.fields.iter().map(str::to_string).collect()
    }
}

/// Header names of a delimited file
pub fn read_header(bytes: &[u8], delimiter: u8) -> Result<Vec<String>> {
    let decoder = CsvDecoder::new(
        bytes,
        DecodeOptions {
            has_header: true,
            delimiter,
        },
    )?;
    match decoder.headers() {
        Some(names) if !names.is_empty() => Ok(names.to_vec()),
        _ => Err(IngestError::codec("file has no header line")),
    }
}
