use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{IngestError, Result};

/// Default ClickHouse HTTP interface port
pub const DEFAULT_PORT: u16 = 8123;

/// Wire name of the file to store direction
pub const FILE_TO_STORE: &str = "flatfile-to-clickhouse";

/// Wire name of the store to file direction
pub const STORE_TO_FILE: &str = "clickhouse-to-flatfile";

/// Everything needed to open one transient database connection.
///
/// Profiles are built per operation and never stored; the credential is
/// redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    /// Password or token, sent as the HTTP password
    #[serde(default, alias = "jwt", alias = "password")]
    pub credential: String,
    /// Use https instead of http
    #[serde(default)]
    pub secure: bool,
}

impl ConnectionProfile {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            credential: credential.into(),
            secure: false,
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn protocol(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Server address without database or options, as the HTTP client expects it
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol(), self.host, self.port)
    }

    /// Full connection target: `<protocol>://<host>:<port>/<database>?compress=0`
    pub fn target(&self) -> String {
        format!("{}/{}?compress=0", self.base_url(), self.database)
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("credential", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Ports arrive as numbers from the CLI and as strings from form-built requests
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

/// Which side is the source and which the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    FileToStore,
    StoreToFile,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::FileToStore => FILE_TO_STORE,
            TransferDirection::StoreToFile => STORE_TO_FILE,
        }
    }
}

impl FromStr for TransferDirection {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if value.eq_ignore_ascii_case(FILE_TO_STORE) {
            Ok(TransferDirection::FileToStore)
        } else if value.eq_ignore_ascii_case(STORE_TO_FILE) {
            Ok(TransferDirection::StoreToFile)
        } else {
            Err(IngestError::invalid_direction(s))
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-ordered, non-empty list of column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnList(Vec<String>);

impl ColumnList {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(IngestError::config("at least one column is required"));
        }
        if let Some(blank) = columns.iter().position(|c| c.trim().is_empty()) {
            return Err(IngestError::config(format!("column {} has an empty name", blank + 1)));
        }
        Ok(Self(columns))
    }

    /// Parse a comma separated list such as `a, b,c`
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Columns joined the way generated SQL lists them
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

impl<'a> IntoIterator for &'a ColumnList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Table identifier embedded into generated SQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRef(String);

impl TableRef {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(IngestError::config("table name is required"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat file settings for both directions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlatFileSpec {
    pub output_filename: Option<String>,
    pub delimiter: Option<String>,
    /// Write a header line on export
    pub include_header: bool,
    /// Whether an input file starts with a header line
    pub has_header: bool,
}

impl FlatFileSpec {
    pub const DEFAULT_FILENAME: &'static str = "export.csv";

    pub fn delimiter_byte(&self) -> Result<u8> {
        parse_delimiter(self.delimiter.as_deref())
    }

    pub fn output_filename(&self) -> &str {
        self.output_filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(Self::DEFAULT_FILENAME)
    }
}

/// Resolve a delimiter setting to a single byte; empty means comma
pub fn parse_delimiter(delimiter: Option<&str>) -> Result<u8> {
    let value = match delimiter {
        None | Some("") => return Ok(b','),
        Some(value) => value,
    };

    match value {
        "\\t" | "\t" => return Ok(b'\t'),
        v if v.eq_ignore_ascii_case("tab") => return Ok(b'\t'),
        _ => {}
    }

    let bytes = value.as_bytes();
    if bytes.len() == 1 && bytes[0].is_ascii() && !matches!(bytes[0], b'"' | b'\n' | b'\r') {
        Ok(bytes[0])
    } else {
        Err(IngestError::config(format!(
            "delimiter must be a single ASCII character, got '{}'",
            value
        )))
    }
}

/// One row of text cells in ColumnList order
pub type Row = Vec<String>;

/// Terminal result of one ingest call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub success: bool,
    pub message: String,
    pub record_count: u64,
}

impl TransferOutcome {
    pub fn success(message: impl Into<String>, record_count: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            record_count,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            record_count: 0,
        }
    }
}

/// In-memory CSV produced by an export
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub row_count: u64,
}

/// Transfer request, in the camelCase JSON shape a web front end posts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    pub direction: String,
    pub clickhouse_config: ConnectionProfile,
    #[serde(default)]
    pub flat_file_config: FlatFileSpec,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub source_table: Option<String>,
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub create_table: bool,
    /// Accepted for compatibility; joins are not supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_config: Option<serde_json::Value>,
}

impl IngestionRequest {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn direction(&self) -> Result<TransferDirection> {
        self.direction.parse()
    }

    pub fn column_list(&self) -> Result<ColumnList> {
        ColumnList::new(self.columns.iter().cloned())
    }

    pub fn source(&self) -> Result<TableRef> {
        TableRef::new(self.source_table.clone().unwrap_or_default())
            .map_err(|_| IngestError::config("source table is required"))
    }

    pub fn target(&self) -> Result<TableRef> {
        TableRef::new(self.target_table.clone().unwrap_or_default())
            .map_err(|_| IngestError::config("target table is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_parsing_is_case_insensitive() {
        assert_eq!(
            "FlatFile-To-ClickHouse".parse::<TransferDirection>().unwrap(),
            TransferDirection::FileToStore
        );
        assert_eq!(
            "clickhouse-to-flatfile".parse::<TransferDirection>().unwrap(),
            TransferDirection::StoreToFile
        );
        assert!(matches!(
            "sideways".parse::<TransferDirection>(),
            Err(IngestError::InvalidDirection { .. })
        ));
    }

    #[test]
    fn test_column_list_rejects_empty() {
        assert!(ColumnList::new(Vec::<String>::new()).is_err());
        assert!(ColumnList::parse(" , ").is_err());
        assert!(ColumnList::new(vec!["a", " "]).is_err());

        let columns = ColumnList::parse("a, b,c").unwrap();
        assert_eq!(columns.as_slice(), &["a", "b", "c"]);
        assert_eq!(columns.joined(), "a, b, c");
    }

    #[test]
    fn test_profile_target_and_redaction() {
        let profile = ConnectionProfile::new("ch.local", 8123, "analytics", "reader", "s3cret");
        assert_eq!(profile.target(), "http://ch.local:8123/analytics?compress=0");
        assert_eq!(profile.clone().with_secure(true).base_url(), "https://ch.local:8123");

        let debug = format!("{:?}", profile);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_delimiter_parsing() {
        assert_eq!(parse_delimiter(None).unwrap(), b',');
        assert_eq!(parse_delimiter(Some("")).unwrap(), b',');
        assert_eq!(parse_delimiter(Some(";")).unwrap(), b';');
        assert_eq!(parse_delimiter(Some("\\t")).unwrap(), b'\t');
        assert_eq!(parse_delimiter(Some("TAB")).unwrap(), b'\t');
        assert!(parse_delimiter(Some(";;")).is_err());
        assert!(parse_delimiter(Some("\"")).is_err());
    }

    #[test]
    fn test_request_from_front_end_json() {
        let request: IngestionRequest = serde_json::from_value(json!({
            "direction": "flatfile-to-clickhouse",
            "clickhouseConfig": {
                "host": "localhost",
                "port": "8123",
                "database": "default",
                "user": "default",
                "jwt": "token"
            },
            "flatFileConfig": { "delimiter": ",", "hasHeader": true },
            "columns": ["a", "b"],
            "targetTable": "events",
            "createTable": true,
            "joinConfig": { "enabled": false, "tables": [], "condition": "" }
        }))
        .unwrap();

        assert_eq!(request.direction().unwrap(), TransferDirection::FileToStore);
        assert_eq!(request.clickhouse_config.port, 8123);
        assert_eq!(request.clickhouse_config.credential, "token");
        assert_eq!(request.target().unwrap().as_str(), "events");
        assert!(request.source().is_err());
        assert_eq!(request.flat_file_config.output_filename(), "export.csv");
    }
}
