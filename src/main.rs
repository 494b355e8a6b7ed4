use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use chingest::config::TransferSettings;
use chingest::connector::{ClickHouseConnector, Connector};
use chingest::csv_codec::read_header;
use chingest::preview::PreviewEngine;
use chingest::schema_inspector::SchemaInspector;
use chingest::transfer::{TransferEngine, TransferResult};
use chingest::types::{
    parse_delimiter, ColumnList, ConnectionProfile, ExportPayload, FlatFileSpec, IngestionRequest,
    TableRef, TransferOutcome, DEFAULT_PORT, FILE_TO_STORE, STORE_TO_FILE,
};

#[derive(Parser)]
#[command(name = "chingest")]
#[command(about = "Move data between CSV files and ClickHouse tables")]
#[command(version)]
#[command(long_about = "chingest loads delimited flat files into ClickHouse tables and exports ClickHouse tables to CSV. It can also list tables, describe their columns and preview table or file contents.")]
#[command(after_help = "EXAMPLES:
    # List tables in a database
    chingest tables --host localhost --database default

    # Load a CSV file, creating the table if needed
    chingest ingest --file events.csv --table events --create-table

    # Export two columns to a semicolon separated file
    chingest export --table events --columns id,kind --output events.csv --delimiter ';'

    # Run a saved transfer request
    chingest run --request transfer.json --file events.csv

Connection flags fall back to CLICKHOUSE_HOST, CLICKHOUSE_PORT, CLICKHOUSE_DATABASE,
CLICKHOUSE_USER and CLICKHOUSE_PASSWORD.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Set log level explicitly
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

/// Connection settings shared by every command that talks to ClickHouse
#[derive(Args, Debug)]
struct ConnectionArgs {
    /// ClickHouse host
    #[arg(long, env = "CLICKHOUSE_HOST", default_value = "localhost")]
    host: String,

    /// ClickHouse HTTP port
    #[arg(long, env = "CLICKHOUSE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database to operate on
    #[arg(short, long, env = "CLICKHOUSE_DATABASE", default_value = "default")]
    database: String,

    /// User name
    #[arg(short, long, env = "CLICKHOUSE_USER", default_value = "default")]
    user: String,

    /// Password or access token
    #[arg(long, env = "CLICKHOUSE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Connect over https
    #[arg(long)]
    secure: bool,

    /// Embed table and column names without validating them
    #[arg(long)]
    trust_identifiers: bool,
}

impl ConnectionArgs {
    fn profile(&self) -> ConnectionProfile {
        ConnectionProfile::new(
            self.host.clone(),
            self.port,
            self.database.clone(),
            self.user.clone(),
            self.password.clone(),
        )
        .with_secure(self.secure)
    }

    fn settings(&self) -> TransferSettings {
        if self.trust_identifiers {
            TransferSettings::default().trusted()
        } else {
            TransferSettings::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of a database
    Tables {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the columns of a table
    Columns {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Table to describe
        #[arg(short, long)]
        table: String,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the first rows of a table
    Preview {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Table to read
        #[arg(short, long)]
        table: String,

        /// Comma separated column list
        #[arg(short, long)]
        columns: String,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load a delimited file into a table
    #[command(long_about = "Load a delimited file with a header line into a ClickHouse table. Cells are matched to columns by header name and inserted as text in a single batch.")]
    Ingest {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Input file; its first line must be a header
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Target table
        #[arg(short, long)]
        table: String,

        /// Comma separated column list (default: every column in the file header)
        #[arg(short, long)]
        columns: Option<String>,

        /// Create the table with String columns if it does not exist
        #[arg(long)]
        create_table: bool,

        /// Field delimiter (default: ',')
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Write a table to a CSV file
    Export {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Source table
        #[arg(short, long)]
        table: String,

        /// Comma separated column list
        #[arg(short, long)]
        columns: String,

        /// Output file (default: export.csv)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Omit the header line
        #[arg(long)]
        no_header: bool,

        /// Field delimiter (default: ',')
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Show the header and first records of a local file
    InspectFile {
        /// File to inspect
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Field delimiter (default: ',')
        #[arg(long)]
        delimiter: Option<String>,

        /// The file has no header line
        #[arg(long)]
        no_header: bool,

        /// Number of records to show
        #[arg(long, default_value = "5")]
        rows: usize,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Execute a JSON transfer request
    #[command(long_about = "Execute a transfer request stored as JSON. The request's direction decides whether the file is ingested or the table exported.")]
    Run {
        /// Request file
        #[arg(short, long, value_name = "FILE")]
        request: PathBuf,

        /// Input file for flatfile-to-clickhouse requests
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output file for clickhouse-to-flatfile requests (default: the request's file name)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Embed table and column names without validating them
        #[arg(long)]
        trust_identifiers: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    info!("Starting chingest v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = execute_command(cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute_command(command: Commands) -> Result<()> {
    let connector: Arc<dyn Connector> = Arc::new(ClickHouseConnector::new());

    match command {
        Commands::Tables { connection, format } => {
            let inspector = SchemaInspector::with_settings(connector, &connection.settings());
            let tables = inspector.list_tables(&connection.profile()).await?;
            print_list(&tables, format)?;
        }
        Commands::Columns {
            connection,
            table,
            format,
        } => {
            let inspector = SchemaInspector::with_settings(connector, &connection.settings());
            let columns = inspector
                .describe_table(&connection.profile(), &TableRef::new(table)?)
                .await?;
            print_list(&columns, format)?;
        }
        Commands::Preview {
            connection,
            table,
            columns,
            format,
        } => {
            let engine = PreviewEngine::with_settings(connector, connection.settings());
            let rows = engine
                .preview(
                    &connection.profile(),
                    &TableRef::new(table)?,
                    &ColumnList::parse(&columns)?,
                )
                .await?;
            print_rows(&rows, format)?;
        }
        Commands::Ingest {
            connection,
            file,
            table,
            columns,
            create_table,
            delimiter,
        } => {
            let bytes = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let columns = match columns {
                Some(list) => ColumnList::parse(&list)?,
                None => ColumnList::new(read_header(&bytes, parse_delimiter(delimiter.as_deref())?)?)?,
            };
            info!(file = %file.display(), table = %table, columns = %columns.joined(), "Ingesting file");

            let request = IngestionRequest {
                direction: FILE_TO_STORE.to_string(),
                clickhouse_config: connection.profile(),
                flat_file_config: FlatFileSpec {
                    delimiter,
                    has_header: true,
                    ..FlatFileSpec::default()
                },
                columns: columns.as_slice().to_vec(),
                source_table: None,
                target_table: Some(table),
                create_table,
                join_config: None,
            };

            let engine = TransferEngine::with_settings(connector, connection.settings());
            let outcome = engine.ingest(&request, Some(&bytes)).await;
            report_outcome(&outcome)?;
        }
        Commands::Export {
            connection,
            table,
            columns,
            output,
            no_header,
            delimiter,
        } => {
            let request = IngestionRequest {
                direction: STORE_TO_FILE.to_string(),
                clickhouse_config: connection.profile(),
                flat_file_config: FlatFileSpec {
                    output_filename: output
                        .as_ref()
                        .map(|path| path.to_string_lossy().into_owned()),
                    delimiter,
                    include_header: !no_header,
                    has_header: false,
                },
                columns: ColumnList::parse(&columns)?.as_slice().to_vec(),
                source_table: Some(table),
                target_table: None,
                create_table: false,
                join_config: None,
            };

            let engine = TransferEngine::with_settings(connector, connection.settings());
            let payload = engine.export(&request).await?;
            write_payload(&payload, output.as_deref())?;
        }
        Commands::InspectFile {
            file,
            delimiter,
            no_header,
            rows,
            format,
        } => {
            let bytes = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let spec = FlatFileSpec {
                delimiter,
                has_header: !no_header,
                ..FlatFileSpec::default()
            };
            let preview = PreviewEngine::new(connector).preview_file(&bytes, &spec, Some(rows))?;
            print_rows(&preview, format)?;
        }
        Commands::Run {
            request: request_path,
            file,
            output,
            trust_identifiers,
        } => {
            let request = IngestionRequest::from_json_file(&request_path)
                .with_context(|| format!("failed to load request {}", request_path.display()))?;
            let bytes = match &file {
                Some(path) => Some(fs::read(path).with_context(|| format!("failed to read {}", path.display()))?),
                None => None,
            };

            let settings = if trust_identifiers {
                TransferSettings::default().trusted()
            } else {
                TransferSettings::default()
            };
            let engine = TransferEngine::with_settings(connector, settings);
            match engine.run(&request, bytes.as_deref()).await? {
                TransferResult::Ingested(outcome) => report_outcome(&outcome)?,
                TransferResult::Exported(payload) => write_payload(&payload, output.as_deref())?,
            }
        }
    }

    Ok(())
}

fn report_outcome(outcome: &TransferOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if !outcome.success {
        anyhow::bail!("{}", outcome.message);
    }
    Ok(())
}

fn write_payload(payload: &ExportPayload, output: Option<&Path>) -> Result<()> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&payload.filename));
    fs::write(&path, &payload.bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = payload.row_count, "Export written");
    println!("Exported {} rows to {}", payload.row_count, path.display());
    Ok(())
}

fn print_list<T: Serialize + std::fmt::Display>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

fn print_rows(rows: &[Vec<String>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            let mut widths = vec![0; width];
            for row in rows {
                for (i, cell) in row.iter().enumerate() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
            for row in rows {
                let line: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                    .collect();
                println!("{}", line.join(" | ").trim_end());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
    }
    Ok(())
}

/// Initialize logging based on CLI options; logs go to stderr so command output stays clean
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = if let Some(level) = &cli.log_level {
        level.clone().into()
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(cli.verbose)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(cli.verbose)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .init();
    }

    Ok(())
}
