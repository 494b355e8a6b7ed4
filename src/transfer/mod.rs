// Transfer engine: flat file to ClickHouse ingestion and ClickHouse to flat file export
pub mod engine;


pub use engine::{TransferEngine, TransferResult};

/// Message returned when a store-to-file transfer is sent to ingest
pub const EXPORT_REDIRECT_MESSAGE: &str =
    "Use export for clickhouse-to-flatfile transfers; ingest only loads files";

/// Message returned after a successful file load
pub const INGEST_SUCCESS_MESSAGE: &str = "CSV ingested successfully";
