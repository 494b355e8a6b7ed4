pub mod config;
pub mod connector;
pub mod csv_codec;
pub mod error;
pub mod monitoring;
pub mod preview;
pub mod schema_inspector;
pub mod sql_generator;
pub mod transfer;
pub mod types;
