pub mod ingest;
pub mod models;
pub mod repository;

pub use ingest::{ingest_stream_file, IngestStats};
pub use repository::Repository;
