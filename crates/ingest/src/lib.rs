pub mod event_export;
pub mod parquet_import;

pub use event_export::{event_schema, events_to_record_batch, write_events_json, write_events_parquet};
pub use parquet_import::{ColumnMapping, ImportStats, ReadingImporter};
