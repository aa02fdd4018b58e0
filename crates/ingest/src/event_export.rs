//! Export of the classified event table to Parquet and JSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::debug;

use dendro_core::{DendroError, EventRow};

/// Arrow schema of the event table, in output column order.
pub fn event_schema() -> Schema {
    Schema::new(vec![
        Field::new("entity_id", DataType::Utf8, false),
        Field::new("pass", DataType::UInt32, false),
        Field::new("group_id", DataType::UInt32, false),
        Field::new("role", DataType::Utf8, false),
        Field::new("start_date", DataType::Date32, false),
        Field::new("end_date", DataType::Date32, false),
        Field::new("start_value", DataType::Float64, false),
        Field::new("end_value", DataType::Float64, false),
        Field::new("drop_amount", DataType::Float64, false),
        Field::new("drop_pct", DataType::Float64, false),
        Field::new("n_observations", DataType::UInt32, false),
        Field::new("duration_days", DataType::Int64, false),
        Field::new("year", DataType::Int32, false),
        Field::new("start_doy", DataType::UInt32, false),
        Field::new("end_doy", DataType::UInt32, false),
    ])
}

/// Convert event rows into a single Arrow [`RecordBatch`].
pub fn events_to_record_batch(rows: &[EventRow]) -> Result<RecordBatch, DendroError> {
    let f64_col = |f: fn(&EventRow) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(f)))
    };
    let u32_col = |f: fn(&EventRow) -> u32| -> ArrayRef {
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(f)))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.entity_id.as_str()),
        )),
        u32_col(|r| r.pass),
        u32_col(|r| r.group_id),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.role.as_str()),
        )),
        Arc::new(Date32Array::from_iter_values(
            rows.iter().map(|r| Date32Type::from_naive_date(r.start_date)),
        )),
        Arc::new(Date32Array::from_iter_values(
            rows.iter().map(|r| Date32Type::from_naive_date(r.end_date)),
        )),
        f64_col(|r| r.start_value),
        f64_col(|r| r.end_value),
        f64_col(|r| r.drop_amount),
        f64_col(|r| r.drop_pct),
        u32_col(|r| r.n_observations),
        Arc::new(Int64Array::from_iter_values(
            rows.iter().map(|r| r.duration_days),
        )),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
        u32_col(|r| r.start_doy),
        u32_col(|r| r.end_doy),
    ];

    RecordBatch::try_new(Arc::new(event_schema()), columns)
        .map_err(|e| DendroError::Arrow(e.to_string()))
}

/// Write event rows to a Zstd-compressed Parquet file. Returns the row count.
pub fn write_events_parquet(rows: &[EventRow], path: &Path) -> Result<u64, DendroError> {
    let batch = events_to_record_batch(rows)?;
    let row_count = batch.num_rows() as u64;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            "dendro.table".to_string(),
            Some("shrink_events".to_string()),
        )]))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| DendroError::Parquet(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| DendroError::Parquet(e.to_string()))?;
    writer
        .close()
        .map_err(|e| DendroError::Parquet(e.to_string()))?;

    debug!(path = %path.display(), rows = row_count, "wrote event parquet");
    Ok(row_count)
}

/// Write event rows as a pretty-printed JSON array. Returns the row count.
pub fn write_events_json(rows: &[EventRow], path: &Path) -> Result<u64, DendroError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, rows)
        .map_err(|e| DendroError::Serialize(e.to_string()))?;

    debug!(path = %path.display(), rows = rows.len(), "wrote event json");
    Ok(rows.len() as u64)
}
