//! Reading import from tidy Parquet tables (one row per entity and timestamp).

use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::{
    date32_to_datetime, timestamp_ms_to_datetime, timestamp_ns_to_datetime,
    timestamp_s_to_datetime, timestamp_us_to_datetime,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{info, warn};

use dendro_core::{DendroError, Reading};

/// Names of the three input columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub entity: String,
    pub date: String,
    pub value: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            entity: "id".to_string(),
            date: "date".to_string(),
            value: "D_mean".to_string(),
        }
    }
}

/// Row counts from one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub rows: usize,
    /// Null or empty entity id.
    pub skipped_entity: usize,
    /// Null or unparseable date.
    pub skipped_date: usize,
}

pub struct ReadingImporter;

impl ReadingImporter {
    pub fn import(path: &Path, mapping: &ColumnMapping) -> Result<Vec<Reading>, DendroError> {
        Self::import_with_stats(path, mapping).map(|(readings, _)| readings)
    }

    /// Import readings and report how many rows were skipped. Null values are
    /// kept as `None`; the series preparer drops them.
    pub fn import_with_stats(
        path: &Path,
        mapping: &ColumnMapping,
    ) -> Result<(Vec<Reading>, ImportStats), DendroError> {
        let file = std::fs::File::open(path).map_err(DendroError::Io)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| DendroError::Parquet(e.to_string()))?;

        let reader = builder.build().map_err(|e| DendroError::Parquet(e.to_string()))?;

        let mut readings = Vec::new();
        let mut stats = ImportStats::default();

        for batch_result in reader {
            let batch = batch_result.map_err(|e| DendroError::Parquet(e.to_string()))?;
            let entities =
                cast(column(&batch, &mapping.entity)?, &DataType::Utf8).map_err(arrow_err)?;
            let entities = entities.as_string::<i32>();
            let timestamps = timestamp_column(column(&batch, &mapping.date)?, &mapping.date)?;
            let values =
                cast(column(&batch, &mapping.value)?, &DataType::Float64).map_err(arrow_err)?;
            let values = values.as_primitive::<Float64Type>();

            for row in 0..batch.num_rows() {
                stats.rows += 1;

                if entities.is_null(row) || entities.value(row).trim().is_empty() {
                    stats.skipped_entity += 1;
                    continue;
                }
                let Some(timestamp) = timestamps[row] else {
                    stats.skipped_date += 1;
                    continue;
                };
                let value = (!values.is_null(row)).then(|| values.value(row));

                readings.push(Reading {
                    entity_id: entities.value(row).trim().to_string(),
                    timestamp,
                    value,
                });
            }
        }

        if stats.skipped_entity + stats.skipped_date > 0 {
            warn!(
                path = %path.display(),
                skipped_entity = stats.skipped_entity,
                skipped_date = stats.skipped_date,
                "skipped unusable rows"
            );
        }
        info!("Imported {} readings from {}", readings.len(), path.display());
        Ok((readings, stats))
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, DendroError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DendroError::MissingColumn(name.to_string()))
}

fn arrow_err(e: arrow::error::ArrowError) -> DendroError {
    DendroError::Arrow(e.to_string())
}

/// Materialise a date-like column as naive UTC timestamps. Nulls and
/// unparseable strings become `None`.
fn timestamp_column(column: &ArrayRef, name: &str) -> Result<Vec<Option<NaiveDateTime>>, DendroError> {
    match column.data_type() {
        DataType::Date32 => {
            let days = cast(column, &DataType::Int32).map_err(arrow_err)?;
            let days = days.as_primitive::<Int32Type>();
            Ok((0..days.len())
                .map(|i| (!days.is_null(i)).then(|| date32_to_datetime(days.value(i))).flatten())
                .collect())
        }
        DataType::Date64 | DataType::Timestamp(_, _) => {
            let unit = match column.data_type() {
                DataType::Timestamp(unit, _) => *unit,
                _ => TimeUnit::Millisecond,
            };
            let raw = cast(column, &DataType::Int64).map_err(arrow_err)?;
            let raw = raw.as_primitive::<Int64Type>();
            Ok((0..raw.len())
                .map(|i| {
                    if raw.is_null(i) {
                        return None;
                    }
                    let v = raw.value(i);
                    match unit {
                        TimeUnit::Second => timestamp_s_to_datetime(v),
                        TimeUnit::Millisecond => timestamp_ms_to_datetime(v),
                        TimeUnit::Microsecond => timestamp_us_to_datetime(v),
                        TimeUnit::Nanosecond => timestamp_ns_to_datetime(v),
                    }
                })
                .collect())
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = cast(column, &DataType::Utf8).map_err(arrow_err)?;
            let text = text.as_string::<i32>();
            Ok((0..text.len())
                .map(|i| {
                    if text.is_null(i) {
                        None
                    } else {
                        parse_timestamp(text.value(i).trim())
                    }
                })
                .collect())
        }
        other => Err(DendroError::Arrow(format!(
            "column {name} has unsupported date type {other}"
        ))),
    }
}

/// Parse a date or timestamp string.
///
/// Supported formats:
/// 1. RFC 3339: `2023-06-14T10:30:00Z` (converted to UTC)
/// 2. Space-separated: `2023-06-14 10:30:00`, optionally with fractional seconds
/// 3. ISO without zone: `2023-06-14T10:30:00`
/// 4. Date only: `2023-06-14` (midnight)
pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ndt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}
