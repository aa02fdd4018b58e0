use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DendroError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("{0}")]
    Other(String),
}

/// Out-of-range or unreadable scan configuration. Always fatal for a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("drop_threshold_pct must be in (0, 100], got {0}")]
    DropThresholdOutOfRange(f64),

    #[error("rebound_tolerance_days must be >= 0, got {0}")]
    NegativeReboundTolerance(i64),

    #[error("min_event_duration must be >= 1, got {0}")]
    MinDurationTooSmall(i64),

    #[error("max_event_span_days ({max_span}) must be >= min_event_duration ({min_duration})")]
    SpanShorterThanDuration { max_span: i64, min_duration: i64 },

    #[error("environment variable {key} has unparseable value {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("unsupported config kind {0:?}, expected \"ShrinkConfig\"")]
    UnsupportedKind(String),

    #[error("config document declares no passes")]
    NoPasses,

    #[error("invalid pass {index}: {source}")]
    InvalidPass {
        index: usize,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },
}

/// Why an entity's series was rejected before scanning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("date {date} at index {index} does not follow {previous}")]
    NonIncreasingDate {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("non-finite value {value} at index {index}")]
    NonFiniteValue { index: usize, value: f64 },
}
