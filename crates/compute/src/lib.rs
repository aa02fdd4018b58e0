pub mod algorithms;
pub mod pipeline;

pub use algorithms::amplitude::{amplitude, series_amplitude};
pub use algorithms::hierarchy::{classify, classify_tagged};
pub use algorithms::scanner::EventScanner;
pub use pipeline::metrics::DetectionMetrics;
pub use pipeline::prepare::{prepare_series, PrepareStats};
pub use pipeline::summary::EventSummary;
pub use pipeline::{run, run_passes, DetectError, DetectionReport, EntityDriver, SeriesDiagnostic};
