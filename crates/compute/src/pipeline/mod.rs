//! Entity driver.
//!
//! Runs amplitude estimation, event scanning and containment classification
//! for every entity of a prepared dataset:
//!
//! - **Validate**: malformed series are skipped with a diagnostic.
//! - **Scan**: one pass per configured [`ScanConfig`], intervals tagged with
//!   the pass index.
//! - **Classify**: the union of all passes, per entity.
//!
//! Entities share no state, so they run on the rayon pool and are collected
//! in input order.

pub mod metrics;
pub mod prepare;
pub mod summary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use dendro_core::{
    validate_series, AmplitudeRecord, ConfigError, EntityId, EventRow, Observation, RawInterval,
    ScanConfig, SeriesByEntity, SeriesError,
};

use crate::algorithms::amplitude::series_amplitude;
use crate::algorithms::hierarchy::classify_tagged;
use crate::algorithms::scanner::EventScanner;

use self::metrics::DetectionMetrics;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("detection run cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An entity that was skipped because its series failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDiagnostic {
    pub entity_id: EntityId,
    pub error: SeriesError,
}

/// Everything one detection run produced.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Classified events, grouped by entity in input order, each entity's
    /// events ascending by start date.
    pub events: Vec<EventRow>,
    /// Amplitude of every validated entity, degenerate ones included.
    pub amplitudes: Vec<AmplitudeRecord>,
    pub diagnostics: Vec<SeriesDiagnostic>,
    pub entities_total: usize,
    pub entities_with_events: usize,
    /// Malformed series.
    pub entities_skipped: usize,
    /// Fewer than two observations or zero amplitude.
    pub entities_degenerate: usize,
    pub metrics: DetectionMetrics,
}

enum EntityOutcome {
    Scanned {
        amplitude: AmplitudeRecord,
        events: Vec<EventRow>,
        intervals: usize,
        observations: usize,
    },
    Degenerate(AmplitudeRecord),
    Malformed(SeriesDiagnostic),
}

/// Applies one or more scan passes to every entity independently.
#[derive(Debug, Clone)]
pub struct EntityDriver {
    scanners: Vec<EventScanner>,
    parallel: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl EntityDriver {
    /// Single-pass driver.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            scanners: vec![EventScanner::new(config)],
            parallel: true,
            cancel: None,
        }
    }

    /// Multi-pass driver; pass `i` tags its events with `pass = i`.
    pub fn with_passes(passes: Vec<ScanConfig>) -> Result<Self, DetectError> {
        if passes.is_empty() {
            return Err(ConfigError::NoPasses.into());
        }
        Ok(Self {
            scanners: passes.into_iter().map(EventScanner::new).collect(),
            parallel: true,
            cancel: None,
        })
    }

    /// Process entities one after another on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Abort the run once `flag` is set. Checked before each entity; an
    /// entity already being scanned runs to completion.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn pass_count(&self) -> usize {
        self.scanners.len()
    }

    pub fn run(&self, series: &SeriesByEntity) -> Result<DetectionReport, DetectError> {
        let mut report = DetectionReport {
            entities_total: series.len(),
            ..Default::default()
        };
        let timer = report.metrics.run_timer();

        let entries: Vec<(&EntityId, &Vec<Observation>)> = series.iter().collect();
        let outcomes: Vec<EntityOutcome> = if self.parallel {
            entries
                .par_iter()
                .map(|(id, obs)| self.process(id, obs))
                .collect::<Result<Vec<_>, DetectError>>()?
        } else {
            entries
                .iter()
                .map(|(id, obs)| self.process(id, obs))
                .collect::<Result<Vec<_>, DetectError>>()?
        };

        let mut observations_scanned = 0u64;
        let mut intervals_emitted = 0u64;
        for outcome in outcomes {
            match outcome {
                EntityOutcome::Scanned {
                    amplitude,
                    events,
                    intervals,
                    observations,
                } => {
                    observations_scanned += observations as u64;
                    intervals_emitted += intervals as u64;
                    if !events.is_empty() {
                        report.entities_with_events += 1;
                    }
                    report.amplitudes.push(amplitude);
                    report.events.extend(events);
                }
                EntityOutcome::Degenerate(amplitude) => {
                    report.entities_degenerate += 1;
                    report.amplitudes.push(amplitude);
                }
                EntityOutcome::Malformed(diagnostic) => {
                    report.entities_skipped += 1;
                    report.diagnostics.push(diagnostic);
                }
            }
        }

        timer.finish(
            &mut report.metrics,
            report.entities_total as u64,
            observations_scanned,
            intervals_emitted,
        );

        info!(
            entities = report.entities_total,
            with_events = report.entities_with_events,
            skipped = report.entities_skipped,
            degenerate = report.entities_degenerate,
            events = report.events.len(),
            passes = self.scanners.len(),
            elapsed_ms = report.metrics.duration_ms,
            "detection run completed"
        );

        Ok(report)
    }

    fn process(&self, entity_id: &str, series: &[Observation]) -> Result<EntityOutcome, DetectError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(DetectError::Cancelled);
            }
        }

        if let Err(error) = validate_series(series) {
            debug!(entity = entity_id, %error, "malformed series skipped");
            return Ok(EntityOutcome::Malformed(SeriesDiagnostic {
                entity_id: entity_id.to_string(),
                error,
            }));
        }

        let amplitude = series_amplitude(series);
        let record = AmplitudeRecord {
            entity_id: entity_id.to_string(),
            amplitude,
        };
        if series.len() < 2 || amplitude <= 0.0 {
            debug!(
                entity = entity_id,
                observations = series.len(),
                amplitude,
                "degenerate series, no events"
            );
            return Ok(EntityOutcome::Degenerate(record));
        }

        let tagged: Vec<(u32, RawInterval)> = self
            .scanners
            .iter()
            .enumerate()
            .flat_map(|(pass, scanner)| {
                scanner
                    .scan(entity_id, series, amplitude)
                    .into_iter()
                    .map(move |iv| (pass as u32, iv))
            })
            .collect();
        let intervals = tagged.len();

        let events: Vec<EventRow> = classify_tagged(tagged)
            .iter()
            .map(|event| EventRow::new(event, amplitude))
            .collect();

        debug!(
            entity = entity_id,
            observations = series.len(),
            amplitude,
            events = events.len(),
            "entity processed"
        );

        Ok(EntityOutcome::Scanned {
            amplitude: record,
            events,
            intervals,
            observations: series.len() * self.scanners.len(),
        })
    }
}

/// Run a single configuration over every entity.
pub fn run(series: &SeriesByEntity, config: ScanConfig) -> Result<DetectionReport, DetectError> {
    EntityDriver::new(config).run(series)
}

/// Run several configurations and classify their union per entity.
pub fn run_passes(
    series: &SeriesByEntity,
    passes: &[ScanConfig],
) -> Result<DetectionReport, DetectError> {
    EntityDriver::with_passes(passes.to_vec())?.run(series)
}
