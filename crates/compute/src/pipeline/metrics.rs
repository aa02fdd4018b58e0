use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Detection run metrics, updated once per run by the entity driver.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionMetrics {
    /// When the last run completed.
    pub last_run: Option<DateTime<Utc>>,
    /// Duration of the last run in milliseconds.
    pub duration_ms: u64,
    /// Entity throughput of the last run.
    pub entities_per_second: f64,
    /// Average time spent per entity in microseconds.
    pub avg_entity_latency_us: f64,
    /// Daily observations scanned in the last run, summed over passes.
    pub observations_scanned: u64,
    /// Raw intervals emitted by the scanner before classification.
    pub intervals_emitted: u64,

    // Totals across runs.
    #[serde(skip)]
    entity_count: u64,
    #[serde(skip)]
    total_latency_us: f64,
}

impl DetectionMetrics {
    /// Record a completed run over `entities` entities.
    pub fn record_run(
        &mut self,
        entities: u64,
        observations_scanned: u64,
        intervals_emitted: u64,
        elapsed: Duration,
    ) {
        let elapsed_us = elapsed.as_micros() as f64;
        let elapsed_secs = elapsed.as_secs_f64();

        self.last_run = Some(Utc::now());
        self.duration_ms = elapsed.as_millis() as u64;
        self.observations_scanned = observations_scanned;
        self.intervals_emitted = intervals_emitted;

        self.entity_count += entities;
        self.total_latency_us += elapsed_us;

        if elapsed_secs > 0.0 {
            self.entities_per_second = entities as f64 / elapsed_secs;
        }
        if self.entity_count > 0 {
            self.avg_entity_latency_us = self.total_latency_us / self.entity_count as f64;
        }
    }

    /// Start a scoped timer for one run.
    pub fn run_timer(&self) -> RunTimer {
        RunTimer {
            start: Instant::now(),
        }
    }
}

/// A scoped timer for a detection run.
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Finalize the timer and record metrics.
    pub fn finish(
        self,
        metrics: &mut DetectionMetrics,
        entities: u64,
        observations_scanned: u64,
        intervals_emitted: u64,
    ) {
        metrics.record_run(
            entities,
            observations_scanned,
            intervals_emitted,
            self.start.elapsed(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_metrics() {
        let mut m = DetectionMetrics::default();
        m.record_run(200, 73_000, 41, Duration::from_millis(50));

        assert!(m.last_run.is_some());
        assert_eq!(m.duration_ms, 50);
        assert!(m.entities_per_second > 0.0);
        assert!(m.avg_entity_latency_us > 0.0);
        assert_eq!(m.observations_scanned, 73_000);
        assert_eq!(m.intervals_emitted, 41);
    }

    #[test]
    fn zero_entities_keeps_averages_at_zero() {
        let mut m = DetectionMetrics::default();
        m.record_run(0, 0, 0, Duration::ZERO);

        assert_eq!(m.entities_per_second, 0.0);
        assert_eq!(m.avg_entity_latency_us, 0.0);
    }

    #[test]
    fn timer_records_on_finish() {
        let mut m = DetectionMetrics::default();
        let timer = m.run_timer();
        timer.finish(&mut m, 3, 30, 2);

        assert!(m.last_run.is_some());
        assert_eq!(m.intervals_emitted, 2);
    }
}
