//! Single-pass shrinking-event scanner for one entity's daily series.
//!
//! Two states:
//! - **Searching**: track the peak over the trailing `max_event_span_days`
//!   observations; a decline of at least the drop threshold below that peak
//!   opens an event starting at the peak.
//! - **In event**: follow the running minimum and count consecutive rises.
//!   The event closes once the rise streak exceeds the rebound tolerance, the
//!   span cap is reached, or the series ends.
//!
//! A closed candidate `[peak, minimum]` is emitted only if it meets the drop
//! threshold and the minimum duration. Either way, searching resumes at the
//! observation right after the minimum, so emitted intervals never overlap.

use std::collections::VecDeque;

use tracing::debug;

use dendro_core::{Observation, RawInterval, ScanConfig};

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Searching,
    InEvent(OpenEvent),
}

#[derive(Debug, Clone, Copy)]
struct OpenEvent {
    start_index: usize,
    min_index: usize,
    rising_streak: usize,
}

/// Sliding maximum over the last `span` observations.
///
/// Holds indices whose values are non-increasing from front to back, so the
/// front is the earliest index carrying the window maximum.
#[derive(Debug)]
struct PeakWindow {
    span: usize,
    indices: VecDeque<usize>,
}

impl PeakWindow {
    fn new(span: usize) -> Self {
        Self {
            span,
            indices: VecDeque::new(),
        }
    }

    fn reset(&mut self, index: usize) {
        self.indices.clear();
        self.indices.push_back(index);
    }

    fn push(&mut self, series: &[Observation], index: usize) {
        while let Some(&back) = self.indices.back() {
            if series[back].value < series[index].value {
                self.indices.pop_back();
            } else {
                break;
            }
        }
        self.indices.push_back(index);
    }

    /// Drop indices that can no longer start an event closing by `current`.
    fn expire(&mut self, current: usize) {
        let oldest = current.saturating_sub(self.span);
        while let Some(&front) = self.indices.front() {
            if front < oldest {
                self.indices.pop_front();
            } else {
                break;
            }
        }
    }

    fn peak(&self) -> Option<usize> {
        self.indices.front().copied()
    }
}

/// Detects shrinking events under one validated configuration.
#[derive(Debug, Clone, Copy)]
pub struct EventScanner {
    config: ScanConfig,
}

impl EventScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan one entity's chronologically ordered series.
    ///
    /// `amplitude` is the entity's full range and sets the absolute drop
    /// threshold. Returns intervals in ascending, non-overlapping order.
    pub fn scan(&self, entity_id: &str, series: &[Observation], amplitude: f64) -> Vec<RawInterval> {
        let threshold = self.config.drop_threshold(amplitude);
        let n = series.len();
        let mut events = Vec::new();

        // A zero threshold would open an event on every flat step.
        if n < 2 || !(threshold > 0.0) {
            return events;
        }

        let max_span = self.config.max_event_span_days();
        let tolerance = self.config.rebound_tolerance_days();

        let mut peaks = PeakWindow::new(max_span);
        peaks.reset(0);
        let mut state = ScanState::Searching;
        let mut i = 1;

        while i < n {
            let value = series[i].value;
            let current = state;
            match current {
                ScanState::Searching => {
                    peaks.expire(i);
                    match peaks.peak() {
                        Some(peak) if series[peak].value - value >= threshold => {
                            state = ScanState::InEvent(OpenEvent {
                                start_index: peak,
                                min_index: i,
                                rising_streak: 0,
                            });
                        }
                        _ => peaks.push(series, i),
                    }
                    i += 1;
                }
                ScanState::InEvent(mut open) => {
                    // Span cap is checked before folding `i` in, so
                    // end_index - start_index never exceeds max_span.
                    if i - open.start_index <= max_span {
                        if value > series[i - 1].value {
                            open.rising_streak += 1;
                        } else {
                            open.rising_streak = 0;
                            if value < series[open.min_index].value {
                                open.min_index = i;
                            }
                        }
                        if open.rising_streak <= tolerance {
                            state = ScanState::InEvent(open);
                            i += 1;
                            continue;
                        }
                    }

                    if let Some(interval) = self.emit(entity_id, series, &open, threshold) {
                        events.push(interval);
                    }
                    state = ScanState::Searching;

                    let resume = open.min_index + 1;
                    if resume >= n {
                        break;
                    }
                    peaks.reset(resume);
                    i = resume + 1;
                }
            }
        }

        // Series ended inside an event.
        if let ScanState::InEvent(open) = state {
            if let Some(interval) = self.emit(entity_id, series, &open, threshold) {
                events.push(interval);
            }
        }

        debug!(
            entity = entity_id,
            observations = n,
            threshold,
            events = events.len(),
            "scan complete"
        );

        events
    }

    /// Apply the emission predicate to a closed candidate.
    fn emit(
        &self,
        entity_id: &str,
        series: &[Observation],
        open: &OpenEvent,
        threshold: f64,
    ) -> Option<RawInterval> {
        let start = series[open.start_index];
        let end = series[open.min_index];
        let drop_amount = start.value - end.value;
        let duration = open.min_index - open.start_index + 1;

        if drop_amount < threshold || duration < self.config.min_event_duration() {
            return None;
        }

        Some(RawInterval {
            entity_id: entity_id.to_string(),
            start_index: open.start_index,
            end_index: open.min_index,
            start_date: start.date,
            end_date: end.date,
            start_value: start.value,
            end_value: end.value,
            drop_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::amplitude::series_amplitude;
    use chrono::{Duration, NaiveDate};
    use dendro_core::ScanParams;

    fn series(values: &[f64]) -> Vec<Observation> {
        let d0 = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(d0 + Duration::days(i as i64), v))
            .collect()
    }

    fn config(pct: f64, rebound: i64, span: i64, duration: i64) -> ScanConfig {
        ScanParams {
            drop_threshold_pct: pct,
            rebound_tolerance_days: rebound,
            max_event_span_days: span,
            min_event_duration: duration,
        }
        .validate()
        .unwrap()
    }

    fn scan(values: &[f64], cfg: ScanConfig) -> Vec<RawInterval> {
        let s = series(values);
        EventScanner::new(cfg).scan("T1", &s, series_amplitude(&s))
    }

    fn spans(events: &[RawInterval]) -> Vec<(usize, usize)> {
        events.iter().map(|e| (e.start_index, e.end_index)).collect()
    }

    #[test]
    fn peak_to_minimum_event_closes_on_rebound() {
        let events = scan(&[100.0, 90.0, 95.0, 70.0, 72.0, 80.0], config(20.0, 1, 10, 2));

        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!((e.start_index, e.end_index), (0, 3));
        assert_eq!(e.start_date, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(e.end_date, NaiveDate::from_ymd_opt(2023, 6, 4).unwrap());
        assert_eq!(e.start_value, 100.0);
        assert_eq!(e.end_value, 70.0);
        assert_eq!(e.drop_amount, 30.0);
        assert_eq!(e.entity_id, "T1");
    }

    #[test]
    fn no_event_below_threshold() {
        let events = scan(&[10.0, 9.5, 10.2, 9.8, 10.1], config(80.0, 1, 10, 2));
        assert!(events.is_empty());
    }

    #[test]
    fn constant_series_never_triggers() {
        for pct in [0.1, 50.0, 100.0] {
            assert!(scan(&[5.0; 12], config(pct, 0, 3, 1)).is_empty());
        }
    }

    #[test]
    fn short_series_yield_nothing() {
        let cfg = config(10.0, 1, 10, 1);
        assert!(scan(&[], cfg).is_empty());
        assert!(scan(&[3.0], cfg).is_empty());
    }

    #[test]
    fn explicit_zero_amplitude_is_guarded() {
        let s = series(&[10.0, 1.0, 10.0, 1.0]);
        let events = EventScanner::new(config(10.0, 1, 10, 1)).scan("T1", &s, 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn rebound_tolerance_controls_splitting() {
        let values = [100.0, 80.0, 85.0, 70.0, 90.0, 95.0];

        let tolerant = scan(&values, config(20.0, 1, 10, 2));
        assert_eq!(spans(&tolerant), vec![(0, 3)]);

        let strict = scan(&values, config(20.0, 0, 10, 2));
        assert_eq!(spans(&strict), vec![(0, 1), (2, 3)]);
        assert_eq!(strict[1].drop_amount, 15.0);
    }

    #[test]
    fn flat_step_resets_rise_streak() {
        let events = scan(&[100.0, 90.0, 92.0, 92.0, 93.0, 80.0], config(25.0, 1, 10, 2));
        assert_eq!(spans(&events), vec![(0, 5)]);
        assert_eq!(events[0].drop_amount, 20.0);
    }

    #[test]
    fn search_resumes_after_minimum() {
        let values = [100.0, 80.0, 85.0, 90.0, 95.0, 60.0, 62.0, 64.0, 66.0];
        let events = scan(&values, config(25.0, 1, 30, 2));
        assert_eq!(spans(&events), vec![(0, 1), (4, 5)]);
        assert_eq!(events[1].start_value, 95.0);
        assert_eq!(events[1].drop_amount, 35.0);
    }

    #[test]
    fn span_cap_splits_long_decline() {
        let values: Vec<f64> = (0..20).map(|k| 100.0 - k as f64).collect();
        let events = scan(&values, config(10.0, 3, 5, 2));

        assert_eq!(spans(&events), vec![(0, 5), (6, 11), (12, 17)]);
        for e in &events {
            assert_eq!(e.n_observations(), 6);
            assert_eq!(e.drop_amount, 5.0);
        }
    }

    #[test]
    fn peak_is_limited_to_span_window() {
        let events = scan(&[100.0, 100.0, 100.0, 100.0, 100.0, 50.0], config(10.0, 0, 2, 1));
        assert_eq!(spans(&events), vec![(3, 5)]);
    }

    #[test]
    fn short_candidates_are_discarded() {
        let values = [100.0, 80.0, 90.0, 95.0];
        assert!(scan(&values, config(50.0, 1, 10, 3)).is_empty());
        assert_eq!(spans(&scan(&values, config(50.0, 1, 10, 2))), vec![(0, 1)]);
    }

    #[test]
    fn open_event_closed_at_series_end() {
        let events = scan(&[10.0, 9.0, 8.0, 7.0], config(50.0, 3, 30, 2));
        assert_eq!(spans(&events), vec![(0, 3)]);
        assert_eq!(events[0].drop_amount, 3.0);
    }

    #[test]
    fn repeated_scans_are_identical() {
        let values = [5.0, 4.0, 4.5, 3.0, 3.2, 3.1, 6.0, 2.0, 2.5, 2.4, 7.0];
        let cfg = config(15.0, 1, 6, 2);
        assert_eq!(scan(&values, cfg), scan(&values, cfg));
    }
}
