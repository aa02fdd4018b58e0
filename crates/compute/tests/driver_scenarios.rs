//! End-to-end driver runs over small multi-entity datasets.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use dendro_compute::{prepare_series, run, run_passes, DetectError, EntityDriver, EventSummary};
use dendro_core::{
    EventRole, Observation, Reading, ScanConfig, ScanParams, SeriesByEntity, SeriesError,
};

fn d(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 1).unwrap() + Duration::days(offset)
}

fn series(values: &[f64]) -> Vec<Observation> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Observation::new(d(i as i64), v))
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

#[test]
fn conservative_pass_contains_sensitive_events() {
    let mut data = SeriesByEntity::new();
    data.insert(
        "T1".into(),
        series(&[100.0, 98.0, 96.0, 94.0, 95.0, 93.0, 90.0, 80.0, 70.0, 60.0, 62.0, 64.0]),
    );

    let passes = [config(30.0, 2, 30, 2), config(3.0, 0, 30, 2)];
    let report = run_passes(&data, &passes).unwrap();

    let rows: Vec<(u32, EventRole, u32, NaiveDate, NaiveDate)> = report
        .events
        .iter()
        .map(|r| (r.pass, r.role, r.group_id, r.start_date, r.end_date))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, EventRole::Outer, 0, d(0), d(9)),
            (1, EventRole::Inner, 0, d(0), d(3)),
            (1, EventRole::Inner, 0, d(4), d(9)),
        ]
    );
    assert!((report.events[1].drop_pct - 15.0).abs() < 1e-9);
    assert_eq!(report.metrics.intervals_emitted, 3);
}

#[test]
fn malformed_entity_is_skipped_with_diagnostic() {
    let mut data = SeriesByEntity::new();
    data.insert("good".into(), series(&[100.0, 90.0, 95.0, 70.0, 72.0, 80.0]));
    data.insert(
        "dup-date".into(),
        vec![Observation::new(d(0), 1.0), Observation::new(d(0), 2.0)],
    );
    data.insert(
        "nan".into(),
        vec![Observation::new(d(0), 1.0), Observation::new(d(1), f64::NAN)],
    );

    let report = run(&data, config(20.0, 1, 10, 2)).unwrap();

    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].entity_id, "good");
    assert_eq!(report.entities_skipped, 2);
    assert_eq!(report.diagnostics[0].entity_id, "dup-date");
    assert_eq!(
        report.diagnostics[0].error,
        SeriesError::NonIncreasingDate {
            index: 1,
            previous: d(0),
            date: d(0),
        }
    );
    assert!(matches!(
        report.diagnostics[1].error,
        SeriesError::NonFiniteValue { index: 1, .. }
    ));
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let mut data = SeriesByEntity::new();
    for k in 0..24 {
        let values: Vec<f64> = (0..120)
            .map(|i| {
                let t = i as f64;
                50.0 + 20.0 * (t * 0.21 + k as f64).sin() - 0.05 * t
            })
            .collect();
        data.insert(format!("E{k:02}"), series(&values));
    }

    let passes = vec![config(25.0, 2, 30, 3), config(10.0, 1, 10, 2)];
    let parallel = EntityDriver::with_passes(passes.clone())
        .unwrap()
        .run(&data)
        .unwrap();
    let sequential = EntityDriver::with_passes(passes)
        .unwrap()
        .sequential()
        .run(&data)
        .unwrap();

    assert!(!parallel.events.is_empty());
    assert_eq!(parallel.events, sequential.events);
    assert_eq!(parallel.amplitudes, sequential.amplitudes);

    // Entities appear in input order, each one's events by start date.
    let mut last_entity: Option<&str> = None;
    let mut last_start = d(-1);
    for row in &parallel.events {
        if last_entity != Some(row.entity_id.as_str()) {
            if let Some(prev) = last_entity {
                assert!(prev < row.entity_id.as_str());
            }
            last_entity = Some(row.entity_id.as_str());
            last_start = d(-1);
        }
        assert!(row.start_date >= last_start);
        last_start = row.start_date;
    }
}

#[test]
fn readings_to_summary() {
    let t0 = NaiveDateTime::parse_from_str("2023-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let daily = [100.0, 90.0, 95.0, 70.0, 72.0, 80.0];
    let mut readings = Vec::new();
    for (i, &v) in daily.iter().enumerate() {
        for hour in [0i64, 12] {
            // Half-day readings straddle the daily mean.
            let offset = if hour == 0 { -1.0 } else { 1.0 };
            readings.push(Reading {
                entity_id: "A".into(),
                timestamp: t0 + Duration::days(i as i64) + Duration::hours(hour),
                value: Some(v + offset),
            });
        }
        readings.push(Reading {
            entity_id: "flat".into(),
            timestamp: t0 + Duration::days(i as i64),
            value: Some(3.0),
        });
        readings.push(Reading {
            entity_id: "A".into(),
            timestamp: t0 + Duration::days(i as i64) + Duration::hours(18),
            value: None,
        });
    }

    let (data, stats) = prepare_series(&readings);
    assert_eq!(stats.readings_dropped, daily.len());
    assert_eq!(data["A"].len(), 6);

    let report = run(&data, config(20.0, 1, 10, 2)).unwrap();
    assert_eq!(report.entities_total, 2);
    assert_eq!(report.entities_degenerate, 1);

    let summary = EventSummary::from_rows(&report.events);
    assert_eq!(summary.total_events, 1);
    assert_eq!(summary.outer_events, 1);
    assert_eq!(summary.entities_with_events, 1);
    assert_eq!(summary.mean_n_observations, Some(4.0));
    assert_eq!(summary.max_drop_amount, Some(30.0));
}

#[test]
fn cancelled_run_returns_no_table() {
    let mut data = SeriesByEntity::new();
    for k in 0..8 {
        data.insert(format!("E{k}"), series(&[5.0, 3.0, 4.0, 1.0]));
    }

    let flag = Arc::new(AtomicBool::new(true));
    let result = EntityDriver::new(config(10.0, 1, 10, 2))
        .with_cancel_flag(flag.clone())
        .run(&data);
    assert!(matches!(result, Err(DetectError::Cancelled)));

    flag.store(false, std::sync::atomic::Ordering::Relaxed);
    let report = EntityDriver::new(config(10.0, 1, 10, 2))
        .with_cancel_flag(flag)
        .run(&data)
        .unwrap();
    assert_eq!(report.entities_total, 8);
}
