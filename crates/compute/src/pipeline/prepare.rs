//! Daily series preparation from raw readings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::debug;

use dendro_core::{EntityId, Observation, Reading, SeriesByEntity};

/// Counts from one preparation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub readings_total: usize,
    /// Null or non-finite values.
    pub readings_dropped: usize,
    pub entities: usize,
    pub days: usize,
}

/// Group readings by entity, drop missing values and average each entity's
/// readings per calendar day.
///
/// Entities keep the order of their first valid reading; each series is
/// sorted by date, so the result always passes `validate_series`.
pub fn prepare_series(readings: &[Reading]) -> (SeriesByEntity, PrepareStats) {
    let mut daily: IndexMap<EntityId, BTreeMap<NaiveDate, (f64, u32)>> = IndexMap::new();
    let mut stats = PrepareStats {
        readings_total: readings.len(),
        ..Default::default()
    };

    for reading in readings {
        let value = match reading.value {
            Some(v) if v.is_finite() => v,
            _ => {
                stats.readings_dropped += 1;
                continue;
            }
        };
        let day = daily
            .entry(reading.entity_id.clone())
            .or_default()
            .entry(reading.timestamp.date())
            .or_insert((0.0, 0));
        day.0 += value;
        day.1 += 1;
    }

    let series: SeriesByEntity = daily
        .into_iter()
        .map(|(entity, days)| {
            let observations: Vec<Observation> = days
                .into_iter()
                .map(|(date, (sum, count))| Observation::new(date, sum / count as f64))
                .collect();
            (entity, observations)
        })
        .collect();

    stats.entities = series.len();
    stats.days = series.values().map(Vec::len).sum();

    debug!(
        readings = stats.readings_total,
        dropped = stats.readings_dropped,
        entities = stats.entities,
        days = stats.days,
        "series prepared"
    );

    (series, stats)
}
