use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// Entity identifier as it appears in the source table (e.g. "CH.LAE.03.1.1.1").
pub type EntityId = String;

/// One daily value of one entity. The entity is the key of the owning series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Per-entity daily series, in the order entities were first seen.
pub type SeriesByEntity = IndexMap<EntityId, Vec<Observation>>;

/// A raw, possibly sub-daily reading before cleaning. `value` is `None` for
/// missing measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub entity_id: EntityId,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// Check that a series is strictly increasing in date and carries only
/// finite values.
pub fn validate_series(series: &[Observation]) -> Result<(), SeriesError> {
    for (index, obs) in series.iter().enumerate() {
        if !obs.value.is_finite() {
            return Err(SeriesError::NonFiniteValue {
                index,
                value: obs.value,
            });
        }
        if index > 0 {
            let previous = series[index - 1].date;
            if obs.date <= previous {
                return Err(SeriesError::NonIncreasingDate {
                    index,
                    previous,
                    date: obs.date,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn valid_series_passes() {
        let series = vec![Observation::new(day(1), 1.0), Observation::new(day(3), 0.5)];
        assert!(validate_series(&series).is_ok());
        assert!(validate_series(&[]).is_ok());
    }

    #[test]
    fn duplicate_date_rejected() {
        let series = vec![Observation::new(day(2), 1.0), Observation::new(day(2), 0.5)];
        assert_eq!(
            validate_series(&series),
            Err(SeriesError::NonIncreasingDate {
                index: 1,
                previous: day(2),
                date: day(2),
            })
        );
    }

    #[test]
    fn nan_rejected() {
        let series = vec![Observation::new(day(1), 1.0), Observation::new(day(2), f64::NAN)];
        assert!(matches!(
            validate_series(&series),
            Err(SeriesError::NonFiniteValue { index: 1, .. })
        ));
    }
}
