use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::observation::EntityId;

/// Range of an entity's full series; calibrates its drop threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeRecord {
    pub entity_id: EntityId,
    pub amplitude: f64,
}

/// A shrink interval as emitted by the scanner, before classification.
///
/// `start_index`/`end_index` address the entity's cleaned series: the peak
/// preceding the decline and the minimum reached during it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInterval {
    pub entity_id: EntityId,
    pub start_index: usize,
    pub end_index: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    pub drop_amount: f64,
}

impl RawInterval {
    /// Inclusive number of observations covered.
    pub fn n_observations(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// True when `other`'s date span lies within this one (inclusive).
    pub fn contains(&self, other: &RawInterval) -> bool {
        self.start_date <= other.start_date && self.end_date >= other.end_date
    }
}

/// Containment role of an event within its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    Outer,
    Inner,
}

impl EventRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRole::Outer => "outer",
            EventRole::Inner => "inner",
        }
    }
}

impl std::fmt::Display for EventRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw interval with its containment role and group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    #[serde(flatten)]
    pub interval: RawInterval,
    /// Index of the scan configuration that produced the interval.
    pub pass: u32,
    pub role: EventRole,
    pub group_id: u32,
}

/// One row of the exported event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub entity_id: EntityId,
    pub pass: u32,
    pub group_id: u32,
    pub role: EventRole,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    pub drop_amount: f64,
    /// `drop_amount` as a percentage of the entity's amplitude.
    pub drop_pct: f64,
    /// Observations between start and end, inclusive.
    pub n_observations: u32,
    /// Calendar days between start and end, inclusive.
    pub duration_days: i64,
    pub year: i32,
    pub start_doy: u32,
    pub end_doy: u32,
}

impl EventRow {
    pub fn new(event: &ClassifiedEvent, amplitude: f64) -> Self {
        let iv = &event.interval;
        let drop_pct = if amplitude > f64::EPSILON {
            iv.drop_amount / amplitude * 100.0
        } else {
            0.0
        };
        Self {
            entity_id: iv.entity_id.clone(),
            pass: event.pass,
            group_id: event.group_id,
            role: event.role,
            start_date: iv.start_date,
            end_date: iv.end_date,
            start_value: iv.start_value,
            end_value: iv.end_value,
            drop_amount: iv.drop_amount,
            drop_pct,
            n_observations: iv.n_observations() as u32,
            duration_days: (iv.end_date - iv.start_date).num_days() + 1,
            year: iv.start_date.year(),
            start_doy: iv.start_date.ordinal(),
            end_doy: iv.end_date.ordinal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: (u32, u32), end: (u32, u32)) -> RawInterval {
        RawInterval {
            entity_id: "T1".to_string(),
            start_index: 0,
            end_index: 3,
            start_date: NaiveDate::from_ymd_opt(2023, start.0, start.1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, end.0, end.1).unwrap(),
            start_value: 100.0,
            end_value: 70.0,
            drop_amount: 30.0,
        }
    }

    #[test]
    fn contains_is_inclusive() {
        let outer = interval((6, 1), (6, 10));
        assert!(outer.contains(&interval((6, 1), (6, 10))));
        assert!(outer.contains(&interval((6, 2), (6, 9))));
        assert!(!outer.contains(&interval((5, 31), (6, 9))));
        assert!(!outer.contains(&interval((6, 2), (6, 11))));
    }

    #[test]
    fn row_derives_output_columns() {
        let event = ClassifiedEvent {
            interval: interval((2, 1), (2, 4)),
            pass: 0,
            role: EventRole::Outer,
            group_id: 0,
        };
        let row = EventRow::new(&event, 60.0);
        assert!((row.drop_pct - 50.0).abs() < 1e-12);
        assert_eq!(row.n_observations, 4);
        assert_eq!(row.duration_days, 4);
        assert_eq!(row.year, 2023);
        assert_eq!(row.start_doy, 32);
        assert_eq!(row.end_doy, 35);
    }

    #[test]
    fn zero_amplitude_gives_zero_pct() {
        let event = ClassifiedEvent {
            interval: interval((2, 1), (2, 4)),
            pass: 0,
            role: EventRole::Outer,
            group_id: 0,
        };
        assert_eq!(EventRow::new(&event, 0.0).drop_pct, 0.0);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventRole::Inner).unwrap(), "\"inner\"");
        assert_eq!(EventRole::Outer.to_string(), "outer");
    }
}
