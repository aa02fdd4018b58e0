use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use dendro_core::{EventRole, EventRow};

/// Aggregate statistics over an exported event table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventSummary {
    pub total_events: usize,
    pub outer_events: usize,
    pub inner_events: usize,
    pub entities_with_events: usize,
    /// Mean inclusive observation count per event.
    pub mean_n_observations: Option<f64>,
    /// Mean drop as a percentage of each entity's amplitude.
    pub mean_drop_pct: Option<f64>,
    pub max_drop_amount: Option<f64>,
}

impl EventSummary {
    pub fn from_rows(rows: &[EventRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let n = rows.len() as f64;
        let outer_events = rows.iter().filter(|r| r.role == EventRole::Outer).count();
        let entities: HashSet<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();

        Self {
            total_events: rows.len(),
            outer_events,
            inner_events: rows.len() - outer_events,
            entities_with_events: entities.len(),
            mean_n_observations: Some(
                rows.iter().map(|r| r.n_observations as f64).sum::<f64>() / n,
            ),
            mean_drop_pct: Some(rows.iter().map(|r| r.drop_pct).sum::<f64>() / n),
            max_drop_amount: rows.iter().map(|r| r.drop_amount).reduce(f64::max),
        }
    }

    pub fn log(&self) {
        info!(
            events = self.total_events,
            outer = self.outer_events,
            inner = self.inner_events,
            entities = self.entities_with_events,
            mean_n_observations = self.mean_n_observations.unwrap_or(0.0),
            mean_drop_pct = self.mean_drop_pct.unwrap_or(0.0),
            max_drop = self.max_drop_amount.unwrap_or(0.0),
            "event summary"
        );
    }
}
