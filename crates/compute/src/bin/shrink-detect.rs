//! shrink-detect — shrinking-event detection over daily dendrometer series.
//!
//! Reads a tidy Parquet table (one reading per row), aggregates readings to
//! daily means per entity, runs every configured scan pass and writes the
//! classified event table as Parquet or JSON.
//!
//! Scan parameters, lowest to highest precedence: built-in defaults,
//! `SHRINK_*` env vars (profiled by `DENDRO_PROFILE`), a ShrinkConfig YAML
//! document, then the per-parameter flags below.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use dendro_compute::{prepare_series, EntityDriver, EventSummary};
use dendro_core::config::load_dotenv;
use dendro_core::{validate_passes, ScanConfig, ScanParams, ShrinkConfigDocument};
use dendro_ingest::{write_events_json, write_events_parquet, ColumnMapping, ReadingImporter};

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Parquet,
    Json,
}

/// Detect shrinking events and classify them into outer/inner groups.
#[derive(Parser, Debug)]
#[command(name = "shrink-detect", version, about)]
struct Cli {
    /// Input Parquet table with entity, date and value columns.
    #[arg(long, env = "SHRINK_INPUT")]
    input: PathBuf,

    /// Output path for the event table.
    #[arg(long, env = "SHRINK_OUTPUT", default_value = "shrink_events.parquet")]
    output: PathBuf,

    /// Output format.
    #[arg(long, env = "SHRINK_FORMAT", value_enum, default_value_t = OutputFormat::Parquet)]
    format: OutputFormat,

    /// ShrinkConfig YAML document. Without it a single pass is read from env.
    #[arg(long, env = "SHRINK_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SHRINK_ENTITY_COLUMN", default_value = "id")]
    entity_column: String,

    #[arg(long, env = "SHRINK_DATE_COLUMN", default_value = "date")]
    date_column: String,

    #[arg(long, env = "SHRINK_VALUE_COLUMN", default_value = "D_mean")]
    value_column: String,

    /// Process entities on the calling thread instead of the rayon pool.
    #[arg(long)]
    sequential: bool,

    /// Override drop_threshold_pct in every pass.
    #[arg(long, allow_negative_numbers = true)]
    drop_threshold_pct: Option<f64>,

    /// Override rebound_tolerance_days in every pass.
    #[arg(long, allow_negative_numbers = true)]
    rebound_tolerance_days: Option<i64>,

    /// Override max_event_span_days in every pass.
    #[arg(long, allow_negative_numbers = true)]
    max_event_span_days: Option<i64>,

    /// Override min_event_duration in every pass.
    #[arg(long, allow_negative_numbers = true)]
    min_event_duration: Option<i64>,
}

impl Cli {
    fn apply_overrides(&self, mut params: ScanParams) -> ScanParams {
        if let Some(v) = self.drop_threshold_pct {
            params.drop_threshold_pct = v;
        }
        if let Some(v) = self.rebound_tolerance_days {
            params.rebound_tolerance_days = v;
        }
        if let Some(v) = self.max_event_span_days {
            params.max_event_span_days = v;
        }
        if let Some(v) = self.min_event_duration {
            params.min_event_duration = v;
        }
        params
    }

    fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            entity: self.entity_column.clone(),
            date: self.date_column.clone(),
            value: self.value_column.clone(),
        }
    }
}

/// Build the validated pass list from YAML or env, with CLI overrides on top.
fn resolve_passes(cli: &Cli) -> anyhow::Result<Vec<ScanConfig>> {
    let base: Vec<ScanParams> = match &cli.config {
        Some(path) => {
            let doc = ShrinkConfigDocument::from_file(path)?;
            info!(
                path = %path.display(),
                id = %doc.metadata.id,
                passes = doc.spec.passes.len(),
                "loaded shrink config"
            );
            doc.params()?.to_vec()
        }
        None => vec![ScanParams::from_env()?],
    };

    let params: Vec<ScanParams> = base.into_iter().map(|p| cli.apply_overrides(p)).collect();
    Ok(validate_passes(&params)?)
}

// ── Main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let passes = resolve_passes(&cli).context("invalid scan configuration")?;
    info!(passes = passes.len(), "scan configuration");
    for (index, pass) in passes.iter().enumerate() {
        pass.log_summary(index);
    }

    let (readings, import_stats) =
        ReadingImporter::import_with_stats(&cli.input, &cli.column_mapping())
            .with_context(|| format!("failed to import {}", cli.input.display()))?;

    let (series, prepare_stats) = prepare_series(&readings);
    info!(
        rows = import_stats.rows,
        entities = prepare_stats.entities,
        days = prepare_stats.days,
        dropped_values = prepare_stats.readings_dropped,
        "prepared daily series"
    );

    let mut driver = EntityDriver::with_passes(passes)?;
    if cli.sequential {
        driver = driver.sequential();
    }
    let report = driver.run(&series)?;

    for diagnostic in &report.diagnostics {
        warn!(
            entity = %diagnostic.entity_id,
            error = %diagnostic.error,
            "entity skipped"
        );
    }
    EventSummary::from_rows(&report.events).log();

    let written = match cli.format {
        OutputFormat::Parquet => write_events_parquet(&report.events, &cli.output)?,
        OutputFormat::Json => write_events_json(&report.events, &cli.output)?,
    };
    info!(path = %cli.output.display(), rows = written, "event table written");

    Ok(())
}
