use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
/// Returns the key that matched alongside the value.
fn profiled_env_opt(profile: &str, key: &str) -> Option<(String, String)> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some((prefixed, v));
        }
    }
    env_opt(key).map(|v| (key.to_string(), v))
}

/// Parse a profiled env var. A value that is present but unparseable is an
/// error rather than a silent fallback to the default.
fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match profiled_env_opt(profile, key) {
        None => Ok(None),
        Some((matched, raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: matched,
                value: raw,
            }),
    }
}

/// Env var selecting the active profile.
pub const PROFILE_ENV: &str = "DENDRO_PROFILE";

pub const DROP_THRESHOLD_PCT_ENV: &str = "SHRINK_DROP_THRESHOLD_PCT";
pub const REBOUND_TOLERANCE_DAYS_ENV: &str = "SHRINK_REBOUND_TOLERANCE_DAYS";
pub const MAX_EVENT_SPAN_DAYS_ENV: &str = "SHRINK_MAX_EVENT_SPAN_DAYS";
pub const MIN_EVENT_DURATION_ENV: &str = "SHRINK_MIN_EVENT_DURATION";

pub const DEFAULT_DROP_THRESHOLD_PCT: f64 = 10.0;
pub const DEFAULT_REBOUND_TOLERANCE_DAYS: i64 = 3;
pub const DEFAULT_MAX_EVENT_SPAN_DAYS: i64 = 30;
pub const DEFAULT_MIN_EVENT_DURATION: i64 = 2;

fn default_drop_threshold_pct() -> f64 { DEFAULT_DROP_THRESHOLD_PCT }
fn default_rebound_tolerance_days() -> i64 { DEFAULT_REBOUND_TOLERANCE_DAYS }
fn default_max_event_span_days() -> i64 { DEFAULT_MAX_EVENT_SPAN_DAYS }
fn default_min_event_duration() -> i64 { DEFAULT_MIN_EVENT_DURATION }

// ── Raw parameters ────────────────────────────────────────────

/// Unvalidated scan parameters as they arrive from env, YAML or CLI.
///
/// Integers are signed so that a negative value survives parsing and is
/// reported by [`ScanParams::validate`] instead of failing as a type error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanParams {
    /// Minimum cumulative decline from a peak, as a percentage of amplitude.
    #[serde(default = "default_drop_threshold_pct")]
    pub drop_threshold_pct: f64,
    /// Consecutive increases tolerated inside an event.
    #[serde(default = "default_rebound_tolerance_days")]
    pub rebound_tolerance_days: i64,
    /// Hard cap on observations after the event's peak.
    #[serde(default = "default_max_event_span_days")]
    pub max_event_span_days: i64,
    /// Shortest emitted event, in observations (inclusive).
    #[serde(default = "default_min_event_duration")]
    pub min_event_duration: i64,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            drop_threshold_pct: DEFAULT_DROP_THRESHOLD_PCT,
            rebound_tolerance_days: DEFAULT_REBOUND_TOLERANCE_DAYS,
            max_event_span_days: DEFAULT_MAX_EVENT_SPAN_DAYS,
            min_event_duration: DEFAULT_MIN_EVENT_DURATION,
        }
    }
}

impl ScanParams {
    /// Defaults overlaid with environment variables (call `load_dotenv()` first).
    /// Profile is read from `DENDRO_PROFILE`. When set (e.g. `SPRUCE`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or(PROFILE_ENV, "").to_uppercase();
        Self::default().with_env_profile(&profile)
    }

    /// Overlay env values for the given profile on top of `self`.
    pub fn with_env_profile(mut self, profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        if let Some(v) = profiled_env_parse(p, DROP_THRESHOLD_PCT_ENV)? {
            self.drop_threshold_pct = v;
        }
        if let Some(v) = profiled_env_parse(p, REBOUND_TOLERANCE_DAYS_ENV)? {
            self.rebound_tolerance_days = v;
        }
        if let Some(v) = profiled_env_parse(p, MAX_EVENT_SPAN_DAYS_ENV)? {
            self.max_event_span_days = v;
        }
        if let Some(v) = profiled_env_parse(p, MIN_EVENT_DURATION_ENV)? {
            self.min_event_duration = v;
        }
        Ok(self)
    }

    /// Check every range constraint and produce a usable [`ScanConfig`].
    pub fn validate(&self) -> Result<ScanConfig, ConfigError> {
        let pct = self.drop_threshold_pct;
        // Written so that NaN fails too.
        if !(pct > 0.0 && pct <= 100.0) {
            return Err(ConfigError::DropThresholdOutOfRange(pct));
        }
        if self.rebound_tolerance_days < 0 {
            return Err(ConfigError::NegativeReboundTolerance(
                self.rebound_tolerance_days,
            ));
        }
        if self.min_event_duration < 1 {
            return Err(ConfigError::MinDurationTooSmall(self.min_event_duration));
        }
        if self.max_event_span_days < self.min_event_duration {
            return Err(ConfigError::SpanShorterThanDuration {
                max_span: self.max_event_span_days,
                min_duration: self.min_event_duration,
            });
        }

        Ok(ScanConfig {
            drop_threshold_pct: pct,
            rebound_tolerance_days: self.rebound_tolerance_days as usize,
            max_event_span_days: self.max_event_span_days as usize,
            min_event_duration: self.min_event_duration as usize,
        })
    }
}

// ── Validated config ──────────────────────────────────────────

/// Validated scanner configuration. Only obtainable through
/// [`ScanParams::validate`], so a `ScanConfig` is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanConfig {
    drop_threshold_pct: f64,
    rebound_tolerance_days: usize,
    max_event_span_days: usize,
    min_event_duration: usize,
}

impl ScanConfig {
    pub fn drop_threshold_pct(&self) -> f64 {
        self.drop_threshold_pct
    }

    pub fn rebound_tolerance_days(&self) -> usize {
        self.rebound_tolerance_days
    }

    pub fn max_event_span_days(&self) -> usize {
        self.max_event_span_days
    }

    pub fn min_event_duration(&self) -> usize {
        self.min_event_duration
    }

    /// Absolute drop an entity with the given amplitude must show.
    pub fn drop_threshold(&self, amplitude: f64) -> f64 {
        amplitude * self.drop_threshold_pct / 100.0
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self, pass: usize) {
        tracing::info!(
            "  pass {}: drop>={}% of amplitude, rebound<={}d, span<={}d, duration>={} obs",
            pass,
            self.drop_threshold_pct,
            self.rebound_tolerance_days,
            self.max_event_span_days,
            self.min_event_duration
        );
    }
}

impl TryFrom<ScanParams> for ScanConfig {
    type Error = ConfigError;

    fn try_from(params: ScanParams) -> Result<Self, Self::Error> {
        params.validate()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            drop_threshold_pct: DEFAULT_DROP_THRESHOLD_PCT,
            rebound_tolerance_days: DEFAULT_REBOUND_TOLERANCE_DAYS as usize,
            max_event_span_days: DEFAULT_MAX_EVENT_SPAN_DAYS as usize,
            min_event_duration: DEFAULT_MIN_EVENT_DURATION as usize,
        }
    }
}
