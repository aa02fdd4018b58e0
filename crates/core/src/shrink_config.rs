//! ShrinkConfig document — one or more scan passes loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ScanConfig, ScanParams};
use crate::error::ConfigError;

/// Expected value of the `kind` field.
pub const SHRINK_CONFIG_KIND: &str = "ShrinkConfig";

// ── YAML-level types ────────────────────────────────────────────────

/// Top-level ShrinkConfig document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShrinkConfigDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ConfigMetadata,
    pub spec: ShrinkConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Specification section: the scan passes, in pass-index order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShrinkConfigSpec {
    pub passes: Vec<ScanParams>,
}

impl ShrinkConfigDocument {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Raw pass parameters, after checking the document kind.
    pub fn params(&self) -> Result<&[ScanParams], ConfigError> {
        if self.kind != SHRINK_CONFIG_KIND {
            return Err(ConfigError::UnsupportedKind(self.kind.clone()));
        }
        if self.spec.passes.is_empty() {
            return Err(ConfigError::NoPasses);
        }
        Ok(&self.spec.passes)
    }

    /// Validate every pass. Fails on the first invalid one.
    pub fn compile(&self) -> Result<Vec<ScanConfig>, ConfigError> {
        validate_passes(self.params()?)
    }
}

/// Validate a list of pass parameters, reporting the index of the first
/// invalid pass.
pub fn validate_passes(passes: &[ScanParams]) -> Result<Vec<ScanConfig>, ConfigError> {
    if passes.is_empty() {
        return Err(ConfigError::NoPasses);
    }
    passes
        .iter()
        .enumerate()
        .map(|(index, params)| {
            params.validate().map_err(|e| ConfigError::InvalidPass {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}
