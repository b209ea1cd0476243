use crate::bands::BioloadBand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read failed {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerEnvelope {
    pub min: f64,
    pub max: f64,
}

/// Absolute bounds no host adjustment may push a critical bound past.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteEnvelope {
    pub default_min: f64,
    pub default_max: f64,
    #[serde(default)]
    pub per_marker: BTreeMap<String, MarkerEnvelope>,
}

impl Default for AbsoluteEnvelope {
    fn default() -> Self {
        Self {
            default_min: 0.0,
            default_max: 1000.0,
            per_marker: BTreeMap::new(),
        }
    }
}

impl AbsoluteEnvelope {
    pub fn for_marker(&self, marker: &str) -> MarkerEnvelope {
        self.per_marker.get(marker).copied().unwrap_or(MarkerEnvelope {
            min: self.default_min,
            max: self.default_max,
        })
    }
}

/// Constraints for one on-device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferencePolicy {
    pub model_name: String,
    pub max_energy_micro_j: u64,
    pub allowed_bands: Vec<BioloadBand>,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u32,
    #[serde(default = "default_true")]
    pub requires_explicit_consent: bool,
    #[serde(default = "default_true")]
    pub data_redaction_required: bool,
    pub purposes_allowed: Vec<String>,
}

fn default_max_latency_ms() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

impl InferencePolicy {
    fn builtin(
        model_name: &str,
        max_energy_micro_j: u64,
        allowed_bands: &[BioloadBand],
        purposes_allowed: &[&str],
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            max_energy_micro_j,
            allowed_bands: allowed_bands.to_vec(),
            max_latency_ms: default_max_latency_ms(),
            requires_explicit_consent: true,
            data_redaction_required: true,
            purposes_allowed: purposes_allowed.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<InferencePolicy> {
        use BioloadBand::{Caution, Emergency, Safe};
        vec![
            Self::builtin("on_device_speech_recognition", 10_000, &[Safe, Caution], &["CARE", "OPS"]),
            Self::builtin("biometric_liveness", 2_000, &[Safe, Caution, Emergency], &["OPS", "SECURITY"]),
            Self::builtin("seizure_detection_lstm", 3_000, &[Safe, Caution, Emergency], &["CARE", "OPS"]),
            Self::builtin("emotion_recognition_transformer", 5_000, &[Safe], &["RESEARCH"]),
        ]
    }
}

/// Tunables for the engine surface. Classifier cut-offs, risk weights and
/// calibration ratios are compiled in and not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audit_capacity: usize,
    pub audit_recent_entries: usize,
    pub absolute_envelope: AbsoluteEnvelope,
    pub inference_policies: Vec<InferencePolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_capacity: 1000,
            audit_recent_entries: 10,
            absolute_envelope: AbsoluteEnvelope::default(),
            inference_policies: InferencePolicy::defaults(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
