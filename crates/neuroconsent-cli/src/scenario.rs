use anyhow::{Context, Result};
use neuroconsent_core::{
    Actor, HostBiophysicalProfile, JurisdictionProfile, RightsSurface, SubjectBaseline,
    TelemetryProvider, TelemetrySnapshot,
};
use neuroconsent_engine::DecisionRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One decision's worth of context, as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub snapshot: Option<TelemetrySnapshot>,
    pub baseline: SubjectBaseline,
    pub profile: HostBiophysicalProfile,
    pub actor: Actor,
    #[serde(default)]
    pub rights: RightsSurface,
    pub jurisdiction: JurisdictionProfile,
    pub operation: String,
    #[serde(default)]
    pub is_emergency: bool,
}

impl Scenario {
    pub fn request<'a>(&'a self, snapshot: &'a TelemetrySnapshot) -> DecisionRequest<'a> {
        DecisionRequest {
            snapshot,
            baseline: &self.baseline,
            profile: &self.profile,
            actor: &self.actor,
            rights: &self.rights,
            jurisdiction: &self.jurisdiction,
            operation: &self.operation,
            is_emergency: self.is_emergency,
        }
    }
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    load_json(path)
}

pub fn load_baseline(path: &Path) -> Result<BTreeMap<String, f64>> {
    load_json(path)
}

/// Telemetry replayed from a JSON file holding one snapshot. The file is
/// re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonFileTelemetry {
    path: PathBuf,
}

impl JsonFileTelemetry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetryProvider for JsonFileTelemetry {
    fn current_snapshot(&self) -> Option<TelemetrySnapshot> {
        match load_json(&self.path) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(path = %self.path.display(), error = %format!("{err:#}"), "telemetry unavailable");
                None
            }
        }
    }
}
