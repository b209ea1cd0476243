use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker identifiers shared by telemetry providers, profiles and scorers.
pub mod markers {
    pub const BLOOD_GLUCOSE: &str = "blood.glucose";
    pub const BLOOD_LACTATE: &str = "blood.lactate";
    pub const BLOOD_HEMATOCRIT: &str = "blood.hematocrit";
    pub const PROTEIN_ALBUMIN: &str = "protein.albumin";
    pub const SUGAR_ATP: &str = "sugar.atp";
    pub const WAVE_HRV: &str = "wave.hrv";
    pub const WAVE_EEG_ALPHA: &str = "wave.eeg_alpha";
    pub const WAVE_EEG_THETA: &str = "wave.eeg_theta";
    pub const WAVE_COHERENCE: &str = "wave.coherence";
    pub const DW_GSR: &str = "dw.gsr";
    pub const DW_HYDRATION: &str = "dw.hydration";
    pub const OXYGEN_SPO2: &str = "oxygen.spo2";
    pub const OXYGEN_PO2: &str = "oxygen.po2";
    pub const NEURO_CYTOKINE: &str = "neuro.cytokine";
}

/// One sampled frame of physiological and device telemetry.
///
/// Produced by a [`TelemetryProvider`] at roughly 1 Hz and consumed once per
/// decision. The engine never retains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    /// Flat marker -> value map, e.g. `"blood.glucose" -> 104.0`.
    #[serde(default)]
    pub readings: BTreeMap<String, f64>,
    /// EEG band powers keyed by band name, compared against the subject baseline.
    #[serde(default)]
    pub eeg_bands: BTreeMap<String, f64>,
    /// BCI packet error rate in [0, 1].
    pub bci_error_rate: f64,
    pub autonomic_tone: f64,
    pub implant_power_mw: f64,
    /// Tissue interface current density, µA/mm².
    pub tissue_current_density: f64,
    /// Thermal load at the tissue interface, mW/mm².
    pub thermal_load: f64,
}

impl TelemetrySnapshot {
    pub fn reading(&self, marker: &str) -> Option<f64> {
        self.readings.get(marker).copied()
    }
}

/// Per-subject reference values recorded at enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectBaseline {
    #[serde(default)]
    pub baseline_eeg: BTreeMap<String, f64>,
    pub hrv_40th_percentile: f64,
    pub hrv_10th_percentile: f64,
    pub implant_power_cap_mw: f64,
}

/// Source of telemetry snapshots (sensors, health APIs, replay files).
///
/// Decision components only ever see the materialized snapshot; callers pull
/// from a provider and hand the result in.
pub trait TelemetryProvider {
    fn current_snapshot(&self) -> Option<TelemetrySnapshot>;
}
