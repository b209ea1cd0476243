use neuroconsent_core::{markers, HostBiophysicalProfile, RiskBand};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const AUTONOMIC_WEIGHT: f64 = 0.6;
pub const METABOLIC_WEIGHT: f64 = 0.3;
pub const INFLAMMATORY_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskComputationError {
    #[error("reading {marker} is not finite: {value}")]
    NonFiniteReading { marker: String, value: f64 },
}

/// Scorer inputs with absent markers replaced by resting defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReadings {
    pub hrv: f64,
    pub gsr: f64,
    pub glucose: f64,
    pub lactate: f64,
    pub spo2: f64,
    pub cytokine: f64,
}

impl RiskReadings {
    pub fn from_map(readings: &BTreeMap<String, f64>) -> Result<Self, RiskComputationError> {
        let get = |marker: &str, default: f64| -> Result<f64, RiskComputationError> {
            let value = readings.get(marker).copied().unwrap_or(default);
            if value.is_finite() {
                Ok(value)
            } else {
                Err(RiskComputationError::NonFiniteReading {
                    marker: marker.to_string(),
                    value,
                })
            }
        };
        Ok(Self {
            hrv: get(markers::WAVE_HRV, 50.0)?,
            gsr: get(markers::DW_GSR, 5.0)?,
            glucose: get(markers::BLOOD_GLUCOSE, 100.0)?,
            lactate: get(markers::BLOOD_LACTATE, 1.0)?,
            spo2: get(markers::OXYGEN_SPO2, 98.0)?,
            cytokine: get(markers::NEURO_CYTOKINE, 0.5)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSubScores {
    pub autonomic: f64,
    pub metabolic: f64,
    pub inflammatory: f64,
}

/// Integrated psychophysical risk for one set of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub subject: String,
    /// Always within [0, 1].
    pub score: f64,
    pub band: RiskBand,
    pub sub_scores: RiskSubScores,
    pub readings: RiskReadings,
    /// -1 (sympathetic) .. +1 (parasympathetic), minus a GSR penalty.
    pub parasympathetic_tone: f64,
    pub metabolic_efficiency: f64,
    pub recommended_actions: Vec<String>,
}

impl RiskScore {
    pub fn summary(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        out.insert("subject".to_string(), json!(self.subject));
        out.insert("score".to_string(), json!(self.score));
        out.insert("band".to_string(), json!(self.band.as_str()));
        out.insert("autonomic".to_string(), json!(self.sub_scores.autonomic));
        out.insert("metabolic".to_string(), json!(self.sub_scores.metabolic));
        out.insert("inflammatory".to_string(), json!(self.sub_scores.inflammatory));
        out.insert("recommended_actions".to_string(), json!(self.recommended_actions));
        out
    }
}

/// Seam for swapping the scoring model behind the orchestrator.
pub trait RiskModel: Send + Sync {
    fn compute(
        &self,
        profile: &HostBiophysicalProfile,
        readings: &BTreeMap<String, f64>,
    ) -> Result<RiskScore, RiskComputationError>;
}

/// Autonomic 60% / metabolic 30% / inflammatory 10% weighted scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    /// Lower HRV and higher GSR both raise risk.
    pub fn autonomic_component(hrv: f64, gsr: f64) -> f64 {
        let hrv_score = 1.0 - (hrv / 100.0).clamp(0.0, 1.0);
        let gsr_score = (gsr / 30.0).clamp(0.0, 1.0);
        (hrv_score + gsr_score) / 2.0
    }

    pub fn metabolic_component(glucose: f64, lactate: f64, spo2: f64) -> f64 {
        let glucose_score = if (70.0..=110.0).contains(&glucose) {
            0.1
        } else if glucose > 110.0 && glucose <= 200.0 {
            0.3
        } else {
            0.8
        };
        let lactate_score = (lactate / 5.0).clamp(0.0, 1.0);
        // Saturates at 50% SpO2 so the sub-score stays within [0, 1].
        let spo2_score = if spo2 < 95.0 {
            ((1.0 - spo2 / 100.0) * 2.0).clamp(0.0, 1.0)
        } else {
            0.05
        };
        (glucose_score + lactate_score + spo2_score) / 3.0
    }

    pub fn inflammatory_component(cytokine: f64) -> f64 {
        (cytokine / 6.0).clamp(0.0, 1.0)
    }
}

impl RiskModel for RiskScorer {
    fn compute(
        &self,
        profile: &HostBiophysicalProfile,
        readings: &BTreeMap<String, f64>,
    ) -> Result<RiskScore, RiskComputationError> {
        let r = RiskReadings::from_map(readings)?;

        let sub_scores = RiskSubScores {
            autonomic: Self::autonomic_component(r.hrv, r.gsr),
            metabolic: Self::metabolic_component(r.glucose, r.lactate, r.spo2),
            inflammatory: Self::inflammatory_component(r.cytokine),
        };
        let integrated = sub_scores.autonomic * AUTONOMIC_WEIGHT
            + sub_scores.metabolic * METABOLIC_WEIGHT
            + sub_scores.inflammatory * INFLAMMATORY_WEIGHT;
        let score = integrated.clamp(0.0, 1.0);
        let band = RiskBand::from_score(score);

        Ok(RiskScore {
            subject: profile.subject_id().to_string(),
            score,
            band,
            sub_scores,
            readings: r,
            parasympathetic_tone: (r.hrv / 50.0).clamp(-1.0, 1.0) - r.gsr / 20.0,
            metabolic_efficiency: 1.0 / (r.lactate + 0.1),
            recommended_actions: band.recommended_actions().iter().map(|a| a.to_string()).collect(),
        })
    }
}
