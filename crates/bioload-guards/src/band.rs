use neuroconsent_core::{BioloadBand, SubjectBaseline, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const COHERENCE_EPSILON: f64 = 1e-6;

/// Band predicate inputs after deriving coherence and implant ratio
/// against the subject baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandInputs {
    pub eeg_coherence: f64,
    pub error_rate: f64,
    pub autonomic_tone: f64,
    pub implant_power_ratio: f64,
    pub tissue_current_density: f64,
    pub thermal_load: f64,
}

impl BandInputs {
    pub fn derive(snapshot: &TelemetrySnapshot, baseline: &SubjectBaseline) -> Self {
        // A missing or zero cap cannot vouch for any draw.
        let implant_power_ratio = if baseline.implant_power_cap_mw > 0.0 {
            snapshot.implant_power_mw / baseline.implant_power_cap_mw
        } else {
            f64::INFINITY
        };
        Self {
            eeg_coherence: eeg_coherence(&snapshot.eeg_bands, &baseline.baseline_eeg),
            error_rate: snapshot.bci_error_rate,
            autonomic_tone: snapshot.autonomic_tone,
            implant_power_ratio,
            tissue_current_density: snapshot.tissue_current_density,
            thermal_load: snapshot.thermal_load,
        }
    }

    fn has_nan(&self) -> bool {
        [
            self.eeg_coherence,
            self.error_rate,
            self.autonomic_tone,
            self.implant_power_ratio,
            self.tissue_current_density,
            self.thermal_load,
        ]
        .iter()
        .any(|v| v.is_nan())
    }
}

/// `max(0, 1 - mean(|reading - baseline| / (baseline + eps)))` over the band
/// names present in both maps. No shared data means fully coherent.
pub fn eeg_coherence(bands: &BTreeMap<String, f64>, baseline: &BTreeMap<String, f64>) -> f64 {
    if bands.is_empty() || baseline.is_empty() {
        return 1.0;
    }
    let deviations: Vec<f64> = bands
        .iter()
        .filter_map(|(band, value)| {
            baseline
                .get(band)
                .map(|base| (value - base).abs() / (base + COHERENCE_EPSILON))
        })
        .collect();
    if deviations.is_empty() {
        return 1.0;
    }
    let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
    (1.0 - mean).max(0.0)
}

/// Maps telemetry to SAFE / CAUTION / EMERGENCY.
///
/// Predicates run in the fixed order SAFE, CAUTION, EMERGENCY and the first
/// match wins. A frame that trips both a CAUTION and an EMERGENCY clause is
/// therefore CAUTION. This is not strictest-wins; see DESIGN.md before
/// reordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandClassifier;

impl BandClassifier {
    pub fn classify(&self, snapshot: &TelemetrySnapshot, baseline: &SubjectBaseline) -> BioloadBand {
        let band = self.classify_inputs(&BandInputs::derive(snapshot, baseline), baseline);
        debug!(subject = %snapshot.subject, band = %band, "bioload band evaluated");
        band
    }

    pub fn classify_inputs(&self, inputs: &BandInputs, baseline: &SubjectBaseline) -> BioloadBand {
        // Every predicate is false for NaN, which would fall through to SAFE.
        if inputs.has_nan() {
            warn!("non-numeric telemetry; classifying as emergency");
            return BioloadBand::Emergency;
        }

        let safe = inputs.eeg_coherence > 0.85
            && inputs.error_rate < 0.05
            && inputs.autonomic_tone > baseline.hrv_40th_percentile
            && inputs.implant_power_ratio < 0.80
            && inputs.tissue_current_density < 10.0
            && inputs.thermal_load < 1.0;
        if safe {
            return BioloadBand::Safe;
        }

        let caution = inputs.eeg_coherence > 0.70
            || (inputs.error_rate > 0.05 && inputs.error_rate < 0.10)
            || inputs.autonomic_tone < baseline.hrv_40th_percentile
            || (inputs.implant_power_ratio > 0.85 && inputs.implant_power_ratio < 0.95);
        if caution {
            return BioloadBand::Caution;
        }

        let emergency = inputs.eeg_coherence < 0.60
            || inputs.error_rate > 0.15
            || inputs.autonomic_tone < baseline.hrv_10th_percentile
            || inputs.implant_power_ratio > 0.95
            || inputs.tissue_current_density > 25.0
            || inputs.thermal_load > 2.5;
        if emergency {
            warn!("bioload emergency predicate matched");
            return BioloadBand::Emergency;
        }

        BioloadBand::Safe
    }
}
