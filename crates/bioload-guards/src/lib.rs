mod band;
mod risk;
mod threshold_guard;

pub use band::{eeg_coherence, BandClassifier, BandInputs};
pub use risk::{
    AUTONOMIC_WEIGHT, INFLAMMATORY_WEIGHT, METABOLIC_WEIGHT,
    RiskComputationError, RiskModel, RiskReadings, RiskScore, RiskScorer, RiskSubScores,
};
pub use threshold_guard::ThresholdGuard;
