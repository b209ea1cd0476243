use bioload_guards::{RiskModel, RiskScore, RiskScorer, ThresholdGuard};
use neuroconsent_core::{
    ConsentOrchestrationDecision, EscalationPath, HostBiophysicalProfile, PanelType, RiskBand,
    SecurityConstraintViolation,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

/// Operations an ELEVATED subject may only run with panel approval.
pub const ELEVATED_PANEL_OPERATIONS: [&str; 3] = ["DATA_EXPORT", "FIRMWARE_UPDATE", "EXTERNAL_SHARING"];
/// Operations a HIGH subject may run with emergency panel approval.
pub const HIGH_PANEL_OPERATIONS: [&str; 3] = ["INFERENCE", "ANALYTICS", "RESEARCH_EXPORT"];
/// Operations still allowed at CRITICAL risk.
pub const CRITICAL_ALLOWED_OPERATIONS: [&str; 2] = ["MEDICAL_EMERGENCY", "TISSUE_SAFE_DOWNSCALING"];

const ELEVATED_PANEL_TIMEOUT_S: u32 = 60;
const HIGH_PANEL_TIMEOUT_S: u32 = 120;

/// Tree decision plus the score it was keyed on. `risk` is `None` when the
/// guard or a scoring fault halted before a usable score existed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationOutcome {
    pub decision: ConsentOrchestrationDecision,
    pub risk: Option<RiskScore>,
}

/// Guard, then risk model, then the risk-band decision tree.
///
/// Every fault inside the model (error, out-of-range score, inconsistent
/// band, panic) becomes a Halt. Nothing escapes as an error.
#[derive(Debug, Clone, Default)]
pub struct ConsentOrchestrator<M: RiskModel = RiskScorer> {
    guard: ThresholdGuard,
    model: M,
}

impl ConsentOrchestrator<RiskScorer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: RiskModel> ConsentOrchestrator<M> {
    pub fn with_model(model: M) -> Self {
        Self {
            guard: ThresholdGuard,
            model,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn validate_operation(
        &self,
        profile: &HostBiophysicalProfile,
        readings: &BTreeMap<String, f64>,
        operation: &str,
        is_emergency: bool,
    ) -> ConsentOrchestrationDecision {
        self.evaluate(profile, readings, operation, is_emergency).decision
    }

    pub fn evaluate(
        &self,
        profile: &HostBiophysicalProfile,
        readings: &BTreeMap<String, f64>,
        operation: &str,
        is_emergency: bool,
    ) -> OrchestrationOutcome {
        if let Some(violation) = self.guard.check(readings, profile) {
            let escalation = if is_emergency {
                EscalationPath::MedicalEmergency
            } else {
                EscalationPath::RegulatorReview
            };
            return OrchestrationOutcome {
                decision: ConsentOrchestrationDecision::halt(violation, escalation),
                risk: None,
            };
        }

        let risk = match self.score(profile, readings) {
            Ok(risk) => risk,
            Err(halt) => {
                return OrchestrationOutcome {
                    decision: halt,
                    risk: None,
                }
            }
        };

        let decision = decide_for_band(&risk, operation, is_emergency);
        info!(
            subject = %profile.subject_id(),
            operation,
            risk_band = %risk.band,
            score = risk.score,
            outcome = decision.outcome().as_str(),
            "operation validated"
        );
        OrchestrationOutcome {
            decision,
            risk: Some(risk),
        }
    }

    fn score(
        &self,
        profile: &HostBiophysicalProfile,
        readings: &BTreeMap<String, f64>,
    ) -> Result<RiskScore, ConsentOrchestrationDecision> {
        let breach = |reason: &str, escalation| {
            ConsentOrchestrationDecision::halt(
                SecurityConstraintViolation::BiophysicalIntegrityBreach {
                    reason: reason.to_string(),
                    host_id: profile.subject_id().to_string(),
                },
                escalation,
            )
        };

        let computed = panic::catch_unwind(AssertUnwindSafe(|| self.model.compute(profile, readings)));
        let risk = match computed {
            Ok(Ok(risk)) => risk,
            Ok(Err(err)) => {
                error!(subject = %profile.subject_id(), error = %err, "risk computation failed");
                return Err(breach(
                    "Risk computation integrity check failed",
                    EscalationPath::TechnicalSupport,
                ));
            }
            Err(_) => {
                error!(subject = %profile.subject_id(), "risk model panicked");
                return Err(breach(
                    "Risk computation integrity check failed",
                    EscalationPath::TechnicalSupport,
                ));
            }
        };

        if !(0.0..=1.0).contains(&risk.score) {
            error!(subject = %profile.subject_id(), score = risk.score, "risk score out of range");
            return Err(breach(
                "Risk computation integrity check failed",
                EscalationPath::TechnicalSupport,
            ));
        }
        if risk.band != RiskBand::from_score(risk.score) {
            error!(
                subject = %profile.subject_id(),
                score = risk.score,
                band = %risk.band,
                "risk band does not match score"
            );
            return Err(breach("Unrecognized risk band", EscalationPath::SystemError));
        }
        Ok(risk)
    }
}

fn decide_for_band(risk: &RiskScore, operation: &str, is_emergency: bool) -> ConsentOrchestrationDecision {
    match risk.band {
        RiskBand::Optimal => ConsentOrchestrationDecision::Proceed,
        RiskBand::Elevated => {
            if ELEVATED_PANEL_OPERATIONS.contains(&operation) {
                ConsentOrchestrationDecision::defer(
                    PanelType::Neuroscore,
                    "Elevated psychophysical risk; sensitive operation requires panel approval",
                    ELEVATED_PANEL_TIMEOUT_S,
                    &["SUBJECT", "MEDICAL"],
                )
            } else {
                ConsentOrchestrationDecision::Proceed
            }
        }
        RiskBand::High => {
            if HIGH_PANEL_OPERATIONS.contains(&operation) {
                ConsentOrchestrationDecision::defer(
                    PanelType::EmergencyOverride,
                    "HIGH psychophysical risk; all operations require emergency panel approval",
                    HIGH_PANEL_TIMEOUT_S,
                    &["SUBJECT", "MEDICAL", "AUDITOR"],
                )
            } else if is_emergency {
                ConsentOrchestrationDecision::Proceed
            } else {
                warn!(operation, score = risk.score, "high risk operation refused");
                ConsentOrchestrationDecision::halt(
                    SecurityConstraintViolation::UnauthorizedAccessAttempt {
                        attempted_operation: operation.to_string(),
                        risk_score: risk.score,
                        required_consent: "EMERGENCY_PANEL_OVERRIDE".to_string(),
                    },
                    EscalationPath::NeuroscorePanel,
                )
            }
        }
        RiskBand::Critical => {
            if is_emergency || CRITICAL_ALLOWED_OPERATIONS.contains(&operation) {
                ConsentOrchestrationDecision::Proceed
            } else {
                warn!(operation, score = risk.score, "critical risk operation refused");
                ConsentOrchestrationDecision::halt(
                    SecurityConstraintViolation::UnauthorizedAccessAttempt {
                        attempted_operation: operation.to_string(),
                        risk_score: risk.score,
                        required_consent: "MEDICAL_EMERGENCY_ONLY".to_string(),
                    },
                    EscalationPath::AutomaticEmergencyAlert,
                )
            }
        }
    }
}
