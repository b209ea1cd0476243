use crate::forensic::forensic_hash;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Closed taxonomy of reasons the engine halts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityConstraintViolation {
    ThresholdExceeded {
        stakeholder: String,
        current_value: f64,
        threshold: f64,
    },
    BiophysicalIntegrityBreach {
        reason: String,
        host_id: String,
    },
    UnauthorizedAccessAttempt {
        attempted_operation: String,
        risk_score: f64,
        required_consent: String,
    },
}

impl SecurityConstraintViolation {
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityConstraintViolation::ThresholdExceeded { .. } => "THRESHOLD_EXCEEDED",
            SecurityConstraintViolation::BiophysicalIntegrityBreach { .. } => {
                "BIOPHYSICAL_INTEGRITY_BREACH"
            }
            SecurityConstraintViolation::UnauthorizedAccessAttempt { .. } => {
                "UNAUTHORIZED_ACCESS_ATTEMPT"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PanelType {
    Neuroscore,
    EmergencyOverride,
    NeurorightsPanel,
}

impl PanelType {
    pub fn as_str(self) -> &'static str {
        match self {
            PanelType::Neuroscore => "NEUROSCORE",
            PanelType::EmergencyOverride => "EMERGENCY_OVERRIDE",
            PanelType::NeurorightsPanel => "NEURORIGHTS_PANEL",
        }
    }
}

/// Who a halt is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationPath {
    MedicalEmergency,
    RegulatorReview,
    NeuroscorePanel,
    AutomaticEmergencyAlert,
    NeurorightsReview,
    TechnicalSupport,
    SystemError,
}

impl EscalationPath {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationPath::MedicalEmergency => "MEDICAL_EMERGENCY",
            EscalationPath::RegulatorReview => "REGULATOR_REVIEW",
            EscalationPath::NeuroscorePanel => "NEUROSCORE_PANEL",
            EscalationPath::AutomaticEmergencyAlert => "AUTOMATIC_EMERGENCY_ALERT",
            EscalationPath::NeurorightsReview => "NEURORIGHTS_REVIEW",
            EscalationPath::TechnicalSupport => "TECHNICAL_SUPPORT",
            EscalationPath::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl fmt::Display for EscalationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of pre-flight validation. Exactly three shapes exist; there is no
/// "try anyway".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentOrchestrationDecision {
    Proceed,
    DeferToPanel {
        panel_type: PanelType,
        reason: String,
        /// Contractual metadata; the caller owns the countdown and fails closed.
        timeout_seconds: u32,
        required_signatures: Vec<String>,
    },
    Halt {
        violation: SecurityConstraintViolation,
        forensic_hash: String,
        escalation_path: EscalationPath,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Proceed,
    DeferToPanel,
    Halt,
}

impl DecisionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionOutcome::Proceed => "PROCEED",
            DecisionOutcome::DeferToPanel => "DEFER_TO_PANEL",
            DecisionOutcome::Halt => "HALT",
        }
    }
}

impl ConsentOrchestrationDecision {
    /// Builds a halt whose forensic hash covers the violation payload.
    pub fn halt(violation: SecurityConstraintViolation, escalation_path: EscalationPath) -> Self {
        let forensic_hash = forensic_hash(&violation);
        ConsentOrchestrationDecision::Halt {
            violation,
            forensic_hash,
            escalation_path,
        }
    }

    pub fn defer(
        panel_type: PanelType,
        reason: impl Into<String>,
        timeout_seconds: u32,
        required_signatures: &[&str],
    ) -> Self {
        ConsentOrchestrationDecision::DeferToPanel {
            panel_type,
            reason: reason.into(),
            timeout_seconds,
            required_signatures: required_signatures.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn outcome(&self) -> DecisionOutcome {
        match self {
            ConsentOrchestrationDecision::Proceed => DecisionOutcome::Proceed,
            ConsentOrchestrationDecision::DeferToPanel { .. } => DecisionOutcome::DeferToPanel,
            ConsentOrchestrationDecision::Halt { .. } => DecisionOutcome::Halt,
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, ConsentOrchestrationDecision::Halt { .. })
    }

    /// Flat mapping for debugging and compliance export.
    pub fn summary(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        out.insert("outcome".to_string(), json!(self.outcome().as_str()));
        match self {
            ConsentOrchestrationDecision::Proceed => {}
            ConsentOrchestrationDecision::DeferToPanel {
                panel_type,
                reason,
                timeout_seconds,
                required_signatures,
            } => {
                out.insert("panel_type".to_string(), json!(panel_type.as_str()));
                out.insert("reason".to_string(), json!(reason));
                out.insert("timeout_seconds".to_string(), json!(timeout_seconds));
                out.insert("required_signatures".to_string(), json!(required_signatures));
            }
            ConsentOrchestrationDecision::Halt {
                violation,
                forensic_hash,
                escalation_path,
            } => {
                out.insert("violation".to_string(), json!(violation.kind()));
                out.insert("violation_detail".to_string(), json!(violation));
                out.insert("forensic_hash".to_string(), json!(forensic_hash));
                out.insert("escalation_path".to_string(), json!(escalation_path.as_str()));
            }
        }
        out
    }
}

/// Which tier produced an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationRule {
    InalienableRights,
    ProtectedRights,
    ManagedRights,
    EmergencyLockdown,
    Granted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationVerdict {
    Allowed,
    RequiresPanel,
    Forbidden,
}

/// Result of the tiered rights evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub requires_panel: bool,
    pub reason: String,
    pub veto_by_roles: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub rule: AuthorizationRule,
}

impl AuthorizationDecision {
    pub fn verdict(&self) -> AuthorizationVerdict {
        match (self.allowed, self.requires_panel) {
            (true, _) => AuthorizationVerdict::Allowed,
            (false, true) => AuthorizationVerdict::RequiresPanel,
            (false, false) => AuthorizationVerdict::Forbidden,
        }
    }
}
