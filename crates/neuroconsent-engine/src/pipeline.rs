use crate::audit::{AuditSink, DecisionRecord, NullAuditSink};
use crate::authorization::AuthorizationEngine;
use crate::orchestrator::ConsentOrchestrator;
use bioload_guards::{BandClassifier, RiskModel, RiskScore, RiskScorer};
use chrono::Utc;
use neuroconsent_core::{
    Actor, AuthorizationDecision, AuthorizationVerdict, BioloadBand, ConsentOrchestrationDecision,
    EscalationPath, HostBiophysicalProfile, JurisdictionProfile, PanelType, RightsSurface,
    SecurityConstraintViolation, SubjectBaseline, TelemetrySnapshot,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const NEURORIGHTS_PANEL_TIMEOUT_S: u32 = 60;

/// Everything needed to decide one operation for one subject.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub snapshot: &'a TelemetrySnapshot,
    pub baseline: &'a SubjectBaseline,
    pub profile: &'a HostBiophysicalProfile,
    pub actor: &'a Actor,
    pub rights: &'a RightsSurface,
    pub jurisdiction: &'a JurisdictionProfile,
    pub operation: &'a str,
    pub is_emergency: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineOutcome {
    pub bioload_band: BioloadBand,
    pub risk: Option<RiskScore>,
    pub authorization: AuthorizationDecision,
    pub decision: ConsentOrchestrationDecision,
}

/// Composes band classification, orchestration and tiered authorization into
/// a single fail-closed decision, and reports it to the audit sink.
pub struct NeuroConsentEngine<M: RiskModel = RiskScorer> {
    classifier: BandClassifier,
    orchestrator: ConsentOrchestrator<M>,
    authorization: AuthorizationEngine,
    sink: Arc<dyn AuditSink>,
}

impl NeuroConsentEngine<RiskScorer> {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_model(RiskScorer, sink)
    }
}

impl Default for NeuroConsentEngine<RiskScorer> {
    fn default() -> Self {
        Self::new(Arc::new(NullAuditSink))
    }
}

impl<M: RiskModel> NeuroConsentEngine<M> {
    pub fn with_model(model: M, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            classifier: BandClassifier,
            orchestrator: ConsentOrchestrator::with_model(model),
            authorization: AuthorizationEngine,
            sink,
        }
    }

    pub fn orchestrator(&self) -> &ConsentOrchestrator<M> {
        &self.orchestrator
    }

    pub fn decide(&self, request: &DecisionRequest<'_>) -> EngineOutcome {
        let subject = request.profile.subject_id();
        let bioload_band = self.classifier.classify(request.snapshot, request.baseline);
        let authorization = self.authorization.evaluate(
            request.actor,
            bioload_band,
            request.jurisdiction,
            request.rights,
            subject,
        );

        let (tree, risk) = if request.snapshot.subject != subject {
            warn!(
                subject,
                telemetry_subject = %request.snapshot.subject,
                "telemetry does not belong to profile subject"
            );
            let halt = ConsentOrchestrationDecision::halt(
                SecurityConstraintViolation::BiophysicalIntegrityBreach {
                    reason: format!(
                        "Telemetry subject {} does not match profile",
                        request.snapshot.subject
                    ),
                    host_id: subject.to_string(),
                },
                EscalationPath::TechnicalSupport,
            );
            (halt, None)
        } else {
            let outcome = self.orchestrator.evaluate(
                request.profile,
                &request.snapshot.readings,
                request.operation,
                request.is_emergency,
            );
            (outcome.decision, outcome.risk)
        };

        let decision = combine(tree, &authorization, request.operation, risk.as_ref());
        info!(
            subject,
            operation = request.operation,
            bioload_band = %bioload_band,
            outcome = decision.outcome().as_str(),
            "decision reached"
        );

        let outcome = EngineOutcome {
            bioload_band,
            risk,
            authorization,
            decision,
        };
        self.sink.record(&record_for(request, &outcome));
        outcome
    }
}

/// Tree Halt, then authorization denial, then tree panel, then
/// authorization panel, then Proceed. A tree panel that meets an
/// authorization panel also carries the authorization's veto roles.
fn combine(
    tree: ConsentOrchestrationDecision,
    authorization: &AuthorizationDecision,
    operation: &str,
    risk: Option<&RiskScore>,
) -> ConsentOrchestrationDecision {
    if tree.is_halt() {
        return tree;
    }
    match authorization.verdict() {
        AuthorizationVerdict::Forbidden => ConsentOrchestrationDecision::halt(
            SecurityConstraintViolation::UnauthorizedAccessAttempt {
                attempted_operation: operation.to_string(),
                risk_score: risk.map(|r| r.score).unwrap_or(1.0),
                required_consent: authorization.veto_by_roles.join("|"),
            },
            EscalationPath::NeurorightsReview,
        ),
        AuthorizationVerdict::RequiresPanel
            if matches!(tree, ConsentOrchestrationDecision::DeferToPanel { .. }) =>
        {
            widen_panel(tree, authorization)
        }
        _ if matches!(tree, ConsentOrchestrationDecision::DeferToPanel { .. }) => tree,
        AuthorizationVerdict::RequiresPanel => ConsentOrchestrationDecision::DeferToPanel {
            panel_type: PanelType::NeurorightsPanel,
            reason: authorization.reason.clone(),
            timeout_seconds: NEURORIGHTS_PANEL_TIMEOUT_S,
            required_signatures: authorization.veto_by_roles.clone(),
        },
        AuthorizationVerdict::Allowed => tree,
    }
}

fn widen_panel(
    tree: ConsentOrchestrationDecision,
    authorization: &AuthorizationDecision,
) -> ConsentOrchestrationDecision {
    let ConsentOrchestrationDecision::DeferToPanel {
        panel_type,
        reason,
        timeout_seconds,
        mut required_signatures,
    } = tree
    else {
        return tree;
    };
    for role in &authorization.veto_by_roles {
        if !required_signatures.contains(role) {
            required_signatures.push(role.clone());
        }
    }
    ConsentOrchestrationDecision::DeferToPanel {
        panel_type,
        reason: format!("{reason}; {}", authorization.reason),
        timeout_seconds,
        required_signatures,
    }
}

fn record_for(request: &DecisionRequest<'_>, outcome: &EngineOutcome) -> DecisionRecord {
    DecisionRecord {
        record_id: Uuid::new_v4(),
        recorded_at: Utc::now(),
        subject: request.profile.subject_id().to_string(),
        operation: request.operation.to_string(),
        actor_class: request.actor.actor_class,
        bioload_band: outcome.bioload_band,
        risk_band: outcome.risk.as_ref().map(|r| r.band),
        risk_score: outcome.risk.as_ref().map(|r| r.score),
        authorization: outcome.authorization.verdict(),
        authorization_rule: outcome.authorization.rule,
        decision: outcome.decision.clone(),
    }
}
