use neuroconsent_core::{
    ActorClass, BioloadBand, ConsentDecision, ConsentRequest, ConsentValidator, EngineConfig,
    InferencePolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model_name: String,
    pub subject: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InferenceGateDecision {
    Permitted {
        energy_budget_micro_j: u64,
        max_latency_ms: u32,
        redaction_required: bool,
    },
    RequiresPanel {
        reason: String,
    },
    Blocked {
        reason: String,
    },
}

impl InferenceGateDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, InferenceGateDecision::Permitted { .. })
    }
}

/// Decides whether on-device inference may run under the current bioload
/// band. It never runs the model itself.
#[derive(Debug, Clone)]
pub struct InferenceGate {
    policies: BTreeMap<String, InferencePolicy>,
}

impl Default for InferenceGate {
    fn default() -> Self {
        Self::new(InferencePolicy::defaults())
    }
}

impl InferenceGate {
    /// Later policies replace earlier ones with the same model name.
    pub fn new(policies: impl IntoIterator<Item = InferencePolicy>) -> Self {
        let policies = policies
            .into_iter()
            .map(|p| (p.model_name.clone(), p))
            .collect();
        Self { policies }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.inference_policies.iter().cloned())
    }

    pub fn register_policy(&mut self, policy: InferencePolicy) {
        self.policies.insert(policy.model_name.clone(), policy);
    }

    pub fn policy(&self, model_name: &str) -> Option<&InferencePolicy> {
        self.policies.get(model_name)
    }

    pub fn check(
        &self,
        request: &InferenceRequest,
        band: BioloadBand,
        consent: &dyn ConsentValidator,
    ) -> InferenceGateDecision {
        let decision = self.evaluate(request, band, consent);
        match &decision {
            InferenceGateDecision::Permitted { .. } => {
                debug!(model = %request.model_name, subject = %request.subject, band = %band, "inference permitted")
            }
            InferenceGateDecision::RequiresPanel { reason } | InferenceGateDecision::Blocked { reason } => {
                info!(model = %request.model_name, subject = %request.subject, band = %band, reason = %reason, "inference not permitted")
            }
        }
        decision
    }

    fn evaluate(
        &self,
        request: &InferenceRequest,
        band: BioloadBand,
        consent: &dyn ConsentValidator,
    ) -> InferenceGateDecision {
        let Some(policy) = self.policies.get(&request.model_name) else {
            return blocked(format!("no policy for model {}", request.model_name));
        };
        if !policy.allowed_bands.contains(&band) {
            return blocked(format!("{} not allowed in {} band", policy.model_name, band));
        }
        if !policy.purposes_allowed.iter().any(|p| p == &request.purpose) {
            return blocked(format!("purpose {} not allowed for {}", request.purpose, policy.model_name));
        }

        if policy.requires_explicit_consent {
            let consent_request = ConsentRequest {
                actor_id: request.subject.clone(),
                actor_class: ActorClass::ModelRuntime,
                action_name: format!("ON_DEVICE_INFERENCE:{}", policy.model_name),
                data_category: "NEURAL_TELEMETRY".to_string(),
                purpose: Some(request.purpose.clone()),
            };
            match consent.validate_action(&consent_request) {
                ConsentDecision::Allowed => {}
                ConsentDecision::RequiresPanel { reason } => {
                    return InferenceGateDecision::RequiresPanel { reason }
                }
                ConsentDecision::Forbidden { reason } => return blocked(reason),
            }
        }

        InferenceGateDecision::Permitted {
            energy_budget_micro_j: policy.max_energy_micro_j,
            max_latency_ms: policy.max_latency_ms,
            redaction_required: policy.data_redaction_required,
        }
    }
}

fn blocked(reason: String) -> InferenceGateDecision {
    InferenceGateDecision::Blocked { reason }
}
