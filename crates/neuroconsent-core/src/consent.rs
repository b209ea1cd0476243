use crate::identity::ActorClass;
use serde::{Deserialize, Serialize};

/// Action submitted to an external consent validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub actor_id: String,
    pub actor_class: ActorClass,
    pub action_name: String,
    pub data_category: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentDecision {
    Allowed,
    RequiresPanel { reason: String },
    Forbidden { reason: String },
}

impl ConsentDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ConsentDecision::Allowed)
    }

    pub fn reason(&self) -> &str {
        match self {
            ConsentDecision::Allowed => "allowed",
            ConsentDecision::RequiresPanel { reason } | ConsentDecision::Forbidden { reason } => {
                reason
            }
        }
    }
}

/// Consent collaborator. Implementations must be callable from any thread.
pub trait ConsentValidator: Send + Sync {
    fn validate_action(&self, request: &ConsentRequest) -> ConsentDecision;
}

impl<F> ConsentValidator for F
where
    F: Fn(&ConsentRequest) -> ConsentDecision + Send + Sync,
{
    fn validate_action(&self, request: &ConsentRequest) -> ConsentDecision {
        self(request)
    }
}

/// Grants exactly the actions a subject requests for themself.
#[derive(Debug, Clone, Default)]
pub struct SubjectSelfConsent;

impl ConsentValidator for SubjectSelfConsent {
    fn validate_action(&self, request: &ConsentRequest) -> ConsentDecision {
        if request.actor_class == ActorClass::SubjectSelf {
            ConsentDecision::Allowed
        } else {
            ConsentDecision::Forbidden {
                reason: format!("{} is not the subject", request.actor_class),
            }
        }
    }
}
