use serde::{Deserialize, Serialize};
use std::fmt;

/// Programmatic and institutional actors that may request access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorClass {
    SystemScheduler,
    ModelRuntime,
    Regulator,
    Policymaker,
    GovernmentAgency,
    Police,
    Medical,
    FinancialNonMonetary,
    RegionalAuthority,
    Researcher,
    Manufacturer,
    SubjectSelf,
}

impl ActorClass {
    pub const ALL: [ActorClass; 12] = [
        ActorClass::SystemScheduler,
        ActorClass::ModelRuntime,
        ActorClass::Regulator,
        ActorClass::Policymaker,
        ActorClass::GovernmentAgency,
        ActorClass::Police,
        ActorClass::Medical,
        ActorClass::FinancialNonMonetary,
        ActorClass::RegionalAuthority,
        ActorClass::Researcher,
        ActorClass::Manufacturer,
        ActorClass::SubjectSelf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActorClass::SystemScheduler => "SYSTEM_SCHEDULER",
            ActorClass::ModelRuntime => "MODEL_RUNTIME",
            ActorClass::Regulator => "REGULATOR",
            ActorClass::Policymaker => "POLICYMAKER",
            ActorClass::GovernmentAgency => "GOVERNMENT_AGENCY",
            ActorClass::Police => "POLICE",
            ActorClass::Medical => "MEDICAL",
            ActorClass::FinancialNonMonetary => "FINANCIAL_NON_MONETARY",
            ActorClass::RegionalAuthority => "REGIONAL_AUTHORITY",
            ActorClass::Researcher => "RESEARCHER",
            ActorClass::Manufacturer => "MANUFACTURER",
            ActorClass::SubjectSelf => "SUBJECT_SELF",
        }
    }
}

impl fmt::Display for ActorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actor bound to a decentralized identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_class: ActorClass,
    pub did_uri: String, // e.g. "did:bostrom:18sd2ujv24ual9c9pshtxys6j8knh6xaead9ye7"
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Actor {
    pub fn new(actor_class: ActorClass, did_uri: impl Into<String>) -> Self {
        Self {
            actor_class,
            did_uri: did_uri.into(),
            organization: None,
            role: None,
        }
    }
}

/// Inalienable and protected rights flags from the subject's neurorights profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RightsSurface {
    pub neurorights_compliant: bool,
    pub soul_modeling_forbidden: bool,
    pub non_interference_required: bool,
    pub mental_privacy_max: bool,
    pub ecological_surplus_required: bool,
    pub authorship_irrevocable: bool,
    pub consent_withdrawal_instantaneous: bool,
}

/// Regulatory context the request is evaluated under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionProfile {
    pub name: String, // "GDPR", "HIPAA", "ChileNeurorights", ...
    pub region: String,
    pub neurorights_mandatory: bool,
    pub data_residency_required: bool,
    /// Share of the energy budget reserved for ecological surplus.
    pub ecological_surplus_threshold: f64,
}
