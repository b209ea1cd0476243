//! Shared data model for the neuro-consent decision engine: telemetry,
//! subject profiles, identities, bands, violations and decisions.

pub mod bands;
pub mod config;
pub mod consent;
pub mod decision;
pub mod forensic;
pub mod identity;
pub mod profile;
pub mod telemetry;
#[cfg(test)]
mod tests;

pub use bands::{BioloadBand, RiskBand};
pub use config::{AbsoluteEnvelope, ConfigError, EngineConfig, InferencePolicy, MarkerEnvelope};
pub use consent::{ConsentDecision, ConsentRequest, ConsentValidator, SubjectSelfConsent};
pub use decision::{
    AuthorizationDecision, AuthorizationRule, AuthorizationVerdict, ConsentOrchestrationDecision,
    DecisionOutcome, EscalationPath, PanelType, SecurityConstraintViolation,
};
pub use forensic::forensic_hash;
pub use identity::{Actor, ActorClass, JurisdictionProfile, RightsSurface};
pub use profile::{
    HostBiophysicalProfile, ImplantDescriptor, ProfileError, ResponseAction, StakeholderThreshold,
};
pub use telemetry::{markers, SubjectBaseline, TelemetryProvider, TelemetrySnapshot};
