//! Tiered authorization, risk-band orchestration and the composite
//! decision pipeline, plus the audit sink and inference gate around them.

pub mod audit;
pub mod authorization;
pub mod inference_gate;
pub mod orchestrator;
pub mod pipeline;

pub use audit::{AuditSink, BoundedAuditLog, DecisionRecord, FanoutSink, NullAuditSink};
pub use authorization::AuthorizationEngine;
pub use inference_gate::{InferenceGate, InferenceGateDecision, InferenceRequest};
pub use orchestrator::{ConsentOrchestrator, OrchestrationOutcome};
pub use pipeline::{DecisionRequest, EngineOutcome, NeuroConsentEngine};
