use chrono::{DateTime, Utc};
use neuroconsent_core::{
    ActorClass, AuthorizationRule, AuthorizationVerdict, BioloadBand, ConsentOrchestrationDecision,
    DecisionOutcome, RiskBand,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// One composite decision as handed to audit collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub record_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub subject: String,
    pub operation: String,
    pub actor_class: ActorClass,
    pub bioload_band: BioloadBand,
    pub risk_band: Option<RiskBand>,
    pub risk_score: Option<f64>,
    pub authorization: AuthorizationVerdict,
    pub authorization_rule: AuthorizationRule,
    pub decision: ConsentOrchestrationDecision,
}

impl DecisionRecord {
    pub fn outcome(&self) -> DecisionOutcome {
        self.decision.outcome()
    }
}

/// Receives every record the engine produces. Anchoring, signing and
/// persistence live behind this seam.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &DecisionRecord);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, record: &DecisionRecord) {
        (**self).record(record)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &DecisionRecord) {}
}

/// Forwards each record to every inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutSink {
    fn record(&self, record: &DecisionRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<DecisionRecord>,
    total: u64,
    per_outcome: BTreeMap<&'static str, u64>,
}

/// In-memory ring buffer of the most recent decisions.
#[derive(Debug)]
pub struct BoundedAuditLog {
    capacity: usize,
    recent_limit: usize,
    state: Mutex<LogState>,
}

impl BoundedAuditLog {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, recent_limit: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent_limit,
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `n` newest records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DecisionRecord> {
        let state = self.lock();
        let skip = state.entries.len().saturating_sub(n);
        state.entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
    }

    pub fn summary(&self) -> BTreeMap<String, Value> {
        let recent: Vec<Value> = self
            .recent(self.recent_limit)
            .iter()
            .map(|r| {
                json!({
                    "record_id": r.record_id.to_string(),
                    "subject": r.subject,
                    "operation": r.operation,
                    "outcome": r.outcome().as_str(),
                    "bioload_band": r.bioload_band.as_str(),
                    "risk_band": r.risk_band.map(RiskBand::as_str),
                })
            })
            .collect();

        let state = self.lock();
        let mut out = BTreeMap::new();
        out.insert("total_decisions".to_string(), json!(state.total));
        out.insert("per_outcome".to_string(), json!(state.per_outcome));
        out.insert("retained".to_string(), json!(state.entries.len()));
        out.insert("capacity".to_string(), json!(self.capacity));
        out.insert("recent".to_string(), Value::Array(recent));
        out
    }

    // A panic while holding the lock leaves the buffer consistent, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BoundedAuditLog {
    fn default() -> Self {
        Self::new(1000, 10)
    }
}

impl AuditSink for BoundedAuditLog {
    fn record(&self, record: &DecisionRecord) {
        let mut state = self.lock();
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(record.clone());
        state.total += 1;
        *state.per_outcome.entry(record.outcome().as_str()).or_insert(0) += 1;
    }
}
