use neuroconsent_core::ConsentOrchestrationDecision;
use neuroconsent_engine::{AuditSink, DecisionRecord};
use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Prometheus view of engine decisions.
///
/// Metrics live in a registry owned by this value, so several instances can
/// coexist in one process.
pub struct DecisionMetrics {
    registry: Registry,
    pub decisions_total: IntCounterVec,
    pub halts_total: IntCounterVec,
    pub risk_score: GaugeVec,
    /// 0 SAFE, 1 CAUTION, 2 EMERGENCY.
    pub bioload_band: GaugeVec,
}

impl DecisionMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions_total = IntCounterVec::new(
            Opts::new("neuroconsent_decisions_total", "Composite decisions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let halts_total = IntCounterVec::new(
            Opts::new("neuroconsent_halts_total", "Halts by escalation path"),
            &["escalation"],
        )?;
        registry.register(Box::new(halts_total.clone()))?;

        let risk_score = GaugeVec::new(
            Opts::new("neuroconsent_risk_score", "Last integrated risk score per subject"),
            &["subject"],
        )?;
        registry.register(Box::new(risk_score.clone()))?;

        let bioload_band = GaugeVec::new(
            Opts::new("neuroconsent_bioload_band", "Last bioload band level per subject"),
            &["subject"],
        )?;
        registry.register(Box::new(bioload_band.clone()))?;

        Ok(Self {
            registry,
            decisions_total,
            halts_total,
            risk_score,
            bioload_band,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observe(&self, record: &DecisionRecord) {
        self.decisions_total
            .with_label_values(&[record.outcome().as_str()])
            .inc();
        if let ConsentOrchestrationDecision::Halt { escalation_path, .. } = &record.decision {
            self.halts_total
                .with_label_values(&[escalation_path.as_str()])
                .inc();
        }
        self.bioload_band
            .with_label_values(&[record.subject.as_str()])
            .set(f64::from(record.bioload_band.level()));
        // No score when the guard halted first; keep the last one.
        if let Some(score) = record.risk_score {
            self.risk_score
                .with_label_values(&[record.subject.as_str()])
                .set(score);
        }
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

impl AuditSink for DecisionMetrics {
    fn record(&self, record: &DecisionRecord) {
        self.observe(record);
        if record.decision.is_halt() {
            warn!(subject = %record.subject, operation = %record.operation, "halt recorded");
        }
    }
}
