pub mod metrics;

pub use metrics::DecisionMetrics;
