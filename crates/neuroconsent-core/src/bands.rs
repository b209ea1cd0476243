use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete safety classification of neural, autonomic and device telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BioloadBand {
    Safe,
    Caution,
    Emergency,
}

impl BioloadBand {
    pub const ALL: [BioloadBand; 3] = [BioloadBand::Safe, BioloadBand::Caution, BioloadBand::Emergency];

    pub fn as_str(self) -> &'static str {
        match self {
            BioloadBand::Safe => "SAFE",
            BioloadBand::Caution => "CAUTION",
            BioloadBand::Emergency => "EMERGENCY",
        }
    }

    /// Gauge encoding: 0 safe, 1 caution, 2 emergency.
    pub fn level(self) -> u8 {
        match self {
            BioloadBand::Safe => 0,
            BioloadBand::Caution => 1,
            BioloadBand::Emergency => 2,
        }
    }
}

impl fmt::Display for BioloadBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const RISK_OPTIMAL_MAX: f64 = 0.3;
pub const RISK_ELEVATED_MAX: f64 = 0.6;
pub const RISK_HIGH_MAX: f64 = 0.8;

/// Classification of the integrated psychophysical risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Optimal,
    Elevated,
    High,
    Critical,
}

impl RiskBand {
    /// Breakpoints 0.3 / 0.6 / 0.8, each upper bound inclusive.
    /// Anything that fails every comparison (including NaN) is critical.
    pub fn from_score(score: f64) -> Self {
        if score <= RISK_OPTIMAL_MAX {
            RiskBand::Optimal
        } else if score <= RISK_ELEVATED_MAX {
            RiskBand::Elevated
        } else if score <= RISK_HIGH_MAX {
            RiskBand::High
        } else {
            RiskBand::Critical
        }
    }

    pub fn recommended_actions(self) -> &'static [&'static str] {
        match self {
            RiskBand::Optimal => &["FULL_AUTHORIZATION"],
            RiskBand::Elevated => &["PANEL_REQUIRED_FOR_SENSITIVE_OPS", "ENHANCED_MONITORING"],
            RiskBand::High => &["THROTTLE_NONCRITICAL", "INCREASE_MONITORING", "PANEL_MANDATORY"],
            RiskBand::Critical => &["EMERGENCY_RESPONSE_ONLY", "AUTOMATIC_SHUTDOWN", "MEDICAL_ALERT"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Optimal => "OPTIMAL",
            RiskBand::Elevated => "ELEVATED",
            RiskBand::High => "HIGH",
            RiskBand::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
