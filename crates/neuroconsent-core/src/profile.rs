use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("profile for {0} has no stakeholder thresholds")]
    EmptyThresholds(String),
    #[error("threshold keyed as {key} describes stakeholder {stakeholder}")]
    MarkerMismatch { key: String, stakeholder: String },
    #[error("critical bounds for {0} are inverted or not finite")]
    InvalidCriticalBounds(String),
}

/// Declared response when a marker leaves its safe band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseAction {
    Throttle,
    Halt,
    Alert,
    OverridePanel,
}

/// Safe and critical bounds for one physiological marker.
///
/// Critical bounds are authoritative: a reading outside them halts the engine.
/// Safe bounds and the warning band are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeholderThreshold {
    pub stakeholder: String,
    pub min_safe_value: f64,
    pub max_safe_value: f64,
    pub critical_min_value: f64,
    pub critical_max_value: f64,
    /// Fractional buffer before the critical bound, e.g. 0.15.
    pub warning_band: f64,
    pub response_action: ResponseAction,
    #[serde(default = "default_true")]
    pub override_requires_consent: bool,
    #[serde(default = "default_true")]
    pub host_customizable: bool,
}

fn default_true() -> bool {
    true
}

impl StakeholderThreshold {
    /// Returns the crossed critical bound, if any.
    pub fn critical_violation(&self, value: f64) -> Option<f64> {
        if value < self.critical_min_value {
            Some(self.critical_min_value)
        } else if value > self.critical_max_value {
            Some(self.critical_max_value)
        } else {
            None
        }
    }

    /// Checks the threshold is usable under `key`: matching marker name and
    /// finite, ordered critical bounds.
    pub fn validate(&self, key: &str) -> Result<(), ProfileError> {
        if self.stakeholder != key {
            return Err(ProfileError::MarkerMismatch {
                key: key.to_string(),
                stakeholder: self.stakeholder.clone(),
            });
        }
        if !self.critical_min_value.is_finite()
            || !self.critical_max_value.is_finite()
            || self.critical_min_value > self.critical_max_value
        {
            return Err(ProfileError::InvalidCriticalBounds(key.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplantDescriptor {
    /// e.g. "CORTICAL_BCI", "PERIPHERAL_NERVE", "RETINAL".
    pub implant_type: String,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawProfile {
    subject_id: String,
    implant: ImplantDescriptor,
    thresholds: BTreeMap<String, StakeholderThreshold>,
    #[serde(default)]
    enrollment_baseline: BTreeMap<String, f64>,
    last_calibrated: DateTime<Utc>,
    #[serde(default)]
    security_immutable: bool,
}

impl TryFrom<RawProfile> for HostBiophysicalProfile {
    type Error = ProfileError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        let mut profile = HostBiophysicalProfile::new(
            raw.subject_id,
            raw.implant,
            raw.thresholds,
            raw.enrollment_baseline,
            raw.last_calibrated,
        )?;
        profile.security_immutable = raw.security_immutable;
        Ok(profile)
    }
}

/// Per-subject threshold set. Construction rejects an empty threshold map.
///
/// There are no setters: an updated profile is a new value produced by
/// [`HostBiophysicalProfile::with_thresholds`] and published through the
/// calibration registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile")]
pub struct HostBiophysicalProfile {
    subject_id: String,
    implant: ImplantDescriptor,
    thresholds: BTreeMap<String, StakeholderThreshold>,
    enrollment_baseline: BTreeMap<String, f64>,
    last_calibrated: DateTime<Utc>,
    security_immutable: bool,
}

impl HostBiophysicalProfile {
    pub fn new(
        subject_id: impl Into<String>,
        implant: ImplantDescriptor,
        thresholds: BTreeMap<String, StakeholderThreshold>,
        enrollment_baseline: BTreeMap<String, f64>,
        last_calibrated: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        let subject_id = subject_id.into();
        if thresholds.is_empty() {
            return Err(ProfileError::EmptyThresholds(subject_id));
        }
        for (key, threshold) in &thresholds {
            threshold.validate(key)?;
        }
        Ok(Self {
            subject_id,
            implant,
            thresholds,
            enrollment_baseline,
            last_calibrated,
            security_immutable: false,
        })
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn implant(&self) -> &ImplantDescriptor {
        &self.implant
    }

    pub fn thresholds(&self) -> &BTreeMap<String, StakeholderThreshold> {
        &self.thresholds
    }

    pub fn threshold(&self, marker: &str) -> Option<&StakeholderThreshold> {
        self.thresholds.get(marker)
    }

    pub fn enrollment_baseline(&self) -> &BTreeMap<String, f64> {
        &self.enrollment_baseline
    }

    pub fn last_calibrated(&self) -> DateTime<Utc> {
        self.last_calibrated
    }

    pub fn is_security_immutable(&self) -> bool {
        self.security_immutable
    }

    /// Marks the profile security-immutable. Sealing is one-way.
    pub fn sealed(mut self) -> Self {
        self.security_immutable = true;
        self
    }

    /// Builds the successor profile carrying a replacement threshold map and
    /// enrollment baseline. The receiver is left untouched.
    pub fn with_thresholds(
        &self,
        thresholds: BTreeMap<String, StakeholderThreshold>,
        enrollment_baseline: BTreeMap<String, f64>,
        calibrated_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        let mut next = Self::new(
            self.subject_id.clone(),
            self.implant.clone(),
            thresholds,
            enrollment_baseline,
            calibrated_at,
        )?;
        next.security_immutable = self.security_immutable;
        Ok(next)
    }
}
