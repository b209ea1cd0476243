use chrono::Utc;
use neuroconsent_core::{
    markers, AbsoluteEnvelope, ActorClass, ConsentDecision, ConsentRequest, ConsentValidator,
    HostBiophysicalProfile, ProfileError, ResponseAction, StakeholderThreshold,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

const SAFE_LOWER_RATIO: f64 = 0.9;
const SAFE_UPPER_RATIO: f64 = 1.1;
const CRITICAL_LOWER_RATIO: f64 = 0.7;
const CRITICAL_UPPER_RATIO: f64 = 1.3;
const WARNING_BAND: f64 = 0.15;

pub const CALIBRATE_ACTION: &str = "CALIBRATE_SECURITY_THRESHOLDS";
pub const ADJUST_ACTION_PREFIX: &str = "ADJUST_SECURITY_THRESHOLD";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityRange {
    pub min: f64,
    pub max: f64,
}

/// Physiologically plausible baseline ranges. Markers not listed here are
/// accepted as long as the value is finite and positive.
pub const PLAUSIBILITY_RANGES: [(&str, PlausibilityRange); 4] = [
    (markers::BLOOD_GLUCOSE, PlausibilityRange { min: 50.0, max: 400.0 }),
    (markers::OXYGEN_SPO2, PlausibilityRange { min: 60.0, max: 100.0 }),
    (markers::BLOOD_LACTATE, PlausibilityRange { min: 0.5, max: 20.0 }),
    (markers::WAVE_HRV, PlausibilityRange { min: 20.0, max: 200.0 }),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("baseline {marker}={value} is not plausible (expected {min}..={max})")]
    Implausible {
        marker: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("consent for {action} not granted: {reason}")]
    ConsentNotGranted { action: String, reason: String },
    #[error("critical bounds [{critical_min}, {critical_max}] for {marker} leave the envelope [{min}, {max}]")]
    OutOfEnvelope {
        marker: String,
        critical_min: f64,
        critical_max: f64,
        min: f64,
        max: f64,
    },
    #[error("threshold for {0} is not host customizable")]
    NotCustomizable(String),
    #[error("calibration already in progress for {0}")]
    CalibrationInProgress(String),
    #[error("unknown subject {0}")]
    UnknownSubject(String),
    #[error("subject {0} is already enrolled")]
    AlreadyEnrolled(String),
    #[error("profile for {0} is security-immutable")]
    ProfileSealed(String),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Derives per-subject thresholds from a consented baseline and validates
/// host adjustments against an absolute safety envelope.
///
/// The calibrator never mutates a profile; it returns successors. Publishing
/// them is the registry's job.
#[derive(Debug, Clone)]
pub struct ThresholdCalibrator<C: ConsentValidator> {
    consent: C,
    envelope: AbsoluteEnvelope,
}

impl<C: ConsentValidator> ThresholdCalibrator<C> {
    pub fn new(consent: C) -> Self {
        Self::with_envelope(consent, AbsoluteEnvelope::default())
    }

    pub fn with_envelope(consent: C, envelope: AbsoluteEnvelope) -> Self {
        Self { consent, envelope }
    }

    pub fn envelope(&self) -> &AbsoluteEnvelope {
        &self.envelope
    }

    /// Plausibility first, then subject consent, then derivation.
    pub fn calibrate_baseline_thresholds(
        &self,
        subject_id: &str,
        baseline: &BTreeMap<String, f64>,
    ) -> Result<BTreeMap<String, StakeholderThreshold>, CalibrationError> {
        for (marker, &value) in baseline {
            check_plausible(marker, value)?;
        }

        self.require_consent(ConsentRequest {
            actor_id: subject_id.to_string(),
            actor_class: ActorClass::SubjectSelf,
            action_name: CALIBRATE_ACTION.to_string(),
            data_category: "BIOPHYSICAL_BASELINE".to_string(),
            purpose: Some("SECURITY_PERSONALIZATION".to_string()),
        })?;

        let mut thresholds = BTreeMap::new();
        for (marker, &value) in baseline {
            let threshold = derive_threshold(marker, value);
            threshold.validate(marker)?;
            thresholds.insert(marker.clone(), threshold);
        }
        info!(subject = subject_id, markers = baseline.len(), "baseline thresholds derived");
        Ok(thresholds)
    }

    /// Recalibrated successor of `profile`. The baseline becomes the new
    /// enrollment baseline and fully replaces the threshold set.
    pub fn calibrate_profile(
        &self,
        profile: &HostBiophysicalProfile,
        baseline: &BTreeMap<String, f64>,
    ) -> Result<HostBiophysicalProfile, CalibrationError> {
        if profile.is_security_immutable() {
            return Err(CalibrationError::ProfileSealed(profile.subject_id().to_string()));
        }
        let thresholds = self.calibrate_baseline_thresholds(profile.subject_id(), baseline)?;
        Ok(profile.with_thresholds(thresholds, baseline.clone(), Utc::now())?)
    }

    /// Successor of `profile` with one marker's threshold replaced by
    /// `proposed`. A marker the profile does not track yet is added.
    pub fn host_adjust_threshold(
        &self,
        profile: &HostBiophysicalProfile,
        proposed: StakeholderThreshold,
    ) -> Result<HostBiophysicalProfile, CalibrationError> {
        let subject = profile.subject_id();
        let marker = proposed.stakeholder.clone();
        if profile.is_security_immutable() {
            return Err(CalibrationError::ProfileSealed(subject.to_string()));
        }
        if profile.threshold(&marker).is_some_and(|t| !t.host_customizable) {
            return Err(CalibrationError::NotCustomizable(marker));
        }
        proposed.validate(&marker)?;

        let envelope = self.envelope.for_marker(&marker);
        let inside = proposed.critical_min_value >= envelope.min
            && proposed.critical_max_value <= envelope.max;
        if !inside {
            warn!(
                subject,
                marker = %marker,
                critical_min = proposed.critical_min_value,
                critical_max = proposed.critical_max_value,
                "proposed threshold outside absolute envelope"
            );
            return Err(CalibrationError::OutOfEnvelope {
                marker,
                critical_min: proposed.critical_min_value,
                critical_max: proposed.critical_max_value,
                min: envelope.min,
                max: envelope.max,
            });
        }

        self.require_consent(ConsentRequest {
            actor_id: subject.to_string(),
            actor_class: ActorClass::SubjectSelf,
            action_name: format!("{ADJUST_ACTION_PREFIX}:{marker}"),
            data_category: "SECURITY_PARAMETERS".to_string(),
            purpose: None,
        })?;

        let mut thresholds = profile.thresholds().clone();
        thresholds.insert(marker.clone(), proposed);
        let next = profile.with_thresholds(
            thresholds,
            profile.enrollment_baseline().clone(),
            Utc::now(),
        )?;
        info!(subject, marker = %marker, "threshold adjusted by host");
        Ok(next)
    }

    fn require_consent(&self, request: ConsentRequest) -> Result<(), CalibrationError> {
        match self.consent.validate_action(&request) {
            ConsentDecision::Allowed => Ok(()),
            // A panel hand-off is not consent.
            other => {
                warn!(
                    subject = %request.actor_id,
                    action = %request.action_name,
                    reason = other.reason(),
                    "consent not granted"
                );
                Err(CalibrationError::ConsentNotGranted {
                    action: request.action_name,
                    reason: other.reason().to_string(),
                })
            }
        }
    }
}

fn check_plausible(marker: &str, value: f64) -> Result<(), CalibrationError> {
    let range = PLAUSIBILITY_RANGES
        .iter()
        .find(|(name, _)| *name == marker)
        .map(|(_, range)| *range)
        .unwrap_or(PlausibilityRange {
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        });
    // Ratio-derived bounds invert for a non-positive baseline.
    if value.is_finite() && (range.min..=range.max).contains(&value) {
        return Ok(());
    }
    Err(CalibrationError::Implausible {
        marker: marker.to_string(),
        value,
        min: range.min,
        max: range.max,
    })
}

fn derive_threshold(marker: &str, baseline: f64) -> StakeholderThreshold {
    StakeholderThreshold {
        stakeholder: marker.to_string(),
        min_safe_value: baseline * SAFE_LOWER_RATIO,
        max_safe_value: baseline * SAFE_UPPER_RATIO,
        critical_min_value: baseline * CRITICAL_LOWER_RATIO,
        critical_max_value: baseline * CRITICAL_UPPER_RATIO,
        warning_band: WARNING_BAND,
        response_action: ResponseAction::Throttle,
        override_requires_consent: true,
        host_customizable: true,
    }
}
