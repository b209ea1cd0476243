use neuroconsent_core::{HostBiophysicalProfile, SecurityConstraintViolation};
use std::collections::BTreeMap;
use tracing::error;

/// Fail-fast check of readings against a profile's critical bounds.
///
/// Safe bounds are not consulted. Markers without a threshold are skipped.
/// Readings are visited in marker-name order, so the reported violation is
/// deterministic when several markers are out of bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdGuard;

impl ThresholdGuard {
    pub fn check(
        &self,
        readings: &BTreeMap<String, f64>,
        profile: &HostBiophysicalProfile,
    ) -> Option<SecurityConstraintViolation> {
        for (marker, &value) in readings {
            let Some(threshold) = profile.threshold(marker) else {
                continue;
            };
            // NaN sits outside every bound.
            let crossed = if value.is_nan() {
                Some(threshold.critical_max_value)
            } else {
                threshold.critical_violation(value)
            };
            if let Some(bound) = crossed {
                error!(
                    subject = %profile.subject_id(),
                    marker = %marker,
                    value,
                    bound,
                    "critical threshold violated"
                );
                return Some(SecurityConstraintViolation::ThresholdExceeded {
                    stakeholder: marker.clone(),
                    current_value: value,
                    threshold: bound,
                });
            }
        }
        None
    }
}
