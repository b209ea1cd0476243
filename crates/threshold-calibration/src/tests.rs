use crate::*;
use bioload_guards::ThresholdGuard;
use chrono::Utc;
use neuroconsent_core::{
    markers, AbsoluteEnvelope, ConsentDecision, ConsentRequest, ConsentValidator, HostBiophysicalProfile,
    ImplantDescriptor, MarkerEnvelope, ProfileError, ResponseAction, SecurityConstraintViolation,
    StakeholderThreshold, SubjectSelfConsent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;

fn baseline(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn refuse(_: &ConsentRequest) -> ConsentDecision {
    ConsentDecision::Forbidden {
        reason: "subject declined".into(),
    }
}

fn enrolled_profile() -> HostBiophysicalProfile {
    let thresholds = ThresholdCalibrator::new(SubjectSelfConsent)
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]))
        .unwrap();
    HostBiophysicalProfile::new(
        "host-1",
        ImplantDescriptor {
            implant_type: "CORTICAL_BCI".into(),
            location: "M1_region_left_hemisphere".into(),
        },
        thresholds,
        baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]),
        Utc::now(),
    )
    .unwrap()
}

fn proposal(marker: &str, critical_min: f64, critical_max: f64) -> StakeholderThreshold {
    StakeholderThreshold {
        stakeholder: marker.to_string(),
        min_safe_value: critical_min,
        max_safe_value: critical_max,
        critical_min_value: critical_min,
        critical_max_value: critical_max,
        warning_band: 0.15,
        response_action: ResponseAction::Alert,
        override_requires_consent: true,
        host_customizable: true,
    }
}

#[test]
fn glucose_baseline_of_100_yields_critical_max_130() {
    let thresholds = ThresholdCalibrator::new(SubjectSelfConsent)
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]))
        .unwrap();
    let glucose = &thresholds[markers::BLOOD_GLUCOSE];
    assert_eq!(glucose.critical_max_value, 130.0);
    assert_eq!(glucose.critical_min_value, 70.0);
    assert!((glucose.min_safe_value - 90.0).abs() < 1e-9);
    assert!((glucose.max_safe_value - 110.0).abs() < 1e-9);
    assert_eq!(glucose.warning_band, 0.15);
    assert_eq!(glucose.response_action, ResponseAction::Throttle);
}

#[test]
fn calibrated_profile_trips_guard_at_glucose_250() {
    let profile = enrolled_profile();
    let violation = ThresholdGuard.check(&baseline(&[(markers::BLOOD_GLUCOSE, 250.0)]), &profile);
    assert_eq!(
        violation,
        Some(SecurityConstraintViolation::ThresholdExceeded {
            stakeholder: markers::BLOOD_GLUCOSE.into(),
            current_value: 250.0,
            threshold: 130.0,
        })
    );
}

#[test]
fn implausible_glucose_is_rejected() {
    let err = ThresholdCalibrator::new(SubjectSelfConsent)
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::BLOOD_GLUCOSE, 30.0)]))
        .unwrap_err();
    assert_eq!(
        err,
        CalibrationError::Implausible {
            marker: markers::BLOOD_GLUCOSE.into(),
            value: 30.0,
            min: 50.0,
            max: 400.0,
        }
    );
}

#[test]
fn non_finite_baseline_is_implausible_even_for_unlisted_markers() {
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    for value in [f64::NAN, f64::INFINITY] {
        let err = calibrator
            .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::DW_GSR, value)]))
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Implausible { .. }));
    }
    // Unlisted markers are otherwise accepted.
    let thresholds = calibrator
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::DW_GSR, 5.0)]))
        .unwrap();
    assert!(thresholds.contains_key(markers::DW_GSR));
}

#[test]
fn non_positive_baseline_never_yields_inverted_bounds() {
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    for value in [-5.0, 0.0] {
        let err = calibrator
            .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::DW_GSR, value)]))
            .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::Implausible { ref marker, value: v, .. } if marker == markers::DW_GSR && v == value
        ));
    }

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let value = rng.gen_range(0.001..=5000.0);
        let thresholds = calibrator
            .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::DW_GSR, value)]))
            .unwrap();
        let gsr = &thresholds[markers::DW_GSR];
        assert!(gsr.critical_min_value <= gsr.critical_max_value);
        assert!(gsr.validate(markers::DW_GSR).is_ok());
    }
}

#[test]
fn calibration_without_consent_is_rejected_for_any_baseline() {
    let mut rng = StdRng::seed_from_u64(3);
    let calibrator = ThresholdCalibrator::new(refuse);
    for _ in 0..100 {
        let plausible = baseline(&[
            (markers::BLOOD_GLUCOSE, rng.gen_range(50.0..=400.0)),
            (markers::OXYGEN_SPO2, rng.gen_range(60.0..=100.0)),
            (markers::BLOOD_LACTATE, rng.gen_range(0.5..=20.0)),
            (markers::WAVE_HRV, rng.gen_range(20.0..=200.0)),
        ]);
        let err = calibrator
            .calibrate_baseline_thresholds("host-1", &plausible)
            .unwrap_err();
        match err {
            CalibrationError::ConsentNotGranted { action, reason } => {
                assert_eq!(action, "CALIBRATE_SECURITY_THRESHOLDS");
                assert_eq!(reason, "subject declined");
            }
            other => panic!("expected consent rejection, got {other:?}"),
        }
    }
}

#[test]
fn panel_hand_off_is_not_consent() {
    let calibrator = ThresholdCalibrator::new(|_: &ConsentRequest| ConsentDecision::RequiresPanel {
        reason: "ethics review".into(),
    });
    let err = calibrator
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]))
        .unwrap_err();
    assert!(matches!(err, CalibrationError::ConsentNotGranted { .. }));
}

#[test]
fn calibration_asks_the_subject() {
    let calibrator = ThresholdCalibrator::new(|request: &ConsentRequest| {
        assert_eq!(request.actor_id, "host-1");
        assert_eq!(request.data_category, "BIOPHYSICAL_BASELINE");
        SubjectSelfConsent.validate_action(request)
    });
    calibrator
        .calibrate_baseline_thresholds("host-1", &baseline(&[(markers::OXYGEN_SPO2, 97.0)]))
        .unwrap();
}

#[test]
fn adjustment_outside_envelope_is_rejected() {
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    let profile = enrolled_profile();
    let err = calibrator
        .host_adjust_threshold(&profile, proposal(markers::BLOOD_GLUCOSE, 60.0, 1200.0))
        .unwrap_err();
    assert!(matches!(err, CalibrationError::OutOfEnvelope { max, .. } if max == 1000.0));

    let err = calibrator
        .host_adjust_threshold(&profile, proposal(markers::BLOOD_GLUCOSE, -5.0, 140.0))
        .unwrap_err();
    assert!(matches!(err, CalibrationError::OutOfEnvelope { .. }));
}

#[test]
fn per_marker_envelope_overrides_default() {
    let mut envelope = AbsoluteEnvelope::default();
    envelope
        .per_marker
        .insert(markers::OXYGEN_SPO2.into(), MarkerEnvelope { min: 50.0, max: 100.0 });
    let calibrator = ThresholdCalibrator::with_envelope(SubjectSelfConsent, envelope);
    let err = calibrator
        .host_adjust_threshold(&enrolled_profile(), proposal(markers::OXYGEN_SPO2, 80.0, 110.0))
        .unwrap_err();
    assert!(matches!(err, CalibrationError::OutOfEnvelope { .. }));
}

#[test]
fn adjustment_requires_consent_and_keeps_other_markers() {
    let profile = enrolled_profile();
    let err = ThresholdCalibrator::new(refuse)
        .host_adjust_threshold(&profile, proposal(markers::OXYGEN_SPO2, 88.0, 100.0))
        .unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::ConsentNotGranted { ref action, .. } if action == "ADJUST_SECURITY_THRESHOLD:oxygen.spo2"
    ));

    let next = ThresholdCalibrator::new(SubjectSelfConsent)
        .host_adjust_threshold(&profile, proposal(markers::OXYGEN_SPO2, 88.0, 100.0))
        .unwrap();
    assert_eq!(next.thresholds().len(), 2);
    assert_eq!(next.threshold(markers::BLOOD_GLUCOSE), profile.threshold(markers::BLOOD_GLUCOSE));
    assert_eq!(next.threshold(markers::OXYGEN_SPO2).map(|t| t.critical_min_value), Some(88.0));
    // The source profile is a value and stays as it was.
    assert_eq!(profile.thresholds().len(), 1);
}

#[test]
fn locked_thresholds_cannot_be_adjusted() {
    let mut locked = proposal(markers::BLOOD_GLUCOSE, 70.0, 130.0);
    locked.host_customizable = false;
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    let profile = calibrator.host_adjust_threshold(&enrolled_profile(), locked).unwrap();
    let err = calibrator
        .host_adjust_threshold(&profile, proposal(markers::BLOOD_GLUCOSE, 60.0, 140.0))
        .unwrap_err();
    assert_eq!(err, CalibrationError::NotCustomizable(markers::BLOOD_GLUCOSE.into()));
}

#[test]
fn inverted_proposal_is_rejected_before_consent_is_asked() {
    let asked = AtomicUsize::new(0);
    let calibrator = ThresholdCalibrator::new(|request: &ConsentRequest| {
        asked.fetch_add(1, Ordering::SeqCst);
        SubjectSelfConsent.validate_action(request)
    });
    let err = calibrator
        .host_adjust_threshold(&enrolled_profile(), proposal(markers::BLOOD_GLUCOSE, 140.0, 60.0))
        .unwrap_err();
    assert_eq!(
        err,
        CalibrationError::Profile(ProfileError::InvalidCriticalBounds(markers::BLOOD_GLUCOSE.into()))
    );
    assert_eq!(asked.load(Ordering::SeqCst), 0);
}

// Registry

#[test]
fn registry_publishes_recalibrated_profile() {
    let registry = ProfileRegistry::new();
    let before = registry.enroll(enrolled_profile()).unwrap();
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);

    let after = registry
        .calibrate("host-1", &calibrator, &baseline(&[(markers::BLOOD_GLUCOSE, 120.0)]))
        .unwrap();
    assert_eq!(after.threshold(markers::BLOOD_GLUCOSE).map(|t| t.critical_max_value), Some(156.0));
    assert_eq!(registry.snapshot("host-1").as_deref(), Some(after.as_ref()));
    // Earlier snapshots are untouched.
    assert_eq!(before.threshold(markers::BLOOD_GLUCOSE).map(|t| t.critical_max_value), Some(130.0));

    assert_eq!(
        registry.enroll(enrolled_profile()).unwrap_err(),
        CalibrationError::AlreadyEnrolled("host-1".into())
    );
    assert_eq!(registry.subjects(), vec!["host-1".to_string()]);
}

#[test]
fn failed_calibration_leaves_profile_in_place() {
    let registry = ProfileRegistry::new();
    let before = registry.enroll(enrolled_profile()).unwrap();
    let err = registry
        .calibrate(
            "host-1",
            &ThresholdCalibrator::new(SubjectSelfConsent),
            &baseline(&[(markers::BLOOD_GLUCOSE, 30.0)]),
        )
        .unwrap_err();
    assert!(matches!(err, CalibrationError::Implausible { .. }));
    assert_eq!(registry.snapshot("host-1"), Some(before));
}

#[test]
fn unknown_subject_is_reported() {
    let registry = ProfileRegistry::new();
    let err = registry
        .calibrate(
            "ghost",
            &ThresholdCalibrator::new(SubjectSelfConsent),
            &baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]),
        )
        .unwrap_err();
    assert_eq!(err, CalibrationError::UnknownSubject("ghost".into()));
    assert!(registry.snapshot("ghost").is_none());
}

#[test]
fn sealed_profile_rejects_every_mutation() {
    let registry = ProfileRegistry::new();
    registry.enroll(enrolled_profile()).unwrap();
    let sealed = registry.seal("host-1").unwrap();
    assert!(sealed.is_security_immutable());
    assert!(registry.seal("host-1").unwrap().is_security_immutable());

    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    let err = registry
        .calibrate("host-1", &calibrator, &baseline(&[(markers::BLOOD_GLUCOSE, 110.0)]))
        .unwrap_err();
    assert_eq!(err, CalibrationError::ProfileSealed("host-1".into()));
    let err = registry
        .adjust_threshold("host-1", &calibrator, proposal(markers::BLOOD_GLUCOSE, 60.0, 140.0))
        .unwrap_err();
    assert_eq!(err, CalibrationError::ProfileSealed("host-1".into()));
}

#[test]
fn concurrent_calibration_of_one_subject_is_rejected() {
    let registry = ProfileRegistry::new();
    registry.enroll(enrolled_profile()).unwrap();
    let entered = Barrier::new(2);
    let release = Barrier::new(2);

    // Holds the subject's calibration lock while consent is pending.
    let slow = ThresholdCalibrator::new(|request: &ConsentRequest| {
        entered.wait();
        release.wait();
        SubjectSelfConsent.validate_action(request)
    });
    let fast = ThresholdCalibrator::new(SubjectSelfConsent);

    std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            registry.calibrate("host-1", &slow, &baseline(&[(markers::BLOOD_GLUCOSE, 120.0)]))
        });

        entered.wait();
        let second = registry.calibrate("host-1", &fast, &baseline(&[(markers::BLOOD_GLUCOSE, 90.0)]));
        assert_eq!(second.unwrap_err(), CalibrationError::CalibrationInProgress("host-1".into()));
        // Readers are not blocked by a pending calibration.
        let during = registry.snapshot("host-1").unwrap();
        assert_eq!(during.threshold(markers::BLOOD_GLUCOSE).map(|t| t.critical_max_value), Some(130.0));
        release.wait();

        let published = first.join().unwrap().unwrap();
        assert_eq!(published.threshold(markers::BLOOD_GLUCOSE).map(|t| t.critical_max_value), Some(156.0));
    });

    // Lock released: a later calibration goes through.
    registry
        .calibrate("host-1", &fast, &baseline(&[(markers::BLOOD_GLUCOSE, 100.0)]))
        .unwrap();
}

#[test]
fn readers_see_whole_threshold_maps_under_concurrent_writes() {
    let registry = ProfileRegistry::new();
    registry.enroll(enrolled_profile()).unwrap();
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..200 {
                let glucose = if i % 2 == 0 { 100.0 } else { 200.0 };
                let spo2 = if i % 2 == 0 { 95.0 } else { 90.0 };
                registry
                    .calibrate(
                        "host-1",
                        &calibrator,
                        &baseline(&[(markers::BLOOD_GLUCOSE, glucose), (markers::OXYGEN_SPO2, spo2)]),
                    )
                    .unwrap();
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..500 {
                    let profile = registry.snapshot("host-1").unwrap();
                    let glucose = profile.enrollment_baseline().get(markers::BLOOD_GLUCOSE).copied();
                    let spo2 = profile.enrollment_baseline().get(markers::OXYGEN_SPO2).copied();
                    let whole = [(Some(100.0), None), (Some(100.0), Some(95.0)), (Some(200.0), Some(90.0))];
                    assert!(whole.contains(&(glucose, spo2)), "torn profile: {glucose:?} {spo2:?}");
                    let expected_max = glucose.map(|g| g * 1.3);
                    assert_eq!(
                        profile.threshold(markers::BLOOD_GLUCOSE).map(|t| t.critical_max_value),
                        expected_max
                    );
                }
            });
        }
    });
}
