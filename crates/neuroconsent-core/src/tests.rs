use crate::*;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

fn glucose_threshold() -> StakeholderThreshold {
    StakeholderThreshold {
        stakeholder: markers::BLOOD_GLUCOSE.into(),
        min_safe_value: 90.0,
        max_safe_value: 110.0,
        critical_min_value: 70.0,
        critical_max_value: 130.0,
        warning_band: 0.15,
        response_action: ResponseAction::Throttle,
        override_requires_consent: true,
        host_customizable: true,
    }
}

fn implant() -> ImplantDescriptor {
    ImplantDescriptor {
        implant_type: "CORTICAL_BCI".into(),
        location: "M1_region_left_hemisphere".into(),
    }
}

#[test]
fn profile_without_thresholds_is_rejected() {
    let err = HostBiophysicalProfile::new(
        "host-1",
        implant(),
        BTreeMap::new(),
        BTreeMap::new(),
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    )
    .unwrap_err();
    assert_eq!(err, ProfileError::EmptyThresholds("host-1".into()));
}

#[test]
fn profile_rejects_mismatched_marker_key() {
    let mut thresholds = BTreeMap::new();
    thresholds.insert(markers::BLOOD_LACTATE.to_string(), glucose_threshold());
    let err = HostBiophysicalProfile::new("host-1", implant(), thresholds, BTreeMap::new(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, ProfileError::MarkerMismatch { .. }));
}

#[test]
fn deserializing_empty_profile_fails() {
    let raw = r#"{
        "subject_id": "host-1",
        "implant": {"implant_type": "RETINAL", "location": "left"},
        "thresholds": {},
        "last_calibrated": "2026-01-01T00:00:00Z"
    }"#;
    let parsed: Result<HostBiophysicalProfile, _> = serde_json::from_str(raw);
    assert!(parsed.is_err());
}

#[test]
fn profile_json_keeps_seal_flag() {
    let mut thresholds = BTreeMap::new();
    thresholds.insert(markers::BLOOD_GLUCOSE.to_string(), glucose_threshold());
    let profile = HostBiophysicalProfile::new("host-1", implant(), thresholds, BTreeMap::new(), Utc::now())
        .unwrap()
        .sealed();
    let raw = serde_json::to_string(&profile).unwrap();
    let back: HostBiophysicalProfile = serde_json::from_str(&raw).unwrap();
    assert!(back.is_security_immutable());
    assert_eq!(back, profile);
}

#[test]
fn critical_violation_reports_crossed_bound() {
    let t = glucose_threshold();
    assert_eq!(t.critical_violation(250.0), Some(130.0));
    assert_eq!(t.critical_violation(50.0), Some(70.0));
    assert_eq!(t.critical_violation(130.0), None);
    assert_eq!(t.critical_violation(70.0), None);
}

#[test]
fn risk_band_breakpoints_are_upper_inclusive() {
    assert_eq!(RiskBand::from_score(0.0), RiskBand::Optimal);
    assert_eq!(RiskBand::from_score(0.3), RiskBand::Optimal);
    assert_eq!(RiskBand::from_score(0.3000001), RiskBand::Elevated);
    assert_eq!(RiskBand::from_score(0.6), RiskBand::Elevated);
    assert_eq!(RiskBand::from_score(0.8), RiskBand::High);
    assert_eq!(RiskBand::from_score(0.81), RiskBand::Critical);
    assert_eq!(RiskBand::from_score(f64::NAN), RiskBand::Critical);
}

#[test]
fn forensic_hash_is_stable_per_payload() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let value: f64 = rng.gen_range(0.0..500.0);
        let violation = SecurityConstraintViolation::ThresholdExceeded {
            stakeholder: markers::BLOOD_GLUCOSE.into(),
            current_value: value,
            threshold: 130.0,
        };
        let a = forensic_hash(&violation);
        let b = forensic_hash(&violation.clone());
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 2 + 64);
    }
}

#[test]
fn halt_summary_names_violation_and_escalation() {
    let decision = ConsentOrchestrationDecision::halt(
        SecurityConstraintViolation::BiophysicalIntegrityBreach {
            reason: "risk computation failed".into(),
            host_id: "host-1".into(),
        },
        EscalationPath::TechnicalSupport,
    );
    let summary = decision.summary();
    assert_eq!(summary["outcome"], "HALT");
    assert_eq!(summary["violation"], "BIOPHYSICAL_INTEGRITY_BREACH");
    assert_eq!(summary["escalation_path"], "TECHNICAL_SUPPORT");
}

#[test]
fn authorization_verdict_follows_flags() {
    let mut decision = AuthorizationDecision {
        allowed: false,
        requires_panel: true,
        reason: "panel".into(),
        veto_by_roles: vec![],
        recommended_actions: vec![],
        rule: AuthorizationRule::ProtectedRights,
    };
    assert_eq!(decision.verdict(), AuthorizationVerdict::RequiresPanel);
    decision.requires_panel = false;
    assert_eq!(decision.verdict(), AuthorizationVerdict::Forbidden);
    decision.allowed = true;
    assert_eq!(decision.verdict(), AuthorizationVerdict::Allowed);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let config = EngineConfig::from_json_str(r#"{"audit_capacity": 16}"#).unwrap();
    assert_eq!(config.audit_capacity, 16);
    assert_eq!(config.audit_recent_entries, 10);
    assert_eq!(config.inference_policies.len(), 4);
    assert_eq!(config.absolute_envelope.for_marker("blood.glucose").max, 1000.0);
}

#[test]
fn subject_self_consent_only_allows_subject() {
    let mut request = ConsentRequest {
        actor_id: "host-1".into(),
        actor_class: ActorClass::SubjectSelf,
        action_name: "CALIBRATE_SECURITY_THRESHOLDS".into(),
        data_category: "BIOPHYSICAL_BASELINE".into(),
        purpose: None,
    };
    assert!(SubjectSelfConsent.validate_action(&request).is_allowed());
    request.actor_class = ActorClass::Researcher;
    assert!(!SubjectSelfConsent.validate_action(&request).is_allowed());
}
