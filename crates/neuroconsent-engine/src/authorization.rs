use neuroconsent_core::{
    Actor, ActorClass, AuthorizationDecision, AuthorizationRule, BioloadBand, JurisdictionProfile,
    RightsSurface,
};
use tracing::{debug, info};

/// Tiered rights evaluation. Tiers run in a fixed order and the first
/// applicable denial is returned:
///
/// 1. inalienable: soul modeling forbidden, nothing overrides it
/// 2. protected: CAUTION band, only MEDICAL passes without a panel
/// 3. managed: SAFE band, researchers need explicit subject consent
/// 4. lockdown: EMERGENCY band, only MEDICAL and SYSTEM_SCHEDULER pass
///
/// The jurisdiction is recorded in the trace but does not alter any tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationEngine;

impl AuthorizationEngine {
    pub fn evaluate(
        &self,
        actor: &Actor,
        band: BioloadBand,
        jurisdiction: &JurisdictionProfile,
        rights: &RightsSurface,
        subject: &str,
    ) -> AuthorizationDecision {
        let decision = Self::tiers(actor.actor_class, band, rights);
        if decision.allowed {
            debug!(
                subject,
                actor = %actor.actor_class,
                did = %actor.did_uri,
                band = %band,
                jurisdiction = %jurisdiction.name,
                "authorization granted"
            );
        } else {
            info!(
                subject,
                actor = %actor.actor_class,
                did = %actor.did_uri,
                band = %band,
                jurisdiction = %jurisdiction.name,
                rule = ?decision.rule,
                requires_panel = decision.requires_panel,
                "authorization denied"
            );
        }
        decision
    }

    fn tiers(class: ActorClass, band: BioloadBand, rights: &RightsSurface) -> AuthorizationDecision {
        if rights.soul_modeling_forbidden {
            return deny(
                AuthorizationRule::InalienableRights,
                "TIER_1_VIOLATION: Soul modeling forbidden by neurorights profile",
                false,
                &["SUBJECT_ONLY"],
            );
        }

        if band == BioloadBand::Caution && class != ActorClass::Medical {
            return deny(
                AuthorizationRule::ProtectedRights,
                "TIER_2_PROTECTION: Yellow band active, panel required for non-medical actors",
                true,
                &["SUBJECT", "MEDICAL", "ETHICS_PANEL"],
            );
        }

        if band == BioloadBand::Safe && class == ActorClass::Researcher {
            return deny(
                AuthorizationRule::ManagedRights,
                "TIER_3_MANAGED: Researchers cannot access without explicit subject consent",
                false,
                &["SUBJECT", "ETHICS_COMMITTEE"],
            );
        }

        if band == BioloadBand::Emergency
            && !matches!(class, ActorClass::Medical | ActorClass::SystemScheduler)
        {
            return deny(
                AuthorizationRule::EmergencyLockdown,
                "RED_BAND_LOCKDOWN: Only Medical and System Scheduler allowed",
                false,
                &["EMERGENCY_ONLY"],
            );
        }

        AuthorizationDecision {
            allowed: true,
            requires_panel: false,
            reason: "AUTHORIZATION_GRANTED".to_string(),
            veto_by_roles: Vec::new(),
            recommended_actions: vec!["LOG_TO_LEDGER".to_string(), "AUDIT_TRACE".to_string()],
            rule: AuthorizationRule::Granted,
        }
    }
}

fn deny(
    rule: AuthorizationRule,
    reason: &str,
    requires_panel: bool,
    veto_by_roles: &[&str],
) -> AuthorizationDecision {
    AuthorizationDecision {
        allowed: false,
        requires_panel,
        reason: reason.to_string(),
        veto_by_roles: veto_by_roles.iter().map(|r| r.to_string()).collect(),
        recommended_actions: Vec::new(),
        rule,
    }
}
