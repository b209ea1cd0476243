use crate::calibrator::{CalibrationError, ThresholdCalibrator};
use neuroconsent_core::{ConsentValidator, HostBiophysicalProfile, StakeholderThreshold};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use tracing::{debug, info};

#[derive(Debug)]
struct ProfileSlot {
    current: RwLock<Arc<HostBiophysicalProfile>>,
    calibration: Mutex<()>,
}

impl ProfileSlot {
    fn snapshot(&self) -> Arc<HostBiophysicalProfile> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, next: HostBiophysicalProfile) -> Arc<HostBiophysicalProfile> {
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }
}

/// Subject id to current profile.
///
/// Readers take an `Arc` snapshot and never see a half-written threshold
/// map. Writers for one subject are serialized by a per-subject lock taken
/// with `try_lock`: a second concurrent calibration is rejected, not queued.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    slots: RwLock<BTreeMap<String, Arc<ProfileSlot>>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll(&self, profile: HostBiophysicalProfile) -> Result<Arc<HostBiophysicalProfile>, CalibrationError> {
        let subject = profile.subject_id().to_string();
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&subject) {
            return Err(CalibrationError::AlreadyEnrolled(subject));
        }
        let profile = Arc::new(profile);
        slots.insert(
            subject.clone(),
            Arc::new(ProfileSlot {
                current: RwLock::new(profile.clone()),
                calibration: Mutex::new(()),
            }),
        );
        info!(subject = %subject, "subject enrolled");
        Ok(profile)
    }

    pub fn snapshot(&self, subject: &str) -> Option<Arc<HostBiophysicalProfile>> {
        self.slot(subject).ok().map(|slot| slot.snapshot())
    }

    pub fn subjects(&self) -> Vec<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn calibrate<C: ConsentValidator>(
        &self,
        subject: &str,
        calibrator: &ThresholdCalibrator<C>,
        baseline: &BTreeMap<String, f64>,
    ) -> Result<Arc<HostBiophysicalProfile>, CalibrationError> {
        self.update(subject, |current| calibrator.calibrate_profile(current, baseline))
    }

    pub fn adjust_threshold<C: ConsentValidator>(
        &self,
        subject: &str,
        calibrator: &ThresholdCalibrator<C>,
        proposed: StakeholderThreshold,
    ) -> Result<Arc<HostBiophysicalProfile>, CalibrationError> {
        self.update(subject, |current| calibrator.host_adjust_threshold(current, proposed))
    }

    /// Marks the subject's profile security-immutable. Idempotent.
    pub fn seal(&self, subject: &str) -> Result<Arc<HostBiophysicalProfile>, CalibrationError> {
        let slot = self.slot(subject)?;
        let _writer = Self::try_writer(&slot, subject)?;
        let current = slot.snapshot();
        if current.is_security_immutable() {
            return Ok(current);
        }
        info!(subject, "profile sealed");
        Ok(slot.publish((*current).clone().sealed()))
    }

    fn update<F>(&self, subject: &str, derive: F) -> Result<Arc<HostBiophysicalProfile>, CalibrationError>
    where
        F: FnOnce(&HostBiophysicalProfile) -> Result<HostBiophysicalProfile, CalibrationError>,
    {
        let slot = self.slot(subject)?;
        let _writer = Self::try_writer(&slot, subject)?;
        let current = slot.snapshot();
        let next = derive(current.as_ref())?;
        debug!(subject, thresholds = next.thresholds().len(), "publishing profile");
        Ok(slot.publish(next))
    }

    fn slot(&self, subject: &str) -> Result<Arc<ProfileSlot>, CalibrationError> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .cloned()
            .ok_or_else(|| CalibrationError::UnknownSubject(subject.to_string()))
    }

    fn try_writer<'a>(slot: &'a ProfileSlot, subject: &str) -> Result<MutexGuard<'a, ()>, CalibrationError> {
        match slot.calibration.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                Err(CalibrationError::CalibrationInProgress(subject.to_string()))
            }
        }
    }
}
