//! Consent-gated threshold calibration and the per-subject profile registry
//! that publishes its results.

pub mod calibrator;
pub mod registry;
#[cfg(test)]
mod tests;

pub use calibrator::{CalibrationError, PlausibilityRange, ThresholdCalibrator, PLAUSIBILITY_RANGES};
pub use registry::ProfileRegistry;
