// Calibration module - derives mapping thresholds from live input
//
// 1. CalibrationManager collects intensity samples for a fixed duration
// 2. finish() drops IQR outliers and takes the 10th/20th/90th percentiles
// 3. The resulting CalibrationOutcome is folded into MappingConfig by the caller

pub mod manager;
pub mod state;
pub mod stats;

pub use manager::CalibrationManager;
pub use state::{CalibrationOutcome, CalibrationStatus};
