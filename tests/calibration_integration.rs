use std::sync::Arc;
use std::time::Duration;

use voice_volume::analysis::MappingConfig;
use voice_volume::calibration::{CalibrationManager, CalibrationStatus};
use voice_volume::config::CalibrationConfig;
use voice_volume::error::CalibrationError;
use voice_volume::time::ManualTimeSource;

fn speech_with_outliers(manager: &mut CalibrationManager) {
    for i in 0..45 {
        manager.add_sample(30.0 + i as f64 * 10.0 / 44.0);
    }
    for _ in 0..5 {
        manager.add_sample(150.0);
    }
}

#[test]
fn outliers_are_discarded_and_thresholds_fall_inside_the_band() {
    let mut manager = CalibrationManager::new(Duration::from_secs(5), 50);
    manager.start();
    speech_with_outliers(&mut manager);

    let outcome = manager.finish().unwrap();
    assert_eq!(manager.status(), CalibrationStatus::Completed);
    assert_eq!(outcome.outliers_rejected, 5);
    assert_eq!(outcome.samples_used, 45);
    assert!((30.0..=40.0).contains(&outcome.noise_floor));
    assert!((30.0..=40.0).contains(&outcome.max_intensity));
    assert!((outcome.noise_floor - 31.0).abs() < 0.1);
    assert!((outcome.max_intensity - 39.0).abs() < 0.1);

    let mapping = MappingConfig::default().with_thresholds(&outcome);
    assert!(!mapping.is_degenerate());
    assert_eq!(mapping.noise_floor, outcome.noise_floor);
}

#[test]
fn session_expires_on_the_injected_clock() {
    let clock = Arc::new(ManualTimeSource::new());
    let config = CalibrationConfig {
        duration_secs: 2.0,
        required_samples: 10,
    };
    let mut manager = CalibrationManager::from_config(&config, clock.clone());
    manager.start();

    clock.advance(Duration::from_secs(1));
    assert!(!manager.is_expired());
    assert!((manager.progress() - 50.0).abs() < 1e-9);

    clock.advance(Duration::from_secs(1));
    assert!(manager.is_expired());
}

#[test]
fn short_session_fails_and_can_be_retried() {
    let mut manager = CalibrationManager::new(Duration::from_secs(5), 50);
    manager.start();
    manager.add_sample(35.0);

    match manager.finish() {
        Err(CalibrationError::InsufficientSamples { required, collected }) => {
            assert_eq!(required, 50);
            assert_eq!(collected, 1);
        }
        other => panic!("Expected InsufficientSamples, got {:?}", other),
    }
    assert_eq!(manager.status(), CalibrationStatus::Failed);
    assert!(manager.outcome().is_none());

    manager.start();
    assert_eq!(manager.sample_count(), 0);
    speech_with_outliers(&mut manager);
    assert!(manager.finish().is_ok());
}
