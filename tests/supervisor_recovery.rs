mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{blocks_at, drain_events, fast_config, wait_until};
use voice_volume::analysis::MappingConfig;
use voice_volume::audio::{ScriptStep, ScriptedSource};
use voice_volume::calibration::CalibrationStatus;
use voice_volume::error::{AudioCaptureError, CalibrationError, SupervisorError};
use voice_volume::time::ManualTimeSource;
use voice_volume::volume::SoftwareVolume;
use voice_volume::{StreamState, StreamSupervisor, SupervisorEvent};

const WAIT: Duration = Duration::from_secs(5);

fn stream_failure() -> ScriptStep {
    ScriptStep::Fail(AudioCaptureError::StreamFailure {
        reason: "injected".to_string(),
    })
}

fn transitions(events: &[SupervisorEvent]) -> Vec<(StreamState, StreamState)> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn capture_fault_recovers_and_keeps_monitoring_flag() {
    let source = ScriptedSource::new(blocks_at([40.0, 45.0]));
    source.push(stream_failure());
    source.extend(blocks_at([50.0, 55.0]));

    let (mut supervisor, mut levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(SoftwareVolume::new(0.0)));
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    assert!(supervisor.is_monitoring());

    assert!(wait_until(WAIT, || source.blocks_served() == 4));
    assert!(wait_until(WAIT, || supervisor.state() == StreamState::Running));
    assert!(supervisor.is_monitoring());
    assert_eq!(source.opens(), 2);

    let events = drain_events(&mut events);
    assert_eq!(
        transitions(&events),
        vec![
            (StreamState::Stopped, StreamState::Running),
            (StreamState::Running, StreamState::Recovering),
            (StreamState::Recovering, StreamState::Running),
        ]
    );
    assert!(events.iter().any(|e| matches!(
        e,
        SupervisorEvent::RecoveryScheduled { attempt: 1, delay_ms: 10, .. }
    )));

    supervisor.stop().unwrap();
    assert_eq!(supervisor.state(), StreamState::Stopped);
    assert!(!supervisor.is_monitoring());

    let intensities: Vec<f64> = levels.drain().iter().map(|s| s.intensity.round()).collect();
    assert_eq!(intensities, vec![40.0, 45.0, 50.0, 55.0]);
}

#[test]
fn exhausted_retries_end_in_failed() {
    let source = ScriptedSource::new([ScriptStep::Idle(Duration::from_millis(20)), stream_failure()]);
    let (mut supervisor, _levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(SoftwareVolume::new(0.0)));
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    source.fail_next_opens(usize::MAX);

    assert!(wait_until(WAIT, || supervisor.state() == StreamState::Failed));
    // initial open plus one per attempt
    assert_eq!(source.opens(), 4);
    assert!(supervisor.failure().unwrap().contains("scripted open failure"));
    // Only the caller clears the monitoring flag
    assert!(supervisor.is_monitoring());
    assert_eq!(supervisor.set_sensitivity(1.5), Err(SupervisorError::NotRunning));

    let events = drain_events(&mut events);
    let scheduled: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::RecoveryScheduled { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(scheduled, vec![10, 20, 40]);
    assert!(matches!(events.last(), Some(SupervisorEvent::Failed { .. })));

    // A later start reclaims the pipeline and runs again
    source.fail_next_opens(0);
    supervisor.start().unwrap();
    assert_eq!(supervisor.state(), StreamState::Running);
    assert!(supervisor.failure().is_none());
    supervisor.stop().unwrap();
}

#[test]
fn stop_interrupts_backoff() {
    let mut config = fast_config();
    config.recovery.initial_backoff_ms = 60_000;
    config.recovery.max_backoff_ms = 60_000;
    let source = ScriptedSource::new([stream_failure()]);
    let (mut supervisor, _levels) =
        StreamSupervisor::new(config, source.factory(), Box::new(SoftwareVolume::new(0.0)));

    supervisor.start().unwrap();
    assert!(wait_until(WAIT, || supervisor.state() == StreamState::Recovering));

    let started = Instant::now();
    supervisor.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(supervisor.state(), StreamState::Stopped);
    assert_eq!(source.opens(), 1);
}

#[test]
fn volume_failure_reinitializes_controller() {
    let controller = SoftwareVolume::new(0.0);
    let volume = controller.handle();
    volume.fail_next_writes(1);

    let source = ScriptedSource::new(blocks_at([50.0, 60.0, 70.0]));
    let (mut supervisor, mut levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(controller));

    supervisor.start().unwrap();
    assert!(wait_until(WAIT, || source.blocks_served() == 3));
    assert!(wait_until(WAIT, || volume.writes() == 2));

    assert_eq!(volume.reinitializations(), 1);
    assert_eq!(source.opens(), 2);
    assert_eq!(supervisor.state(), StreamState::Running);
    supervisor.stop().unwrap();

    // The failed block was still published
    assert_eq!(levels.drain().len(), 3);
}

#[test]
fn stalled_source_is_a_fault() {
    let mut config = fast_config();
    config.recovery.stall_timeout_ms = 30;
    config.recovery.max_attempts = 1;
    let source = ScriptedSource::default();
    let (mut supervisor, _levels) =
        StreamSupervisor::new(config, source.factory(), Box::new(SoftwareVolume::new(0.0)));
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    assert!(wait_until(WAIT, || supervisor.state() == StreamState::Failed));

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SupervisorEvent::RecoveryScheduled { cause, .. } if cause.contains("1004")
    )));
    supervisor.stop().unwrap();
}

#[test]
fn start_failure_leaves_supervisor_stopped() {
    let source = ScriptedSource::default();
    source.fail_next_opens(1);
    let (mut supervisor, _levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(SoftwareVolume::new(0.0)));

    match supervisor.start() {
        Err(SupervisorError::StartFailed(AudioCaptureError::DeviceUnavailable { .. })) => {}
        other => panic!("Expected StartFailed, got {:?}", other),
    }
    assert_eq!(supervisor.state(), StreamState::Stopped);
    assert!(!supervisor.is_monitoring());

    supervisor.start().unwrap();
    assert_eq!(supervisor.start(), Err(SupervisorError::AlreadyRunning));
    supervisor.stop().unwrap();
}

#[test]
fn pipeline_state_survives_restart() {
    let source = ScriptedSource::default();
    let (mut supervisor, _levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(SoftwareVolume::new(0.0)));
    assert_eq!(supervisor.start_calibration(), Err(SupervisorError::NotRunning));

    supervisor.start().unwrap();
    let mapping = MappingConfig {
        min_intensity: 35.0,
        max_intensity: 65.0,
        noise_floor: 30.0,
        sensitivity: 1.4,
        curve_exponent: 3.0,
    };
    supervisor.apply_mapping(mapping).unwrap();
    // Commands are FIFO, so the reply proves the mapping was applied
    let reply = supervisor.finish_calibration().unwrap();
    assert!(reply.blocking_recv().unwrap().is_err());
    supervisor.stop().unwrap();

    assert_eq!(supervisor.pipeline().unwrap().mapping(), &mapping);
    supervisor.start().unwrap();
    assert!(supervisor.pipeline().is_none());
    supervisor.stop().unwrap();
    assert_eq!(supervisor.pipeline().unwrap().mapping(), &mapping);
}

#[test]
fn calibration_runs_on_the_capture_thread() {
    let mut config = fast_config();
    config.calibration.required_samples = 50;
    let clock = Arc::new(ManualTimeSource::new());
    let source = ScriptedSource::default();
    let (supervisor, mut levels) =
        StreamSupervisor::new(config, source.factory(), Box::new(SoftwareVolume::new(0.25)));
    let mut supervisor = supervisor.with_time_source(clock.clone());
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    supervisor.start_calibration().unwrap();
    assert!(wait_until(WAIT, || {
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, SupervisorEvent::CalibrationStarted))
    }));

    let speech = (0..45).map(|i| 30.0 + i as f64 * 10.0 / 44.0);
    let shouts = std::iter::repeat(90.0).take(5);
    source.extend(blocks_at(speech.chain(shouts)));
    assert!(wait_until(WAIT, || source.remaining() == 0));

    let outcome = supervisor
        .finish_calibration()
        .unwrap()
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert_eq!(outcome.samples_used, 45);
    assert_eq!(outcome.outliers_rejected, 5);
    assert!(outcome.noise_floor >= 30.0 && outcome.noise_floor < outcome.min_intensity);
    assert!(outcome.max_intensity <= 40.0);

    let finished = drain_events(&mut events);
    assert!(finished
        .iter()
        .any(|e| matches!(e, SupervisorEvent::CalibrationFinished(Ok(_)))));

    supervisor.stop().unwrap();
    let mapping = supervisor.pipeline().unwrap().mapping();
    assert_eq!(mapping.min_intensity, outcome.min_intensity);
    assert_eq!(mapping.max_intensity, outcome.max_intensity);

    // Calibration blocks report the untouched starting volume
    let samples = levels.drain();
    assert_eq!(samples.len(), 50);
    assert!(samples.iter().all(|s| s.volume == 0.25));
}

fn latest_progress(events: &[SupervisorEvent]) -> Option<(f64, usize)> {
    events.iter().rev().find_map(|event| match event {
        SupervisorEvent::CalibrationProgress { percent, samples } => Some((*percent, *samples)),
        _ => None,
    })
}

#[test]
fn calibration_progress_follows_the_clock() {
    let mut config = fast_config();
    config.calibration.duration_secs = 5.0;
    let clock = Arc::new(ManualTimeSource::new());
    let source = ScriptedSource::default();
    let (supervisor, _levels) =
        StreamSupervisor::new(config, source.factory(), Box::new(SoftwareVolume::new(0.0)));
    let mut supervisor = supervisor.with_time_source(clock.clone());
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    supervisor.start_calibration().unwrap();
    assert!(wait_until(WAIT, || {
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, SupervisorEvent::CalibrationStarted))
    }));

    let mut seen = Vec::new();
    clock.advance(Duration::from_secs(2));
    source.extend(blocks_at([35.0]));
    assert!(wait_until(WAIT, || {
        seen.extend(drain_events(&mut events));
        latest_progress(&seen).is_some()
    }));
    let (percent, samples) = latest_progress(&seen).unwrap();
    assert!((percent - 40.0).abs() < 1e-6);
    assert_eq!(samples, 1);

    clock.advance(Duration::from_secs(1));
    source.extend(blocks_at([36.0]));
    assert!(wait_until(WAIT, || {
        seen.extend(drain_events(&mut events));
        latest_progress(&seen).map(|(_, n)| n) == Some(2)
    }));
    let (percent, _) = latest_progress(&seen).unwrap();
    assert!((percent - 60.0).abs() < 1e-6);

    supervisor.stop().unwrap();
}

#[test]
fn stop_abandons_a_running_calibration() {
    let clock = Arc::new(ManualTimeSource::new());
    let source = ScriptedSource::default();
    let (supervisor, _levels) =
        StreamSupervisor::new(fast_config(), source.factory(), Box::new(SoftwareVolume::new(0.0)));
    let mut supervisor = supervisor.with_time_source(clock);
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    let before = supervisor.config().mapping;
    supervisor.start_calibration().unwrap();
    assert!(wait_until(WAIT, || {
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, SupervisorEvent::CalibrationStarted))
    }));
    source.extend(blocks_at([31.0, 32.0, 33.0]));
    let mut seen = Vec::new();
    assert!(wait_until(WAIT, || {
        seen.extend(drain_events(&mut events));
        latest_progress(&seen).map(|(_, n)| n) == Some(3)
    }));

    supervisor.stop().unwrap();
    seen.extend(drain_events(&mut events));
    assert!(seen.iter().any(|e| matches!(
        e,
        SupervisorEvent::CalibrationFinished(Err(CalibrationError::Interrupted { collected: 3 }))
    )));
    let pipeline = supervisor.pipeline().unwrap();
    assert_eq!(pipeline.calibration().status(), CalibrationStatus::Failed);
    assert_eq!(pipeline.mapping(), &before);

    // Nothing is left to finish after a restart
    supervisor.start().unwrap();
    let reply = supervisor.finish_calibration().unwrap();
    assert_eq!(reply.blocking_recv().unwrap(), Err(CalibrationError::NotRunning));
    supervisor.stop().unwrap();
}
