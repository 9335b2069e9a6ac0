//! StreamSupervisor: capture lifecycle, recovery and control surface.
//!
//! The supervisor owns one capture thread at a time. Pipeline state
//! (calibration, mapping, smoothing, controller and the channel producer)
//! moves into that thread on `start()` and comes back out of its
//! `JoinHandle` on `stop()`, so nothing is shared behind a lock and a later
//! `start()` picks up where the last run left off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::analysis::MappingConfig;
use crate::audio::{CaptureSourceFactory, StreamSpec};
use crate::channel::{level_channel, LevelReceiver};
use crate::config::AppConfig;
use crate::engine::events::{CalibrationResult, ControlCommand, SupervisorEvent};
use crate::engine::pipeline::Pipeline;
use crate::engine::state::{StatusHandle, StreamState};
use crate::engine::worker::{CaptureWorker, StopSignal, WorkerState};
use crate::error::{log_supervisor_error, AudioCaptureError, SupervisorError};
use crate::logging::LoggingContext;
use crate::time::{SystemTimeSource, TimeSource};
use crate::volume::VolumeController;

const EVENT_CAPACITY: usize = 256;

/// Owns the capture thread and exposes start/stop and control commands
pub struct StreamSupervisor {
    config: AppConfig,
    spec: StreamSpec,
    /// Pipeline state while no thread is running
    parked: Option<WorkerState>,
    worker: Option<JoinHandle<WorkerState>>,
    status: StatusHandle,
    monitoring: Arc<AtomicBool>,
    stop: Arc<StopSignal>,
    commands: mpsc::UnboundedSender<ControlCommand>,
    logging: Option<LoggingContext>,
}

impl StreamSupervisor {
    /// Build a stopped supervisor and the receiving end of its level channel
    pub fn new<F>(
        config: AppConfig,
        factory: F,
        controller: Box<dyn VolumeController>,
    ) -> (Self, LevelReceiver)
    where
        F: CaptureSourceFactory + 'static,
    {
        let config = config.sanitized();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let status = StatusHandle::new(events);
        let (sender, receiver) = level_channel(config.channel.capacity);
        let (commands, command_rx) = mpsc::unbounded_channel();

        let pipeline = Pipeline::new(
            &config,
            controller,
            sender,
            Arc::new(SystemTimeSource::default()),
            status.events(),
        );

        let supervisor = Self {
            spec: StreamSpec::from_config(&config.audio),
            config,
            parked: Some(WorkerState {
                pipeline,
                factory: Box::new(factory),
                commands: command_rx,
            }),
            worker: None,
            status,
            monitoring: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(StopSignal::default()),
            commands,
            logging: None,
        };
        (supervisor, receiver)
    }

    /// Route capture-thread logs to `logging`
    pub fn with_logging(mut self, logging: LoggingContext) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Use `time_source` for calibration timing
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        if let Some(parked) = self.parked.as_mut() {
            parked.pipeline.set_time_source(time_source);
        }
        self
    }

    /// Spawn the capture thread and wait until the source is running
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        self.reap_finished_worker()?;
        if self.worker.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }
        let state = self.parked.take().ok_or(SupervisorError::WorkerPanicked)?;

        self.stop.reset();
        self.status.clear_failure();
        self.monitoring.store(true, Ordering::SeqCst);

        let worker = CaptureWorker::new(
            state,
            self.spec,
            self.config.recovery.clone(),
            self.status.clone(),
            Arc::clone(&self.stop),
            self.logging.clone(),
        );
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || worker.run(ready_tx))
            .map_err(|e| {
                self.monitoring.store(false, Ordering::SeqCst);
                SupervisorError::StartFailed(AudioCaptureError::from(e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                tracing::info!("[StreamSupervisor] Monitoring started");
                Ok(())
            }
            Ok(Err(cause)) => {
                self.monitoring.store(false, Ordering::SeqCst);
                self.parked = handle.join().ok();
                let err = SupervisorError::StartFailed(cause);
                log_supervisor_error(&err, "start");
                Err(err)
            }
            Err(_) => {
                self.monitoring.store(false, Ordering::SeqCst);
                self.parked = handle.join().ok();
                let err = SupervisorError::WorkerPanicked;
                log_supervisor_error(&err, "start");
                Err(err)
            }
        }
    }

    /// Stop monitoring, interrupting any backoff, and park the pipeline
    ///
    /// Stopping an already stopped supervisor is a no-op.
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        self.monitoring.store(false, Ordering::SeqCst);
        self.stop.request();

        let joined = match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(state) => {
                    self.parked = Some(state);
                    Ok(())
                }
                Err(_) => {
                    let err = SupervisorError::WorkerPanicked;
                    log_supervisor_error(&err, "stop");
                    Err(err)
                }
            },
            None => Ok(()),
        };

        self.status.transition(StreamState::Stopped);
        tracing::info!("[StreamSupervisor] Monitoring stopped");
        joined
    }

    pub fn state(&self) -> StreamState {
        self.status.get()
    }

    /// The caller's monitoring flag; recovery never clears it
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Reason for the last terminal failure
    pub fn failure(&self) -> Option<String> {
        self.status.failure()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.status.subscribe()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Pipeline state while stopped; `None` while the capture thread owns it
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.parked.as_ref().map(|state| &state.pipeline)
    }

    pub fn start_calibration(&self) -> Result<(), SupervisorError> {
        self.send(ControlCommand::StartCalibration)
    }

    /// Ask the capture thread to finish calibration now
    ///
    /// The receiver resolves at the next block boundary.
    pub fn finish_calibration(&self) -> Result<oneshot::Receiver<CalibrationResult>, SupervisorError> {
        let (reply, answer) = oneshot::channel();
        self.send(ControlCommand::FinishCalibration(reply))?;
        Ok(answer)
    }

    pub fn set_sensitivity(&self, sensitivity: f64) -> Result<(), SupervisorError> {
        self.send(ControlCommand::SetSensitivity(sensitivity))
    }

    pub fn apply_mapping(&self, mapping: MappingConfig) -> Result<(), SupervisorError> {
        self.send(ControlCommand::ApplyMapping(mapping))
    }

    fn send(&self, command: ControlCommand) -> Result<(), SupervisorError> {
        if self.worker.is_none() || !self.status.get().is_active() {
            return Err(SupervisorError::NotRunning);
        }
        self.commands
            .send(command)
            .map_err(|_| SupervisorError::Disconnected)
    }

    /// Reclaim state from a thread that ended on its own (terminal failure)
    ///
    /// A worker that reported `Failed` is past its loop and about to return,
    /// so joining it does not block for long.
    fn reap_finished_worker(&mut self) -> Result<(), SupervisorError> {
        let finished = self.worker.as_ref().is_some_and(JoinHandle::is_finished)
            || (self.worker.is_some() && self.status.get() == StreamState::Failed);
        if !finished {
            return Ok(());
        }
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(state) => self.parked = Some(state),
                Err(_) => return Err(SupervisorError::WorkerPanicked),
            }
        }
        Ok(())
    }
}

impl Drop for StreamSupervisor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}
