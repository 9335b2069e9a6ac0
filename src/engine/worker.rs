// Capture thread: pulls blocks, runs the pipeline, recovers from faults

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::audio::{AudioCaptureSource, CaptureSourceFactory, StreamSpec};
use crate::engine::events::{ControlCommand, SupervisorEvent};
use crate::engine::pipeline::Pipeline;
use crate::engine::recovery::{RecoveryPolicy, RecoveryTracker};
use crate::engine::state::{StatusHandle, StreamState};
use crate::error::{log_audio_error, log_volume_error, AudioCaptureError, VolumeControlError};
use crate::logging::LoggingContext;

/// Everything the capture thread owns; handed back when it exits
pub(crate) struct WorkerState {
    pub(crate) pipeline: Pipeline,
    pub(crate) factory: Box<dyn CaptureSourceFactory>,
    pub(crate) commands: mpsc::UnboundedReceiver<ControlCommand>,
}

/// Stop request that also wakes a backoff wait
#[derive(Default)]
pub(crate) struct StopSignal {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub(crate) fn request(&self) {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.wake.notify_all();
    }

    pub(crate) fn reset(&self) {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    pub(crate) fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `timeout`; returns true if a stop arrived meanwhile
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let guard = self.requested.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

enum Fault {
    Capture(AudioCaptureError),
    Volume(VolumeControlError),
}

impl Fault {
    fn describe(&self) -> String {
        match self {
            Fault::Capture(err) => err.to_string(),
            Fault::Volume(err) => err.to_string(),
        }
    }
}

enum Recovery {
    Resumed(Box<dyn AudioCaptureSource>),
    Stopped,
    Failed,
}

pub(crate) struct CaptureWorker {
    state: WorkerState,
    spec: StreamSpec,
    policy: RecoveryPolicy,
    status: StatusHandle,
    stop: std::sync::Arc<StopSignal>,
    logging: Option<LoggingContext>,
}

impl CaptureWorker {
    pub(crate) fn new(
        state: WorkerState,
        spec: StreamSpec,
        policy: RecoveryPolicy,
        status: StatusHandle,
        stop: std::sync::Arc<StopSignal>,
        logging: Option<LoggingContext>,
    ) -> Self {
        Self {
            state,
            spec,
            policy,
            status,
            stop,
            logging,
        }
    }

    /// Thread body; `ready` receives the outcome of the first open
    pub(crate) fn run(
        mut self,
        ready: std::sync::mpsc::Sender<Result<(), AudioCaptureError>>,
    ) -> WorkerState {
        let _log_guard = self.logging.as_ref().map(LoggingContext::enter);

        let mut source = match self.open_source() {
            Ok(source) => source,
            Err(err) => {
                log_audio_error(&err, "CaptureWorker::run");
                let _ = ready.send(Err(err));
                return self.finish();
            }
        };

        self.state.pipeline.seed_volume();
        self.status.transition(StreamState::Running);
        let _ = ready.send(Ok(()));
        tracing::info!(
            "[CaptureWorker] Capturing from {} at {} Hz, {} samples per block",
            source.name(),
            self.spec.sample_rate,
            self.spec.block_size
        );

        let poll = self.spec.block_duration().max(Duration::from_millis(1));
        let stall_timeout = self.policy.stall_timeout();
        let mut tracker = RecoveryTracker::new(self.policy.clone());
        let mut last_block = Instant::now();

        loop {
            if self.stop.is_requested() {
                break;
            }
            self.drain_commands();

            let fault = match source.next_block(poll) {
                Ok(Some(block)) => {
                    last_block = Instant::now();
                    match self.state.pipeline.process_block(&block) {
                        Ok(_) => {
                            tracker.record_healthy_block();
                            None
                        }
                        Err(err) => Some(Fault::Volume(err)),
                    }
                }
                Ok(None) => {
                    self.state.pipeline.on_idle();
                    let waited = last_block.elapsed();
                    (waited >= stall_timeout).then(|| {
                        Fault::Capture(AudioCaptureError::Stalled {
                            waited_ms: waited.as_millis() as u64,
                        })
                    })
                }
                Err(err) => Some(Fault::Capture(err)),
            };

            if let Some(fault) = fault {
                match self.recover(source, fault, &mut tracker) {
                    Recovery::Resumed(reopened) => {
                        source = reopened;
                        last_block = Instant::now();
                    }
                    Recovery::Stopped => return self.finish(),
                    Recovery::Failed => {
                        self.discard_commands();
                        return self.finish();
                    }
                }
            }
        }

        if let Err(err) = source.stop() {
            log_audio_error(&err, "CaptureWorker::stop");
        }
        tracing::info!("[CaptureWorker] Capture loop exited");
        self.finish()
    }

    /// Settle pipeline state before it is parked
    fn finish(mut self) -> WorkerState {
        self.state.pipeline.abandon_calibration();
        if !self.state.pipeline.flush_levels() {
            tracing::debug!("[CaptureWorker] Last level sample could not be delivered");
        }
        self.state
    }

    fn open_source(&mut self) -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
        let mut source = self.state.factory.create()?;
        source.open(&self.spec)?;
        if let Err(err) = source.start() {
            let _ = source.stop();
            return Err(err);
        }
        Ok(source)
    }

    fn recover(
        &mut self,
        mut source: Box<dyn AudioCaptureSource>,
        fault: Fault,
        tracker: &mut RecoveryTracker,
    ) -> Recovery {
        match &fault {
            Fault::Capture(err) => log_audio_error(err, "CaptureWorker::next_block"),
            Fault::Volume(err) => log_volume_error(err, "Pipeline::process_block"),
        }
        if let Err(err) = source.stop() {
            log_audio_error(&err, "CaptureWorker::recover");
        }
        drop(source);
        self.status.transition(StreamState::Recovering);

        let needs_controller = matches!(fault, Fault::Volume(_));
        let mut controller_ok = !needs_controller;
        let mut cause = fault.describe();

        loop {
            let Some((attempt, delay)) = tracker.next_attempt() else {
                tracing::error!(
                    "[CaptureWorker] Giving up after {} attempts: {}",
                    tracker.policy().max_attempts,
                    cause
                );
                self.status.fail(cause);
                return Recovery::Failed;
            };

            tracing::warn!(
                "[CaptureWorker] Recovery attempt {} in {} ms ({})",
                attempt,
                delay.as_millis(),
                cause
            );
            self.status.emit(SupervisorEvent::RecoveryScheduled {
                attempt,
                delay_ms: delay.as_millis() as u64,
                cause: cause.clone(),
            });

            if self.stop.wait(delay) {
                tracing::info!("[CaptureWorker] Stop requested during backoff");
                return Recovery::Stopped;
            }

            if !controller_ok {
                match self.state.pipeline.reinitialize_controller() {
                    Ok(()) => controller_ok = true,
                    Err(err) => {
                        log_volume_error(&err, "CaptureWorker::recover");
                        cause = err.to_string();
                        continue;
                    }
                }
            }

            match self.open_source() {
                Ok(reopened) => {
                    tracing::info!("[CaptureWorker] Source reopened on attempt {}", attempt);
                    self.status.transition(StreamState::Running);
                    return Recovery::Resumed(reopened);
                }
                Err(err) => {
                    log_audio_error(&err, "CaptureWorker::recover");
                    cause = err.to_string();
                }
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.state.commands.try_recv() {
            self.state.pipeline.apply(command);
        }
    }

    /// Drop queued commands so pending replies see a closed channel
    fn discard_commands(&mut self) {
        while self.state.commands.try_recv().is_ok() {}
    }
}
