// Stream lifecycle state shared between the supervisor and its capture thread

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::engine::events::SupervisorEvent;

/// Capture lifecycle
///
/// Only `Running` processes blocks. `Recovering` is entered on a fault and
/// left for `Running` once the source reopens, or for `Failed` when the
/// retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamState {
    Stopped = 0,
    Running = 1,
    Recovering = 2,
    Failed = 3,
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => StreamState::Running,
            2 => StreamState::Recovering,
            3 => StreamState::Failed,
            _ => StreamState::Stopped,
        }
    }

    /// True while a capture thread owns the pipeline
    pub fn is_active(self) -> bool {
        matches!(self, StreamState::Running | StreamState::Recovering)
    }
}

/// Cloneable handle to the state cell, the event bus and the failure reason
#[derive(Clone)]
pub(crate) struct StatusHandle {
    state: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<String>>>,
    events: broadcast::Sender<SupervisorEvent>,
}

impl StatusHandle {
    pub(crate) fn new(events: broadcast::Sender<SupervisorEvent>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(StreamState::Stopped as u8)),
            failure: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub(crate) fn get(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move to `to`, announcing the change when it is one
    pub(crate) fn transition(&self, to: StreamState) {
        let from = StreamState::from_u8(self.state.swap(to as u8, Ordering::SeqCst));
        if from != to {
            tracing::info!("[StreamSupervisor] State {:?} -> {:?}", from, to);
            self.emit(SupervisorEvent::StateChanged { from, to });
        }
    }

    pub(crate) fn emit(&self, event: SupervisorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> broadcast::Sender<SupervisorEvent> {
        self.events.clone()
    }

    pub(crate) fn fail(&self, reason: String) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.clone());
        self.transition(StreamState::Failed);
        self.emit(SupervisorEvent::Failed { reason });
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
