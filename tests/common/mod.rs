#![allow(dead_code)]

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use voice_volume::analysis::MappingConfig;
use voice_volume::audio::{AudioBlock, ScriptStep};
use voice_volume::engine::RecoveryPolicy;
use voice_volume::{AppConfig, SupervisorEvent};

/// Single-sample block whose intensity is `db`
pub fn block_at(db: f64) -> AudioBlock {
    let amplitude = 10f64.powf(db / 20.0) / 10.0;
    AudioBlock::new(vec![amplitude as f32], 44_100)
}

pub fn blocks_at(levels: impl IntoIterator<Item = f64>) -> Vec<ScriptStep> {
    levels.into_iter().map(|db| ScriptStep::Block(block_at(db))).collect()
}

/// Config with short blocks and fast backoff so tests run in milliseconds
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.audio.block_duration_ms = 10;
    config.smoothing.window_size = 1;
    config.mapping = MappingConfig {
        min_intensity: 20.0,
        max_intensity: 80.0,
        noise_floor: 10.0,
        sensitivity: 1.0,
        curve_exponent: 3.0,
    };
    config.recovery = RecoveryPolicy {
        initial_backoff_ms: 10,
        max_backoff_ms: 40,
        multiplier: 2.0,
        max_attempts: 3,
        healthy_blocks_to_reset: 50,
        stall_timeout_ms: 10_000,
    };
    config
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Everything queued so far; a lagged receiver skips ahead and keeps reading
pub fn drain_events(rx: &mut broadcast::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}
