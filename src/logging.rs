//! Explicit logging context
//!
//! The library never installs a process-wide subscriber. Front ends build a
//! [`LoggingContext`] from [`LogConfig`], enter it on the threads that should
//! log, and hand a clone to the `StreamSupervisor` so the capture thread
//! writes to the same sink. Dropping the guard returned by
//! [`LoggingContext::enter`] ends logging on that thread.

use serde::{Deserialize, Serialize};
use tracing::dispatcher::{self, DefaultGuard};
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `voice_volume=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Colourise terminal output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// A constructed, passed-around tracing dispatcher
#[derive(Debug, Clone)]
pub struct LoggingContext {
    dispatch: Dispatch,
}

impl LoggingContext {
    /// Build a context that writes formatted events to stderr
    pub fn new(config: &LogConfig) -> Self {
        Self::with_writer(config, std::io::stderr)
    }

    /// Build a context that writes formatted events to `writer`
    pub fn with_writer<W>(config: &LogConfig, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(Self::filter(config))
            .with_ansi(config.ansi)
            .with_thread_names(true)
            .with_writer(writer)
            .finish();

        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Route events from the current thread to this context until the guard drops
    pub fn enter(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    fn filter(config: &LogConfig) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_events_reach_writer_only_while_entered() {
        let buffer = SharedBuffer::default();
        let config = LogConfig {
            level: "info".to_string(),
            ansi: false,
        };
        let sink = buffer.clone();
        let context = LoggingContext::with_writer(&config, move || sink.clone());

        {
            let _guard = context.enter();
            tracing::info!("inside guard");
        }
        tracing::info!("after guard");

        let output = buffer.contents();
        assert!(output.contains("inside guard"));
        assert!(!output.contains("after guard"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LogConfig {
            level: "[[[not a directive".to_string(),
            ansi: false,
        };
        // Construction must not panic on a bad directive.
        let _context = LoggingContext::new(&config);
    }
}
