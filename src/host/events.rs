//! Server events
//!
//! Two kinds of events leave the host: tagged log entries, which fan out to
//! any number of subscribers, and the stop event, whose listeners run once,
//! in the order they were added.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Stop listener type
pub type StopListener = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

const LOG_CHANNEL_CAPACITY: usize = 256;

/// A log entry emitted through the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<String>,
    pub data: String,
}

/// Cloneable handle to the host's log sink.
///
/// Every entry is written to `tracing` and published to subscribers. The
/// level follows the tags: `error` and `warn` map to their levels, anything
/// else is `info`.
#[derive(Clone)]
pub struct ServerLog {
    tx: broadcast::Sender<LogEvent>,
}

impl ServerLog {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn log(&self, tags: &[&str], data: impl Into<String>) {
        let data = data.into();
        let tag_list = tags.join(",");

        if tags.contains(&"error") {
            tracing::error!(tags = %tag_list, "{}", data);
        } else if tags.contains(&"warn") {
            tracing::warn!(tags = %tag_list, "{}", data);
        } else {
            tracing::info!(tags = %tag_list, "{}", data);
        }

        let event = LogEvent {
            channel: "app".to_string(),
            timestamp: Utc::now(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            data,
        };
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }
}

/// Registered stop listener
struct StopHandler {
    listener: StopListener,
    plugin: Option<String>,
}

/// Event hub for a server
pub struct ServerEvents {
    log: ServerLog,
    stop_handlers: Mutex<Vec<StopHandler>>,
    stopped: AtomicBool,
}

impl Default for ServerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerEvents {
    pub fn new() -> Self {
        Self {
            log: ServerLog::new(),
            stop_handlers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn log(&self) -> &ServerLog {
        &self.log
    }

    /// Register a stop listener
    pub fn on_stop<F, Fut>(&self, plugin: Option<&str>, listener: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handlers = self.stop_handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.push(StopHandler {
            listener: Box::new(move || listener().boxed()),
            plugin: plugin.map(str::to_string),
        });
        debug!("Registered stop listener #{} ({:?})", handlers.len(), plugin);
    }

    /// Run every stop listener, in registration order. Only the first call
    /// does anything.
    pub async fn emit_stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Stop event already emitted");
            return;
        }

        let handlers = std::mem::take(
            &mut *self.stop_handlers.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for handler in handlers {
            debug!("Running stop listener ({:?})", handler.plugin);
            (handler.listener)().await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Check if any stop listener is waiting
    pub fn has_stop_listeners(&self) -> bool {
        !self
            .stop_handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}
