//! Load progress reporting
//!
//! For every resource file: `Initiate` before fetching, `Done` after. Once the
//! backend is ready a single `Ready` follows. A failed load never emits `Ready`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressEvent {
    Initiate { name: String, file: String },
    Done { name: String, file: String },
    Ready { task: String, model: String },
}

/// Receives progress events while a pipeline loads
pub trait ProgressSink: Send {
    fn on_event(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn on_event(&mut self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressSink for Vec<ProgressEvent> {
    fn on_event(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&mut self, _event: ProgressEvent) {}
}

/// Records events; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }
}

impl ProgressSink for ProgressLog {
    fn on_event(&mut self, event: ProgressEvent) {
        log::debug!("progress: {:?}", event);
        self.events.lock().push(event);
    }
}
