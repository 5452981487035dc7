//! Observability event sink.
//!
//! The pipeline emits one event per noteworthy stage transition. Sinks are
//! deliberately non-blocking: recording must never stall request handling,
//! so the bundled implementation keeps a bounded in-memory ring and drops
//! the oldest events when full rather than applying backpressure.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trace::{PipelineTrace, Stage};

/// A single pipeline observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub request_id: Uuid,
    pub stage: Stage,
    pub detail: String,
    /// The completed trace with per-stage timings. Present only on the
    /// terminal event, so an audit log gets the whole request in one
    /// record without every intermediate event repeating it.
    pub trace: Option<PipelineTrace>,
}

/// Destination for pipeline events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: PipelineEvent);
}

/// Bounded in-memory sink. When the ring is full the oldest event is
/// evicted; losing an old observation beats unbounded growth.
#[derive(Debug)]
pub struct BoundedEventSink {
    capacity: usize,
    events: Mutex<VecDeque<PipelineEvent>>,
}

impl BoundedEventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Removes and returns everything recorded so far, oldest first.
    pub fn drain(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for BoundedEventSink {
    fn record(&self, event: PipelineEvent) {
        if let Ok(mut q) = self.events.lock() {
            if q.len() == self.capacity {
                q.pop_front();
            }
            q.push_back(event);
        }
    }
}
