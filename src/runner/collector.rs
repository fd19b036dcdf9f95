//! Collects engine events into `contacted` and `dark` buckets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::engine::{EngineEvent, EventReceiver, TaskOutcome};

/// Per-host results of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Hosts whose last result was `ok` or `changed`
    pub contacted: IndexMap<String, Value>,
    /// Hosts whose last result was `failed`, `unreachable` or `skipped`
    pub dark: IndexMap<String, Value>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no host landed in `dark`
    pub fn all_contacted(&self) -> bool {
        self.dark.is_empty()
    }

    /// Number of distinct hosts across both buckets
    pub fn host_count(&self) -> usize {
        self.contacted
            .keys()
            .chain(self.dark.keys().filter(|h| !self.contacted.contains_key(*h)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.contacted.is_empty() && self.dark.is_empty()
    }

    /// The `state` recorded for a host, looking in `dark` first
    pub fn state_of(&self, host: &str) -> Option<&str> {
        self.dark
            .get(host)
            .or_else(|| self.contacted.get(host))
            .and_then(|record| record.get("state"))
            .and_then(Value::as_str)
    }
}

/// Classifies host outcomes as they arrive
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: ResultSet,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event
    pub fn record(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TaskStart { task } => {
                trace!(task = %task, "task started");
            }
            EngineEvent::HostResult {
                host,
                task,
                outcome,
                payload,
            } => {
                debug!(host = %host, task = %task, state = %outcome, "host result");
                let record = tag_state(payload, outcome);
                let bucket = if outcome.is_contacted() {
                    &mut self.results.contacted
                } else {
                    &mut self.results.dark
                };
                bucket.insert(host, record);
            }
        }
    }

    /// Drain every event already queued on the channel
    pub async fn drain(&mut self, rx: &mut EventReceiver) {
        rx.close();
        while let Some(event) = rx.recv().await {
            self.record(event);
        }
    }

    pub fn finish(self) -> ResultSet {
        self.results
    }
}

/// The raw payload with a `state` field; non-mapping payloads go under `result`
fn tag_state(payload: Value, outcome: TaskOutcome) -> Value {
    let mut record = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    };
    record.insert("state".to_string(), Value::String(outcome.as_str().to_string()));
    Value::Object(record)
}
