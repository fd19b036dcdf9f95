//! Automation engine abstraction.
//!
//! An [`Engine`] receives a one-task play (or a playbook path), the inventory
//! and an [`EventSender`]. It reports every per-host outcome as an
//! [`EngineEvent`] on the channel and returns once the run is over. All
//! parallelism, connection handling and privilege escalation live behind
//! this trait.

pub mod ansible;

pub use ansible::AnsiblePlaybookEngine;

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

use crate::inventory::Inventory;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by an engine while driving a run
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be located.
    #[error("engine binary not found: {0}")]
    BinaryNotFound(String),

    /// Spawning or talking to the engine process failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine exited with a status that is not a completed run.
    #[error("engine exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    /// The engine was killed by a signal.
    #[error("engine terminated without an exit status")]
    Terminated,

    /// The engine's report could not be understood.
    #[error("unparseable engine report: {0}")]
    InvalidReport(String),

    /// Inputs for the engine could not be written.
    #[error("failed to write engine input: {0}")]
    TempWrite(String),

    /// The engine cannot run this request.
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Outcomes and events
// ============================================================================

/// Classified outcome of one task on one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Task completed successfully without changes
    Ok,
    /// Task completed successfully with changes
    Changed,
    /// Task failed
    Failed,
    /// Task was skipped
    Skipped,
    /// Host was unreachable
    Unreachable,
}

impl TaskOutcome {
    /// Classify from the flags a module result carries
    pub fn from_flags(unreachable: bool, failed: bool, skipped: bool, changed: bool) -> Self {
        if unreachable {
            TaskOutcome::Unreachable
        } else if failed {
            TaskOutcome::Failed
        } else if skipped {
            TaskOutcome::Skipped
        } else if changed {
            TaskOutcome::Changed
        } else {
            TaskOutcome::Ok
        }
    }

    /// Classify a raw module result payload
    pub fn from_payload(payload: &Value) -> Self {
        let flag = |key: &str| payload.get(key).map(truthy).unwrap_or(false);
        Self::from_flags(
            flag("unreachable"),
            flag("failed"),
            flag("skipped"),
            flag("changed"),
        )
    }

    /// Whether the host answered (`ok` or `changed`)
    pub fn is_contacted(&self) -> bool {
        matches!(self, TaskOutcome::Ok | TaskOutcome::Changed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Ok => "ok",
            TaskOutcome::Changed => "changed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Skipped => "skipped",
            TaskOutcome::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loose truthiness for flags that may arrive as bools, numbers or strings
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

/// Message an engine pushes while running
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A task began
    TaskStart { task: String },
    /// A task finished on a host
    HostResult {
        host: String,
        task: String,
        outcome: TaskOutcome,
        payload: Value,
    },
}

/// Receiving half of an event channel
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Sending half handed to an engine
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Push an event; a closed receiver is not an engine failure
    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped, discarding engine event");
        }
    }

    pub fn task_start(&self, task: impl Into<String>) {
        self.send(EngineEvent::TaskStart { task: task.into() });
    }

    pub fn host_result(
        &self,
        host: impl Into<String>,
        task: impl Into<String>,
        outcome: TaskOutcome,
        payload: Value,
    ) {
        self.send(EngineEvent::HostResult {
            host: host.into(),
            task: task.into(),
            outcome,
            payload,
        });
    }
}

/// Create a connected event sender and receiver
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

// ============================================================================
// Requests
// ============================================================================

/// Arguments handed to a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleArgs {
    /// No arguments
    #[default]
    None,
    /// Free-form or `key=value` string
    Raw(String),
    /// Structured parameters
    Params(Map<String, Value>),
}

impl ModuleArgs {
    /// Whether no usable argument was given
    pub fn is_empty(&self) -> bool {
        match self {
            ModuleArgs::None => true,
            ModuleArgs::Raw(s) => s.trim().is_empty(),
            ModuleArgs::Params(map) => map.is_empty(),
        }
    }

    /// The arguments as they appear in a task
    pub fn to_value(&self) -> Value {
        match self {
            ModuleArgs::None => Value::Null,
            ModuleArgs::Raw(s) => Value::String(s.clone()),
            ModuleArgs::Params(map) => Value::Object(map.clone()),
        }
    }
}

impl From<&str> for ModuleArgs {
    fn from(s: &str) -> Self {
        ModuleArgs::Raw(s.to_string())
    }
}

impl From<String> for ModuleArgs {
    fn from(s: String) -> Self {
        ModuleArgs::Raw(s)
    }
}

impl From<Option<String>> for ModuleArgs {
    fn from(s: Option<String>) -> Self {
        s.map(ModuleArgs::Raw).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for ModuleArgs {
    fn from(map: Map<String, Value>) -> Self {
        ModuleArgs::Params(map)
    }
}

/// One task of an ad-hoc play
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub module: String,
    pub args: ModuleArgs,
}

impl TaskSpec {
    pub fn new(module: impl Into<String>, args: impl Into<ModuleArgs>) -> Self {
        let module = module.into();
        Self {
            name: module.clone(),
            module,
            args: args.into(),
        }
    }

    /// The task in playbook form: `{name, <module>: <args>}`
    pub fn to_value(&self) -> Value {
        let mut task = Map::new();
        task.insert("name".to_string(), Value::String(self.name.clone()));
        task.insert(self.module.clone(), self.args.to_value());
        Value::Object(task)
    }
}

/// A play built from a pattern and a list of tasks
#[derive(Debug, Clone, PartialEq)]
pub struct Play {
    pub name: String,
    pub hosts: String,
    pub gather_facts: bool,
    pub tasks: Vec<TaskSpec>,
}

impl Play {
    /// A single-task play over `hosts`
    pub fn adhoc(hosts: impl Into<String>, task: TaskSpec) -> Self {
        Self {
            name: "Fleetcall Ad-hoc".to_string(),
            hosts: hosts.into(),
            gather_facts: false,
            tasks: vec![task],
        }
    }

    pub fn with_gather_facts(mut self, gather_facts: bool) -> Self {
        self.gather_facts = gather_facts;
        self
    }

    /// The play as a one-play playbook document
    pub fn to_playbook(&self) -> Value {
        let mut play = Map::new();
        play.insert("name".to_string(), Value::String(self.name.clone()));
        play.insert("hosts".to_string(), Value::String(self.hosts.clone()));
        play.insert("gather_facts".to_string(), Value::Bool(self.gather_facts));
        play.insert(
            "tasks".to_string(),
            Value::Array(self.tasks.iter().map(TaskSpec::to_value).collect()),
        );
        Value::Array(vec![Value::Object(play)])
    }
}

/// Connection parameters passed through to the engine untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub remote_user: String,
    pub private_key_file: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub conn_pass: Option<String>,
    #[serde(skip_serializing)]
    pub become_pass: Option<String>,
    pub connection: String,
    pub timeout: u64,
    pub forks: usize,
    #[serde(rename = "become")]
    pub become_: bool,
    pub become_method: String,
    pub become_user: String,
    pub check: bool,
    pub extra_vars: Vec<String>,
    pub module_path: Option<PathBuf>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            remote_user: "root".to_string(),
            private_key_file: None,
            conn_pass: None,
            become_pass: None,
            connection: "smart".to_string(),
            timeout: 10,
            forks: 5,
            become_: false,
            become_method: "sudo".to_string(),
            become_user: "root".to_string(),
            check: false,
            extra_vars: Vec::new(),
            module_path: None,
        }
    }
}

/// What the engine should run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionTarget {
    /// A play assembled in memory
    AdHoc(Play),
    /// An existing playbook file
    Playbook(PathBuf),
}

/// A complete request handed to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub target: ExecutionTarget,
    pub options: ConnectionOptions,
}

impl ExecutionRequest {
    pub fn adhoc(play: Play, options: ConnectionOptions) -> Self {
        Self {
            target: ExecutionTarget::AdHoc(play),
            options,
        }
    }

    pub fn playbook(path: impl Into<PathBuf>, options: ConnectionOptions) -> Self {
        Self {
            target: ExecutionTarget::Playbook(path.into()),
            options,
        }
    }
}

// ============================================================================
// Engine trait
// ============================================================================

/// Something that can execute plays against an inventory.
///
/// `execute` returns once the run is complete. Per-host failures are
/// reported as events, not as errors; an `Err` means the run itself could
/// not be carried out.
#[async_trait]
pub trait Engine: Send + Sync + Debug {
    /// Short engine name used in logs
    fn name(&self) -> &str;

    /// Run the request, reporting outcomes on `events`
    async fn execute(
        &self,
        request: &ExecutionRequest,
        inventory: &Inventory,
        events: EventSender,
    ) -> EngineResult<()>;

    /// Release temporary resources; called after every run
    async fn cleanup(&self) {}
}
