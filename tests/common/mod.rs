//! Shared test utilities and fixtures for the Fleetcall test suite.
//!
//! This module provides:
//! - A scripted mock [`Engine`] that replays canned host outcomes
//! - Temporary inventory file and script helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use fleetcall::engine::{
    Engine, EngineError, EngineResult, EventSender, ExecutionRequest, ExecutionTarget,
    TaskOutcome,
};
use fleetcall::inventory::Inventory;

// ============================================================================
// Mock Engine Implementation
// ============================================================================

/// One canned host outcome
#[derive(Debug, Clone)]
pub struct ScriptedResult {
    pub host: String,
    pub outcome: TaskOutcome,
    pub payload: Value,
}

/// Engine that reports scripted outcomes for the hosts its play selects
#[derive(Debug, Default)]
pub struct MockEngine {
    results: Vec<ScriptedResult>,
    fail_with: Option<String>,
    /// Outcome for selected hosts without a scripted result
    default_outcome: Option<(TaskOutcome, Value)>,
    pub executions: AtomicU32,
    pub cleanups: AtomicU32,
    pub requests: Mutex<Vec<ExecutionRequest>>,
    pub selected: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every selected host answers `ok` with `{"ping": "pong"}`
    pub fn pinging() -> Self {
        Self::new().default_outcome(TaskOutcome::Ok, serde_json::json!({"ping": "pong"}))
    }

    pub fn default_outcome(mut self, outcome: TaskOutcome, payload: Value) -> Self {
        self.default_outcome = Some((outcome, payload));
        self
    }

    pub fn with_result(mut self, host: &str, outcome: TaskOutcome, payload: Value) -> Self {
        self.results.push(ScriptedResult {
            host: host.to_string(),
            outcome,
            payload,
        });
        self
    }

    /// Make `execute` fail with a non-zero exit
    pub fn failing(mut self, stderr: &str) -> Self {
        self.fail_with = Some(stderr.to_string());
        self
    }

    pub fn execution_count(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn cleanup_count(&self) -> u32 {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ExecutionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        inventory: &Inventory,
        events: EventSender,
    ) -> EngineResult<()> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(stderr) = &self.fail_with {
            return Err(EngineError::NonZeroExit {
                code: 1,
                stderr: stderr.clone(),
            });
        }

        let (pattern, task) = match &request.target {
            ExecutionTarget::AdHoc(play) => (
                play.hosts.clone(),
                play.tasks
                    .first()
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
            ),
            ExecutionTarget::Playbook(path) => ("all".to_string(), path.display().to_string()),
        };

        let hosts = inventory
            .list_hosts(&pattern)
            .map_err(|e| EngineError::Unsupported(e.to_string()))?;
        *self.selected.lock() = hosts.clone();

        events.task_start(task.clone());
        for host in &hosts {
            let scripted: Vec<_> = self.results.iter().filter(|r| &r.host == host).collect();
            if scripted.is_empty() {
                if let Some((outcome, payload)) = &self.default_outcome {
                    events.host_result(host.clone(), task.clone(), *outcome, payload.clone());
                }
            }
            for result in scripted {
                events.host_result(
                    host.clone(),
                    task.clone(),
                    result.outcome,
                    result.payload.clone(),
                );
            }
        }
        Ok(())
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shareable handle for tests that inspect the engine afterwards
pub fn shared(engine: MockEngine) -> Arc<MockEngine> {
    Arc::new(engine)
}

// ============================================================================
// Fixture Helpers
// ============================================================================

/// Write `content` to `name` inside a fresh temporary directory
pub fn write_fixture(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    (dir, path)
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod script");
}

/// Write an executable dynamic inventory script printing `json` for `--list`
#[cfg(unix)]
pub fn write_inventory_script(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("dynamic_inventory.sh");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--list\" ]; then\ncat <<'EOF'\n{}\nEOF\nelse\necho '{{}}'\nfi\n",
        json
    );
    std::fs::write(&path, script).expect("write script");
    make_executable(&path);
    path
}

/// Write an executable script that always fails
#[cfg(unix)]
pub fn write_failing_script(dir: &Path) -> PathBuf {
    let path = dir.join("broken_inventory.sh");
    std::fs::write(&path, "#!/bin/sh\necho 'no inventory today' >&2\nexit 3\n")
        .expect("write script");
    make_executable(&path);
    path
}

/// Write a stand-in `ansible-playbook` that prints `stdout` and exits with `code`.
///
/// It records its arguments in `args.txt` and copies the inventory it was
/// handed (`-i PATH`) to `inventory_seen.yml`, both inside `dir`.
#[cfg(unix)]
pub fn write_fake_engine(dir: &Path, stdout: &str, code: i32) -> PathBuf {
    let path = dir.join("ansible-playbook");
    let script = format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$@\" > '{dir}/args.txt'\n\
         cp \"$2\" '{dir}/inventory_seen.yml'\n\
         cat <<'EOF'\n{stdout}\nEOF\n\
         echo 'engine stderr line' >&2\n\
         exit {code}\n",
        dir = dir.display(),
        stdout = stdout,
        code = code,
    );
    std::fs::write(&path, script).expect("write fake engine");
    make_executable(&path);
    path
}
