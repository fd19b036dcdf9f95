//! Engine backed by the external `ansible-playbook` executable.
//!
//! Each run writes the inventory and the one-play playbook to its own
//! temporary directory, runs `ansible-playbook` with the JSON stdout
//! callback, and turns the report into [`EngineEvent`]s. The directory is
//! removed before `execute` returns, so one engine can serve concurrent runs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{
    ConnectionOptions, Engine, EngineError, EngineEvent, EngineResult, EventSender,
    ExecutionRequest, ExecutionTarget, TaskOutcome,
};
use crate::inventory::{Inventory, ALL};

/// Default name of the executable looked up on `PATH`
pub const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";

/// Exit codes of a run that completed, possibly with failed or unreachable hosts
const COMPLETED_EXIT_CODES: [i32; 3] = [0, 2, 4];

/// Drives `ansible-playbook` as a subprocess
#[derive(Debug, Default)]
pub struct AnsiblePlaybookEngine {
    /// Explicit executable path; looked up on `PATH` when unset
    binary: Option<PathBuf>,
}

/// Files written for one run, removed on [`RunInputs::close`] or drop
#[derive(Debug)]
struct RunInputs {
    dir: TempDir,
    inventory: PathBuf,
    playbook: PathBuf,
}

impl RunInputs {
    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(dir = %path.display(), error = %e, "failed to remove engine work directory");
        }
    }
}

impl AnsiblePlaybookEngine {
    /// Create an engine that looks `ansible-playbook` up on `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Locate the executable
    pub fn resolve_binary(&self) -> EngineResult<PathBuf> {
        match &self.binary {
            Some(path) if path.components().count() > 1 => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(EngineError::BinaryNotFound(path.display().to_string()))
                }
            }
            Some(name) => which::which(name)
                .map_err(|e| EngineError::BinaryNotFound(format!("{}: {}", name.display(), e))),
            None => which::which(ANSIBLE_PLAYBOOK)
                .map_err(|e| EngineError::BinaryNotFound(format!("{}: {}", ANSIBLE_PLAYBOOK, e))),
        }
    }

    /// Write the inventory (and the ad-hoc playbook) into a fresh work directory
    fn write_inputs(
        &self,
        request: &ExecutionRequest,
        inventory: &Inventory,
    ) -> EngineResult<RunInputs> {
        let dir = tempfile::Builder::new()
            .prefix("fleetcall-")
            .tempdir()
            .map_err(|e| EngineError::TempWrite(e.to_string()))?;

        let exported = engine_inventory(inventory, &request.options);
        let inventory_path = dir.path().join("inventory.yml");
        write_yaml(&inventory_path, &exported)?;

        let playbook = match &request.target {
            ExecutionTarget::AdHoc(play) => {
                let path = dir.path().join("playbook.yml");
                write_yaml(&path, &play.to_playbook())?;
                path
            }
            ExecutionTarget::Playbook(path) => path.clone(),
        };

        debug!(dir = %dir.path().display(), "wrote engine inputs");
        Ok(RunInputs {
            dir,
            inventory: inventory_path,
            playbook,
        })
    }

    async fn run(
        &self,
        binary: &Path,
        request: &ExecutionRequest,
        inputs: &RunInputs,
        events: EventSender,
    ) -> EngineResult<()> {
        let args = build_args(&request.options, &inputs.inventory, &inputs.playbook);

        info!(binary = %binary.display(), playbook = %inputs.playbook.display(), "starting engine");

        let output = Command::new(binary)
            .args(&args)
            .env("ANSIBLE_STDOUT_CALLBACK", "json")
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .env("ANSIBLE_RETRY_FILES_ENABLED", "False")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        let code = output.status.code().ok_or(EngineError::Terminated)?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !COMPLETED_EXIT_CODES.contains(&code) {
            return Err(EngineError::NonZeroExit { code, stderr });
        }
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "engine wrote to stderr");
        }

        let report = parse_report(&output.stdout)?;
        let mut results = 0usize;
        for event in report {
            if matches!(event, EngineEvent::HostResult { .. }) {
                results += 1;
            }
            events.send(event);
        }

        info!(exit_code = code, results, "engine finished");
        Ok(())
    }
}

#[async_trait]
impl Engine for AnsiblePlaybookEngine {
    fn name(&self) -> &str {
        ANSIBLE_PLAYBOOK
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        inventory: &Inventory,
        events: EventSender,
    ) -> EngineResult<()> {
        let binary = self.resolve_binary()?;
        let inputs = self.write_inputs(request, inventory)?;
        let outcome = self.run(&binary, request, &inputs, events).await;
        inputs.close();
        outcome
    }
}

/// The exported inventory with connection passwords added as `all` vars
pub fn engine_inventory(inventory: &Inventory, options: &ConnectionOptions) -> Value {
    let mut exported = inventory.to_engine_inventory();

    let mut secrets = Map::new();
    if let Some(pass) = &options.conn_pass {
        secrets.insert("ansible_password".to_string(), Value::String(pass.clone()));
    }
    if let Some(pass) = &options.become_pass {
        secrets.insert(
            "ansible_become_password".to_string(),
            Value::String(pass.clone()),
        );
    }

    if !secrets.is_empty() {
        if let Some(Value::Object(all)) = exported.get_mut(ALL) {
            let vars = all
                .entry("vars")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(vars) = vars {
                vars.extend(secrets);
            }
        }
    }

    exported
}

/// Command-line arguments for `ansible-playbook`
pub fn build_args(options: &ConnectionOptions, inventory: &Path, playbook: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        inventory.into(),
        "--forks".into(),
        options.forks.to_string().into(),
        "--timeout".into(),
        options.timeout.to_string().into(),
        "-u".into(),
        options.remote_user.clone().into(),
        "-c".into(),
        options.connection.clone().into(),
    ];

    if let Some(key) = &options.private_key_file {
        args.push("--private-key".into());
        args.push(key.into());
    }
    if options.become_ {
        args.push("--become".into());
        args.push("--become-method".into());
        args.push(options.become_method.clone().into());
        args.push("--become-user".into());
        args.push(options.become_user.clone().into());
    }
    if options.check {
        args.push("--check".into());
    }
    if let Some(path) = &options.module_path {
        args.push("--module-path".into());
        args.push(path.into());
    }
    for var in &options.extra_vars {
        args.push("-e".into());
        args.push(var.into());
    }

    args.push(playbook.into());
    args
}

/// Turn the JSON callback report into events.
///
/// The report is the first object that starts a line and carries a `plays`
/// list; warnings and deprecation notices around it are skipped.
pub fn parse_report(stdout: &[u8]) -> EngineResult<Vec<EngineEvent>> {
    let text = String::from_utf8_lossy(stdout);
    let report = find_report(&text)?;

    let plays = report
        .get("plays")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::InvalidReport("missing 'plays' list".to_string()))?;

    let mut events = Vec::new();
    for play in plays {
        let tasks = play.get("tasks").and_then(Value::as_array);
        for task in tasks.into_iter().flatten() {
            let name = task
                .pointer("/task/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            events.push(EngineEvent::TaskStart { task: name.clone() });

            let hosts = task.get("hosts").and_then(Value::as_object);
            for (host, payload) in hosts.into_iter().flatten() {
                events.push(EngineEvent::HostResult {
                    host: host.clone(),
                    task: name.clone(),
                    outcome: TaskOutcome::from_payload(payload),
                    payload: payload.clone(),
                });
            }
        }
    }
    Ok(events)
}

fn find_report(text: &str) -> EngineResult<Value> {
    let starts = text
        .match_indices('{')
        .map(|(offset, _)| offset)
        .filter(|&offset| offset == 0 || text[..offset].ends_with('\n'));

    let mut last_error = "no JSON object in output".to_string();
    for offset in starts {
        let mut stream = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.get("plays").map_or(false, Value::is_array) => {
                return Ok(value)
            }
            Some(Ok(_)) => last_error = "missing 'plays' list".to_string(),
            Some(Err(e)) => last_error = e.to_string(),
            None => {}
        }
    }
    Err(EngineError::InvalidReport(last_error))
}

fn write_yaml(path: &Path, value: &Value) -> EngineResult<()> {
    let content =
        serde_yaml::to_string(value).map_err(|e| EngineError::TempWrite(e.to_string()))?;
    std::fs::write(path, content)
        .map_err(|e| EngineError::TempWrite(format!("{}: {}", path.display(), e)))
}
