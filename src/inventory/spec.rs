//! Host specifications accepted by the inventory builder.
//!
//! A host specification comes in one of three shapes:
//!
//! - a delimited string: `"10.0.0.1, 10.0.0.2"`
//! - an ordered list of addresses: `["10.0.0.1", "10.0.0.2"]`
//! - a mapping of group name to group definition, in the same layout a
//!   dynamic inventory script prints for `--list`:
//!
//! ```json
//! {
//!     "web": {"hosts": ["10.0.0.1"], "vars": {"http_port": 80}, "children": ["db"]},
//!     "db": ["10.0.0.2"],
//!     "10.0.0.3": {"ansible_user": "deploy"},
//!     "_meta": {"hostvars": {"10.0.0.1": {"ansible_port": 2222}}}
//! }
//! ```

use std::path::Path;
use std::process::Command;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::{InventoryError, InventoryResult, Vars};

/// Key holding `hostvars` in a mapping specification
pub const META_KEY: &str = "_meta";

/// The external input the inventory is built from
#[derive(Debug, Clone, PartialEq)]
pub enum HostSpec {
    /// Comma or whitespace separated addresses
    Delimited(String),
    /// Ordered list of addresses
    List(Vec<String>),
    /// Group name to group definition
    Groups(Map<String, Value>),
}

impl HostSpec {
    /// Build a specification from an arbitrary JSON value
    pub fn from_value(value: Value) -> InventoryResult<Self> {
        match value {
            Value::String(s) => Ok(HostSpec::Delimited(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(InventoryError::UnsupportedSpec(format!(
                        "host list entries must be strings, got {}",
                        other
                    ))),
                })
                .collect::<InventoryResult<Vec<_>>>()
                .map(HostSpec::List),
            Value::Object(map) => Ok(HostSpec::Groups(map)),
            Value::Null => Ok(HostSpec::List(Vec::new())),
            other => Err(InventoryError::UnsupportedSpec(format!(
                "expected a string, a list or a mapping, got {}",
                other
            ))),
        }
    }

    /// Load a specification from a JSON or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let value: Value = match extension.to_lowercase().as_str() {
            "json" => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };

        debug!(path = %path.display(), "loaded host specification file");
        Self::from_value(value)
    }

    /// Run a dynamic inventory script with `--list` and parse its output
    pub fn from_script(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        let output = Command::new(path)
            .arg("--list")
            .output()
            .map_err(|e| InventoryError::DynamicInventoryFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(InventoryError::DynamicInventoryFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let value: Value = serde_json::from_slice(&output.stdout)?;
        match value {
            Value::Object(map) => {
                debug!(path = %path.display(), groups = map.len(), "loaded dynamic inventory");
                Ok(HostSpec::Groups(map))
            }
            other => Err(InventoryError::DynamicInventoryFailed(format!(
                "script output must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Interpret a source string: executable script, spec file, or inline hosts
    pub fn load(source: &str) -> InventoryResult<Self> {
        let path = Path::new(source);
        if path.is_file() {
            if is_executable(path) {
                return Self::from_script(path);
            }
            return Self::from_file(path);
        }

        let trimmed = source.trim_start();
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(source)?;
            return Self::from_value(value);
        }
        if trimmed.starts_with('[') {
            // `[v6]:port` addresses start with a bracket too
            if let Ok(value) = serde_json::from_str::<Value>(source) {
                return Self::from_value(value);
            }
        }

        Ok(HostSpec::Delimited(source.to_string()))
    }
}

impl From<&str> for HostSpec {
    fn from(s: &str) -> Self {
        HostSpec::Delimited(s.to_string())
    }
}

impl From<String> for HostSpec {
    fn from(s: String) -> Self {
        HostSpec::Delimited(s)
    }
}

impl From<Vec<String>> for HostSpec {
    fn from(items: Vec<String>) -> Self {
        HostSpec::List(items)
    }
}

impl From<Vec<&str>> for HostSpec {
    fn from(items: Vec<&str>) -> Self {
        HostSpec::List(items.into_iter().map(String::from).collect())
    }
}

impl From<Map<String, Value>> for HostSpec {
    fn from(map: Map<String, Value>) -> Self {
        HostSpec::Groups(map)
    }
}

impl TryFrom<Value> for HostSpec {
    type Error = InventoryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Split a delimited host string into trimmed, non-empty tokens
pub fn split_delimited(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

// ============================================================================
// Group definitions
// ============================================================================

/// How a group's raw value is read.
///
/// The structured shape is tried first; a mapping carrying none of the
/// recognized keys falls back to the single-host shorthand.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupShape {
    /// `{hosts, vars, children}`, any subset
    Structured {
        hosts: Option<Value>,
        vars: Option<Value>,
        children: Option<Value>,
    },
    /// `{var: value, ...}`: one host named after the group, with these vars
    Shorthand(Map<String, Value>),
}

impl GroupShape {
    /// Classify a raw group value
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let structured = ["hosts", "vars", "children"]
                    .iter()
                    .any(|key| map.contains_key(*key));
                if structured {
                    GroupShape::Structured {
                        hosts: non_null(map.get("hosts")),
                        vars: non_null(map.get("vars")),
                        children: non_null(map.get("children")),
                    }
                } else {
                    GroupShape::Shorthand(map.clone())
                }
            }
            Value::Null => GroupShape::Structured {
                hosts: None,
                vars: None,
                children: None,
            },
            other => GroupShape::Structured {
                hosts: Some(other.clone()),
                vars: None,
                children: None,
            },
        }
    }

    /// Validate and flatten into a [`GroupDefinition`]
    pub fn into_definition(self, group: &str) -> InventoryResult<GroupDefinition> {
        match self {
            GroupShape::Shorthand(vars) => Ok(GroupDefinition {
                hosts: vec![HostEntry::new(group)],
                vars: vars.into_iter().collect(),
                children: Vec::new(),
            }),
            GroupShape::Structured {
                hosts,
                vars,
                children,
            } => {
                let hosts = match hosts {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| HostEntry::from_value(group, item))
                        .collect::<InventoryResult<Vec<_>>>()?,
                    Some(other) => {
                        return Err(InventoryError::BadHostList {
                            group: group.to_string(),
                            data: other.to_string(),
                        })
                    }
                };

                let vars = match vars {
                    None => Vars::new(),
                    Some(Value::Object(map)) => map.into_iter().collect(),
                    Some(other) => {
                        return Err(InventoryError::BadVars {
                            group: group.to_string(),
                            data: other.to_string(),
                        })
                    }
                };

                let children = match children {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(name) => Ok(name.clone()),
                            other => Err(InventoryError::BadChildren {
                                group: group.to_string(),
                                data: other.to_string(),
                            }),
                        })
                        .collect::<InventoryResult<Vec<_>>>()?,
                    Some(other) => {
                        return Err(InventoryError::BadChildren {
                            group: group.to_string(),
                            data: other.to_string(),
                        })
                    }
                };

                Ok(GroupDefinition {
                    hosts,
                    vars,
                    children,
                })
            }
        }
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    }
}

/// A validated group definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupDefinition {
    pub hosts: Vec<HostEntry>,
    pub vars: Vars,
    pub children: Vec<String>,
}

/// One entry of a group's `hosts` list
#[derive(Debug, Clone, PartialEq)]
pub struct HostEntry {
    /// Address as written, possibly with a port
    pub address: String,
    /// Per-host variables given inline with the entry
    pub vars: Vars,
}

impl HostEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            vars: IndexMap::new(),
        }
    }

    /// Read a string entry, or a mapping entry such as
    /// `{"hostname": "10.0.0.1", "port": 22, "username": "deploy", "password": "..."}`
    fn from_value(group: &str, value: &Value) -> InventoryResult<Self> {
        match value {
            Value::String(address) => Ok(HostEntry::new(address.as_str())),
            Value::Object(map) => {
                let address = ["hostname", "host", "name"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .ok_or_else(|| InventoryError::BadHostList {
                        group: group.to_string(),
                        data: value.to_string(),
                    })?;

                let mut entry = HostEntry::new(address);
                for (key, var) in map {
                    match key.as_str() {
                        "hostname" | "host" | "name" => {}
                        "port" => {
                            entry.vars.insert("ansible_port".to_string(), port_value(var));
                        }
                        "username" | "user" => {
                            entry.vars.insert("ansible_user".to_string(), var.clone());
                        }
                        "password" => {
                            entry.vars.insert("ansible_password".to_string(), var.clone());
                        }
                        _ => {
                            entry.vars.insert(key.clone(), var.clone());
                        }
                    }
                }
                Ok(entry)
            }
            other => Err(InventoryError::BadHostList {
                group: group.to_string(),
                data: other.to_string(),
            }),
        }
    }
}

/// Ports are often written as strings; keep them numeric when possible
fn port_value(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}
