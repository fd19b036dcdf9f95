//! Inventory management for Fleetcall.
//!
//! This module turns a loosely shaped host specification into a
//! group/host/variable graph:
//! - Delimited strings, address lists and nested group mappings
//! - Dynamic inventory scripts and JSON/YAML spec files
//! - Host pattern matching with a per-inventory cache
//! - Export in the engine's inventory format

pub mod builder;
pub mod group;
pub mod host;
pub mod pattern;
pub mod spec;

pub use builder::InventoryBuilder;
pub use group::{Group, ALL, UNGROUPED};
pub use host::{Host, HostParseError, LOCAL_ALIASES};
pub use pattern::PatternCache;
pub use spec::{GroupDefinition, GroupShape, HostEntry, HostSpec};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use pattern::PatternTerm;

/// Flat variable mapping, in declaration order
pub type Vars = IndexMap<String, Value>;

/// Errors that can occur during inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hosts of group '{group}' must be a list, got {data}")]
    BadHostList { group: String, data: String },

    #[error("vars of group '{group}' must be a mapping, got {data}")]
    BadVars { group: String, data: String },

    #[error("children of group '{group}' must be a list of group names, got {data}")]
    BadChildren { group: String, data: String },

    #[error("hostvars entry for '{host}' must be a mapping, got {data}")]
    BadHostvars { host: String, data: String },

    #[error("invalid _meta section: {0}")]
    BadMeta(String),

    #[error("'{second}' refers to the local machine already declared as '{first}'")]
    DuplicateLocalhost { first: String, second: String },

    #[error("circular group dependency detected: {0}")]
    CircularDependency(String),

    #[error("invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("unsupported host specification: {0}")]
    UnsupportedSpec(String),

    #[error("dynamic inventory script failed: {0}")]
    DynamicInventoryFailed(String),

    #[error("host parse error: {0}")]
    HostParse(#[from] HostParseError),
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// The main inventory structure holding all hosts and groups
#[derive(Debug, Clone)]
pub struct Inventory {
    /// All hosts indexed by address, in first-seen order
    hosts: IndexMap<String, Host>,

    /// All groups indexed by name, in declaration order
    groups: IndexMap<String, Group>,

    /// Address the local machine was declared under
    localhost: Option<String>,

    /// Resolved patterns for this graph
    pattern_cache: PatternCache,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Create a new empty inventory with default groups
    pub fn new() -> Self {
        let mut all = Group::all();
        let mut ungrouped = Group::ungrouped();
        all.add_child(UNGROUPED);
        ungrouped.add_parent(ALL);

        let mut groups = IndexMap::new();
        groups.insert(ALL.to_string(), all);
        groups.insert(UNGROUPED.to_string(), ungrouped);

        Self {
            hosts: IndexMap::new(),
            groups,
            localhost: None,
            pattern_cache: PatternCache::new(),
        }
    }

    /// Build an inventory from any host specification
    pub fn from_spec(spec: impl Into<HostSpec>) -> InventoryResult<Self> {
        InventoryBuilder::new().build(spec.into())
    }

    /// Load an inventory from an inline spec, a spec file or a script
    pub fn load(source: &str) -> InventoryResult<Self> {
        Self::from_spec(HostSpec::load(source)?)
    }

    /// Rebuild the graph in place from a new specification.
    ///
    /// On error the current graph is left untouched.
    pub fn reload(&mut self, spec: impl Into<HostSpec>) -> InventoryResult<()> {
        let fresh = Self::from_spec(spec)?;
        self.hosts = fresh.hosts;
        self.groups = fresh.groups;
        self.localhost = fresh.localhost;
        self.pattern_cache.clear();
        debug!(hosts = self.hosts.len(), "inventory reloaded");
        Ok(())
    }

    /// Get a host by address
    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Get a group by name
    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Get all groups
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Get all host names
    pub fn host_names(&self) -> impl Iterator<Item = &String> {
        self.hosts.keys()
    }

    /// Get all group names
    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    /// Effective variables of a host
    pub fn host_vars(&self, name: &str) -> Option<&Vars> {
        self.hosts.get(name).map(|h| &h.vars)
    }

    /// Variables declared directly on a group
    pub fn group_vars(&self, name: &str) -> Option<&Vars> {
        self.groups.get(name).map(|g| &g.vars)
    }

    /// The host standing for the local machine, if one was declared
    pub fn localhost(&self) -> Option<&Host> {
        self.localhost.as_deref().and_then(|name| self.hosts.get(name))
    }

    /// Count total hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the inventory holds no hosts
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Number of memoized patterns
    pub fn cached_patterns(&self) -> usize {
        self.pattern_cache.len()
    }

    /// Resolve a host pattern to host addresses, in inventory order.
    ///
    /// Unknown names select nothing. Positive terms are applied first, then
    /// intersections, then exclusions; a pattern made only of exclusions
    /// starts from every host.
    pub fn list_hosts(&self, pattern: &str) -> InventoryResult<Vec<String>> {
        let pattern = pattern.trim();
        if let Some(cached) = self.pattern_cache.get(pattern) {
            return Ok(cached);
        }

        let selected = self.resolve(pattern)?;
        let hosts: Vec<String> = self
            .hosts
            .keys()
            .filter(|name| selected.contains(name.as_str()))
            .cloned()
            .collect();

        debug!(pattern, matched = hosts.len(), "resolved host pattern");
        self.pattern_cache.insert(pattern, hosts.clone());
        Ok(hosts)
    }

    fn resolve(&self, pattern: &str) -> InventoryResult<HashSet<&str>> {
        // Exact names win before splitting so IPv6 literals are never cut at ':'
        if pattern::is_all(pattern)
            || self.hosts.contains_key(pattern)
            || self.groups.contains_key(pattern)
        {
            return self.resolve_selector(pattern);
        }

        let terms = pattern::parse_terms(pattern);
        let mut selected: HashSet<&str> = HashSet::new();

        let has_include = terms.iter().any(|t| matches!(t, PatternTerm::Include(_)));
        if !has_include {
            selected.extend(self.hosts.keys().map(String::as_str));
        }

        for term in terms.iter().filter(|t| matches!(t, PatternTerm::Include(_))) {
            selected.extend(self.resolve_selector(term.selector())?);
        }
        for term in terms.iter().filter(|t| matches!(t, PatternTerm::Intersect(_))) {
            let other = self.resolve_selector(term.selector())?;
            selected.retain(|name| other.contains(name));
        }
        for term in terms.iter().filter(|t| matches!(t, PatternTerm::Exclude(_))) {
            for name in self.resolve_selector(term.selector())? {
                selected.remove(name);
            }
        }

        Ok(selected)
    }

    fn resolve_selector(&self, selector: &str) -> InventoryResult<HashSet<&str>> {
        let selector = selector.trim();

        if pattern::is_all(selector) {
            return Ok(self.hosts.keys().map(String::as_str).collect());
        }

        if let Some(group) = self.groups.get(selector) {
            return Ok(self.get_hosts_in_group_recursive(group));
        }

        if let Some((name, _)) = self.hosts.get_key_value(selector) {
            return Ok(HashSet::from([name.as_str()]));
        }

        if let Some(expr) = selector.strip_prefix('~') {
            let regex = pattern::compile_regex(expr)?;
            return Ok(self
                .hosts
                .keys()
                .filter(|name| regex.is_match(name))
                .map(String::as_str)
                .collect());
        }

        if pattern::is_glob(selector) {
            let glob = pattern::compile_glob(selector)?;
            return Ok(self
                .hosts
                .keys()
                .filter(|name| glob.matches(name))
                .map(String::as_str)
                .collect());
        }

        debug!(selector, "pattern term matched no group or host");
        Ok(HashSet::new())
    }

    /// Get all hosts in a group, including hosts from child groups
    fn get_hosts_in_group_recursive<'a>(&'a self, group: &'a Group) -> HashSet<&'a str> {
        let mut hosts = HashSet::new();
        let mut visited = HashSet::new();
        self.collect_group_hosts(group, &mut hosts, &mut visited);
        hosts
    }

    fn collect_group_hosts<'a>(
        &'a self,
        group: &'a Group,
        hosts: &mut HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) {
        if !visited.insert(group.name.as_str()) {
            return;
        }
        hosts.extend(group.hosts.iter().map(String::as_str));
        for child_name in &group.children {
            if let Some(child) = self.groups.get(child_name) {
                self.collect_group_hosts(child, hosts, visited);
            }
        }
    }

    /// Render the graph in the engine's inventory format.
    ///
    /// Every host is listed under `all.hosts` with its effective variables;
    /// nested groups list their direct members with no variables.
    pub fn to_engine_inventory(&self) -> Value {
        let mut hosts = Map::new();
        for host in self.hosts.values() {
            let mut vars: Map<String, Value> = Map::new();
            if let Some(port) = host.port {
                vars.insert("ansible_port".to_string(), Value::from(port));
            }
            for (key, value) in &host.vars {
                vars.insert(key.clone(), value.clone());
            }
            hosts.insert(host.name.clone(), Value::Object(vars));
        }

        let mut all = Map::new();
        if !hosts.is_empty() {
            all.insert("hosts".to_string(), Value::Object(hosts));
        }
        if let Some(group) = self.groups.get(ALL) {
            if !group.vars.is_empty() {
                all.insert("vars".to_string(), vars_to_value(&group.vars));
            }
            let mut visited = IndexSet::new();
            visited.insert(ALL.to_string());
            let children = self.render_children(group, &mut visited);
            if !children.is_empty() {
                all.insert("children".to_string(), Value::Object(children));
            }
        }

        let mut root = Map::new();
        root.insert(ALL.to_string(), Value::Object(all));
        Value::Object(root)
    }

    fn render_children(&self, group: &Group, visited: &mut IndexSet<String>) -> Map<String, Value> {
        let mut children = Map::new();
        for child_name in &group.children {
            let Some(child) = self.groups.get(child_name) else {
                continue;
            };
            if !visited.insert(child_name.clone()) {
                // Already rendered under another parent; a bare reference keeps the link
                children.insert(child_name.clone(), Value::Object(Map::new()));
                continue;
            }
            if child.name == UNGROUPED && child.hosts.is_empty() {
                continue;
            }
            children.insert(child_name.clone(), self.render_group(child, visited));
        }
        children
    }

    fn render_group(&self, group: &Group, visited: &mut IndexSet<String>) -> Value {
        let mut body = Map::new();
        if !group.hosts.is_empty() {
            let hosts = group
                .hosts
                .iter()
                .map(|h| (h.clone(), Value::Null))
                .collect::<Map<String, Value>>();
            body.insert("hosts".to_string(), Value::Object(hosts));
        }
        if !group.vars.is_empty() {
            body.insert("vars".to_string(), vars_to_value(&group.vars));
        }
        let children = self.render_children(group, visited);
        if !children.is_empty() {
            body.insert("children".to_string(), Value::Object(children));
        }
        Value::Object(body)
    }
}

fn vars_to_value(vars: &Vars) -> Value {
    Value::Object(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

impl std::fmt::Display for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Inventory ({} hosts, {} groups)",
            self.hosts.len(),
            self.groups.len()
        )?;

        for group in self.groups.values() {
            if group.is_empty() {
                continue;
            }
            writeln!(f, "  [{}]", group.name)?;
            for host_name in &group.hosts {
                if let Some(host) = self.hosts.get(host_name) {
                    writeln!(f, "    {}", host)?;
                }
            }
            for child in &group.children {
                writeln!(f, "    @{}", child)?;
            }
        }

        Ok(())
    }
}
