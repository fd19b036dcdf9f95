//! Group definition for the Fleetcall inventory.
//!
//! This module provides the `Group` structure representing a logical grouping
//! of hosts with shared variables and parent-child relationships.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::Vars;

/// Name of the group holding every host
pub const ALL: &str = "all";

/// Name of the group holding hosts with no other membership
pub const UNGROUPED: &str = "ungrouped";

/// A group of hosts in the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,

    /// Host names belonging to this group, in declaration order
    #[serde(default)]
    pub hosts: IndexSet<String>,

    /// Child group names
    #[serde(default)]
    pub children: IndexSet<String>,

    /// Parent group names (computed from children relationships)
    #[serde(skip)]
    pub parents: IndexSet<String>,

    /// Group-specific variables
    #[serde(default)]
    pub vars: Vars,
}

impl Group {
    /// Create a new group with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: IndexSet::new(),
            children: IndexSet::new(),
            parents: IndexSet::new(),
            vars: IndexMap::new(),
        }
    }

    /// Create the special "all" group
    pub fn all() -> Self {
        Self::new(ALL)
    }

    /// Create the special "ungrouped" group
    pub fn ungrouped() -> Self {
        Self::new(UNGROUPED)
    }

    /// Whether this is `all` or `ungrouped`
    pub fn is_builtin(&self) -> bool {
        is_builtin(&self.name)
    }

    /// Add a host to this group
    pub fn add_host(&mut self, host: impl Into<String>) {
        self.hosts.insert(host.into());
    }

    /// Check if a host belongs to this group
    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Add a child group
    pub fn add_child(&mut self, child: impl Into<String>) {
        self.children.insert(child.into());
    }

    /// Check if a group is a child of this group
    pub fn has_child(&self, child: &str) -> bool {
        self.children.contains(child)
    }

    /// Add a parent group (internal use for reverse lookups)
    pub fn add_parent(&mut self, parent: impl Into<String>) {
        self.parents.insert(parent.into());
    }

    /// Check if a group is a parent of this group
    pub fn has_parent(&self, parent: &str) -> bool {
        self.parents.contains(parent)
    }

    /// Check if this group is empty (no hosts and no children)
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.children.is_empty()
    }

    /// Get the number of direct host members
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Merge variables from another source (other takes precedence)
    pub fn merge_vars(&mut self, other: &Vars) {
        for (key, value) in other {
            self.vars.insert(key.clone(), value.clone());
        }
    }
}

/// Whether a group name is one of the two groups every inventory has
pub fn is_builtin(name: &str) -> bool {
    name == ALL || name == UNGROUPED
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Group {}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} hosts", self.name, self.hosts.len())?;
        if !self.children.is_empty() {
            write!(f, ", {} children", self.children.len())?;
        }
        write!(f, ")")
    }
}
