//! Builds an [`Inventory`] graph from a [`HostSpec`].

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::group::{self, Group, ALL, UNGROUPED};
use super::host::{split_address, Host};
use super::spec::{self, GroupShape, HostEntry, HostSpec, META_KEY};
use super::{Inventory, InventoryError, InventoryResult, Vars};

/// Assembles hosts, groups and effective variables from a host spec
#[derive(Debug, Default)]
pub struct InventoryBuilder {
    inventory: Inventory,
    /// Inline variables given with each host entry
    entry_vars: IndexMap<String, Vars>,
    /// Children declared by each group, linked once every group is known
    declared_children: IndexMap<String, Vec<String>>,
    /// Any repeated local alias is an error, not only a distinct one
    strict_localhost: bool,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the inventory graph
    pub fn build(mut self, spec: HostSpec) -> InventoryResult<Inventory> {
        match spec {
            HostSpec::Delimited(s) => self.add_sequence(spec::split_delimited(&s))?,
            HostSpec::List(items) => self.add_sequence(items)?,
            HostSpec::Groups(map) => self.add_groups(map)?,
        }

        debug!(
            hosts = self.inventory.hosts.len(),
            groups = self.inventory.groups.len(),
            "built inventory"
        );
        Ok(self.inventory)
    }

    fn add_sequence(&mut self, items: Vec<String>) -> InventoryResult<()> {
        self.strict_localhost = true;
        for item in items {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            self.register_host(&HostEntry::new(item), None)?;
        }
        self.place_ungrouped();
        self.compute_effective_vars(&HashMap::new());
        Ok(())
    }

    fn add_groups(&mut self, mut map: Map<String, Value>) -> InventoryResult<()> {
        let meta = map.remove(META_KEY);

        for (name, value) in &map {
            let definition = GroupShape::parse(value).into_definition(name)?;
            debug!(group = %name, hosts = definition.hosts.len(), "parsed group");

            self.inventory
                .groups
                .entry(name.clone())
                .or_insert_with(|| Group::new(name.as_str()))
                .merge_vars(&definition.vars);

            for entry in &definition.hosts {
                self.register_host(entry, Some(name.as_str()))?;
            }

            if !definition.children.is_empty() {
                self.declared_children
                    .entry(name.clone())
                    .or_default()
                    .extend(definition.children);
            }
        }

        self.link_children()?;
        self.attach_roots();
        self.place_ungrouped();

        let hostvars = parse_meta(meta)?;
        self.compute_effective_vars(&hostvars);
        Ok(())
    }

    /// Add a host, binding local aliases to a single local host
    fn register_host(&mut self, entry: &HostEntry, group: Option<&str>) -> InventoryResult<()> {
        let (name, port) = split_address(&entry.address)?;

        if Host::is_local_alias(&name) {
            if let Some(first) = &self.inventory.localhost {
                if *first != name || self.strict_localhost {
                    return Err(InventoryError::DuplicateLocalhost {
                        first: first.clone(),
                        second: name,
                    });
                }
            } else {
                self.inventory.localhost = Some(name.clone());
            }
        }

        let host = self
            .inventory
            .hosts
            .entry(name.clone())
            .or_insert_with(|| Host::new(name.as_str()));
        if port.is_some() {
            host.port = port;
        }
        host.local = Host::is_local_alias(&name);
        host.add_to_group(ALL);
        if let Some(group) = group {
            host.add_to_group(group);
        }

        if let Some(all) = self.inventory.groups.get_mut(ALL) {
            all.add_host(name.as_str());
        }
        if let Some(group) = group.and_then(|g| self.inventory.groups.get_mut(g)) {
            group.add_host(name.as_str());
        }

        let vars = self.entry_vars.entry(name).or_default();
        for (key, value) in &entry.vars {
            vars.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn link_children(&mut self) -> InventoryResult<()> {
        let declared = std::mem::take(&mut self.declared_children);
        for (parent, children) in declared {
            for child in children {
                if group::is_builtin(&child) {
                    warn!(group = %parent, child = %child, "ignoring built-in group declared as a child");
                    continue;
                }
                if !self.inventory.groups.contains_key(&child) {
                    warn!(group = %parent, child = %child, "ignoring unknown child group");
                    continue;
                }
                if self.reaches(&child, &parent) {
                    return Err(InventoryError::CircularDependency(format!(
                        "{} -> {}",
                        parent, child
                    )));
                }

                if let Some(group) = self.inventory.groups.get_mut(&parent) {
                    group.add_child(child.as_str());
                }
                if let Some(group) = self.inventory.groups.get_mut(&child) {
                    group.add_parent(parent.as_str());
                }
            }
        }
        Ok(())
    }

    /// Whether `target` is `from` or one of its descendants
    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut queue = VecDeque::from([from.to_string()]);
        let mut seen = std::collections::HashSet::new();
        while let Some(name) = queue.pop_front() {
            if name == target {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(group) = self.inventory.groups.get(&name) {
                queue.extend(group.children.iter().cloned());
            }
        }
        false
    }

    /// Every group nobody claims as a child hangs off `all`
    fn attach_roots(&mut self) {
        let roots: Vec<String> = self
            .inventory
            .groups
            .values()
            .filter(|g| !g.is_builtin() && g.parents.is_empty())
            .map(|g| g.name.clone())
            .collect();

        for name in roots {
            if let Some(all) = self.inventory.groups.get_mut(ALL) {
                all.add_child(name.as_str());
            }
            if let Some(group) = self.inventory.groups.get_mut(&name) {
                group.add_parent(ALL);
            }
        }
    }

    /// Hosts with no membership besides `all` belong to `ungrouped`
    fn place_ungrouped(&mut self) {
        let mut ungrouped = Vec::new();
        for host in self.inventory.hosts.values_mut() {
            if host.groups.iter().all(|g| group::is_builtin(g)) {
                host.add_to_group(UNGROUPED);
                ungrouped.push(host.name.clone());
            }
        }
        if let Some(group) = self.inventory.groups.get_mut(UNGROUPED) {
            for name in ungrouped {
                group.add_host(name);
            }
        }
    }

    /// Merge group vars (shallow to deep), entry vars, then `_meta.hostvars`
    fn compute_effective_vars(&mut self, hostvars: &HashMap<String, Vars>) {
        let depths = self.group_depths();
        let order: HashMap<&str, usize> = self
            .inventory
            .groups
            .keys()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut effective: Vec<(String, Vars)> = Vec::with_capacity(self.inventory.hosts.len());
        for host in self.inventory.hosts.values() {
            let mut groups = self.ancestry(host);
            groups.sort_by_key(|name| {
                (
                    depths.get(name.as_str()).copied().unwrap_or(usize::MAX),
                    order.get(name.as_str()).copied().unwrap_or(usize::MAX),
                )
            });

            let mut vars = Vars::new();
            for name in &groups {
                if let Some(group) = self.inventory.groups.get(name) {
                    merge(&mut vars, &group.vars);
                }
            }
            if let Some(entry) = self.entry_vars.get(&host.name) {
                merge(&mut vars, entry);
            }
            if let Some(overrides) = hostvars.get(&host.name) {
                merge(&mut vars, overrides);
            }
            effective.push((host.name.clone(), vars));
        }

        for name in hostvars.keys() {
            if !self.inventory.hosts.contains_key(name) {
                debug!(host = %name, "ignoring hostvars for unknown host");
            }
        }

        for (name, vars) in effective {
            if let Some(host) = self.inventory.hosts.get_mut(&name) {
                host.vars = vars;
            }
        }
    }

    /// Groups containing the host directly or through descendants
    fn ancestry(&self, host: &Host) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut queue: VecDeque<String> = host.groups.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if found.contains(&name) {
                continue;
            }
            if let Some(group) = self.inventory.groups.get(&name) {
                queue.extend(group.parents.iter().cloned());
            }
            found.push(name);
        }
        if !found.iter().any(|g| g == ALL) {
            found.push(ALL.to_string());
        }
        found
    }

    /// Shortest distance of each group from `all`
    fn group_depths(&self) -> HashMap<String, usize> {
        let mut depths = HashMap::new();
        let mut queue = VecDeque::from([(ALL.to_string(), 0usize)]);
        while let Some((name, depth)) = queue.pop_front() {
            if depths.contains_key(&name) {
                continue;
            }
            if let Some(group) = self.inventory.groups.get(&name) {
                for child in &group.children {
                    queue.push_back((child.clone(), depth + 1));
                }
            }
            depths.insert(name, depth);
        }
        depths
    }
}

fn merge(target: &mut Vars, source: &Vars) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

/// Read `_meta.hostvars` into per-host override maps
fn parse_meta(meta: Option<Value>) -> InventoryResult<HashMap<String, Vars>> {
    let meta = match meta {
        None | Some(Value::Null) => return Ok(HashMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(InventoryError::BadMeta(format!(
                "expected a mapping, got {}",
                other
            )))
        }
    };

    let hostvars = match meta.get("hostvars") {
        None | Some(Value::Null) => return Ok(HashMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(InventoryError::BadMeta(format!(
                "hostvars must be a mapping, got {}",
                other
            )))
        }
    };

    hostvars
        .iter()
        .map(|(host, vars)| match vars {
            Value::Object(map) => Ok((
                host.clone(),
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            Value::Null => Ok((host.clone(), Vars::new())),
            other => Err(InventoryError::BadHostvars {
                host: host.clone(),
                data: other.to_string(),
            }),
        })
        .collect()
}
