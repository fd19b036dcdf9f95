//! Inventory commands - list hosts
//!
//! This module implements the `list-hosts` subcommand.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use fleetcall::inventory::{Inventory, ALL};
use indexmap::IndexMap;

/// Arguments for list-hosts command
#[derive(Parser, Debug, Clone)]
pub struct ListHostsArgs {
    /// Host pattern to match
    #[arg(default_value = "all")]
    pub pattern: String,

    /// Show host variables
    #[arg(long)]
    pub vars: bool,

    /// Group by groups instead of flat list
    #[arg(long)]
    pub graph: bool,
}

impl ListHostsArgs {
    /// Execute the list-hosts command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let inventory = ctx.load_inventory()?;
        let hosts = inventory
            .list_hosts(&self.pattern)
            .map_err(fleetcall::Error::from)?;

        if hosts.is_empty() {
            ctx.output
                .warning(&format!("No hosts matched pattern: {}", self.pattern));
            return Ok(0);
        }

        if ctx.output.is_json() {
            let listing: IndexMap<&str, serde_json::Value> = hosts
                .iter()
                .map(|name| {
                    let vars = inventory
                        .host_vars(name)
                        .map(|v| serde_json::to_value(v).unwrap_or_default())
                        .unwrap_or_default();
                    (name.as_str(), vars)
                })
                .collect();
            if self.vars {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&hosts)?);
            }
        } else if self.graph {
            ctx.output
                .section(&format!("Hosts matching pattern: {}", self.pattern));
            for (group, members) in group_listing(&inventory, &hosts) {
                ctx.output.list(&format!("@{}", group), &members);
            }
        } else {
            ctx.output.section(&format!("Hosts ({})", hosts.len()));
            for name in &hosts {
                println!("  {}", name);
            }

            if self.vars {
                println!();
                for name in &hosts {
                    if let Some(vars) = inventory.host_vars(name).filter(|v| !v.is_empty()) {
                        println!("{}:", name);
                        for (key, value) in vars {
                            println!("  {}: {}", key, value);
                        }
                    }
                }
            }
        }

        Ok(0)
    }
}

/// Selected hosts under each group they directly belong to, in group order
fn group_listing(inventory: &Inventory, hosts: &[String]) -> IndexMap<String, Vec<String>> {
    let mut listing = IndexMap::new();
    for group in inventory.groups().filter(|g| g.name != ALL) {
        let members: Vec<String> = hosts
            .iter()
            .filter(|h| group.has_host(h))
            .cloned()
            .collect();
        if !members.is_empty() {
            listing.insert(group.name.clone(), members);
        }
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcall::inventory::HostSpec;
    use serde_json::json;

    #[test]
    fn test_group_listing() {
        let inventory = Inventory::from_spec(
            HostSpec::from_value(json!({"web": ["w1", "w2"], "db": ["d1"], "solo": {}}))
                .unwrap(),
        )
        .unwrap();
        let hosts = inventory.list_hosts("all").unwrap();
        let listing = group_listing(&inventory, &hosts);

        assert_eq!(listing["web"], vec!["w1", "w2"]);
        assert_eq!(listing["db"], vec!["d1"]);
        assert_eq!(listing["solo"], vec!["solo"]);
        assert!(!listing.contains_key("all"));
    }
}
