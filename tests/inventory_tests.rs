//! Integration tests for inventory building, loading and pattern resolution.

mod common;

use common::*;
use fleetcall::inventory::{HostSpec, Inventory, InventoryError, ALL, UNGROUPED};
use fleetcall::Error;
use pretty_assertions::assert_eq;
use serde_json::json;

fn inventory(value: serde_json::Value) -> Inventory {
    Inventory::from_spec(HostSpec::from_value(value).unwrap()).unwrap()
}

// ============================================================================
// Mapping Specifications
// ============================================================================

#[test]
fn test_mixed_group_shapes() {
    let inv = inventory(json!({
        "group1": ["1.1.1.1"],
        "group2": {"hosts": ["2.2.2.2"], "vars": {"v": "x"}},
        "_meta": {"hostvars": {}}
    }));

    let mut hosts: Vec<_> = inv.host_names().cloned().collect();
    hosts.sort();
    assert_eq!(hosts, vec!["1.1.1.1", "2.2.2.2"]);

    let all = inv.get_group(ALL).unwrap();
    assert!(all.has_child("group1"));
    assert!(all.has_child("group2"));

    assert_eq!(inv.host_vars("2.2.2.2").unwrap().get("v"), Some(&json!("x")));
    assert!(inv.host_vars("1.1.1.1").unwrap().is_empty());
    assert!(inv.get_group("_meta").is_none());
}

#[test]
fn test_nested_children_resolve_through_parent() {
    let inv = inventory(json!({
        "prod": {"children": ["web", "db"], "vars": {"env": "prod"}},
        "web": {"hosts": ["w1", "w2"]},
        "db": {"hosts": ["d1"], "vars": {"env": "db-override"}}
    }));

    assert_eq!(inv.list_hosts("prod").unwrap(), vec!["w1", "w2", "d1"]);

    let all = inv.get_group(ALL).unwrap();
    assert!(all.has_child("prod"));
    assert!(!all.has_child("web"));

    // The deeper group wins over its parent
    assert_eq!(inv.host_vars("d1").unwrap()["env"], json!("db-override"));
    assert_eq!(inv.host_vars("w1").unwrap()["env"], json!("prod"));
}

#[test]
fn test_group_inspection() {
    let inv = inventory(json!({
        "web": {"hosts": ["w1"], "vars": {"http_port": 80}},
        "db": ["d1"]
    }));

    let names: Vec<_> = inv.group_names().map(String::as_str).collect();
    assert!(names.contains(&"web"));
    assert!(names.contains(&"db"));
    assert!(names.contains(&ALL));
    assert_eq!(inv.group_vars("web").unwrap()["http_port"], json!(80));
    assert!(inv.group_vars("db").unwrap().is_empty());
    assert!(inv.group_vars("missing").is_none());
}

#[test]
fn test_hostvars_override_group_vars() {
    let inv = inventory(json!({
        "web": {"hosts": ["w1"], "vars": {"http_port": 80}},
        "_meta": {"hostvars": {"w1": {"http_port": 8080}}}
    }));
    assert_eq!(inv.host_vars("w1").unwrap()["http_port"], json!(8080));
}

#[test]
fn test_host_entry_mappings() {
    let inv = inventory(json!({
        "web": {"hosts": [
            {"hostname": "10.0.0.5", "port": "2222", "username": "deploy", "password": "s3cret"},
            "10.0.0.6"
        ]}
    }));

    let vars = inv.host_vars("10.0.0.5").unwrap();
    assert_eq!(vars["ansible_port"], json!(2222));
    assert_eq!(vars["ansible_user"], json!("deploy"));
    assert_eq!(vars["ansible_password"], json!("s3cret"));
    assert_eq!(inv.list_hosts("web").unwrap(), vec!["10.0.0.5", "10.0.0.6"]);
}

#[test]
fn test_circular_children_rejected() {
    let result = Inventory::from_spec(
        HostSpec::from_value(json!({
            "a": {"children": ["b"]},
            "b": {"children": ["a"]}
        }))
        .unwrap(),
    );
    assert!(matches!(result, Err(InventoryError::CircularDependency(_))));
}

#[test]
fn test_bad_shapes_are_malformed() {
    let bad_hosts = Inventory::from_spec(HostSpec::from_value(json!({"g": {"hosts": 5}})).unwrap());
    assert!(matches!(bad_hosts, Err(InventoryError::BadHostList { .. })));

    let bad_vars =
        Inventory::from_spec(HostSpec::from_value(json!({"g": {"hosts": [], "vars": [1]}})).unwrap());
    assert!(matches!(bad_vars, Err(InventoryError::BadVars { .. })));

    let err: Error = bad_hosts.unwrap_err().into();
    assert!(matches!(err, Error::MalformedSpec(_)));
}

// ============================================================================
// Sequence Specifications
// ============================================================================

#[test]
fn test_delimited_and_list_agree() {
    let from_string = Inventory::from_spec("10.0.0.1, 10.0.0.2 10.0.0.3").unwrap();
    let from_list = Inventory::from_spec(vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]).unwrap();

    assert_eq!(
        from_string.host_names().collect::<Vec<_>>(),
        from_list.host_names().collect::<Vec<_>>()
    );
    assert_eq!(
        from_string.list_hosts(UNGROUPED).unwrap(),
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
    );
}

#[test]
fn test_duplicate_local_alias_in_sequence() {
    let result = Inventory::from_spec(vec!["localhost", "127.0.0.1"]);
    assert!(matches!(
        result,
        Err(InventoryError::DuplicateLocalhost { .. })
    ));

    let single = Inventory::from_spec("localhost,10.0.0.1").unwrap();
    assert_eq!(single.localhost().unwrap().name, "localhost");
}

#[test]
fn test_empty_spec_builds_empty_inventory() {
    let inv = Inventory::from_spec("  ,  ").unwrap();
    assert!(inv.is_empty());
    assert!(inv.get_group(ALL).unwrap().has_child(UNGROUPED));
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn test_load_json_file() {
    let (_dir, path) = write_fixture(
        "hosts.json",
        r#"{"web": {"hosts": ["w1"], "vars": {"tier": "front"}}}"#,
    );
    let inv = Inventory::load(path.to_str().unwrap()).unwrap();
    assert_eq!(inv.list_hosts("web").unwrap(), vec!["w1"]);
    assert_eq!(inv.host_vars("w1").unwrap()["tier"], json!("front"));
}

#[test]
fn test_load_yaml_file() {
    let (_dir, path) = write_fixture(
        "hosts.yml",
        "db:\n  hosts:\n    - d1\n    - d2\n  vars:\n    pg_version: 15\n",
    );
    let inv = Inventory::load(path.to_str().unwrap()).unwrap();
    assert_eq!(inv.list_hosts("db").unwrap(), vec!["d1", "d2"]);
    assert_eq!(inv.host_vars("d2").unwrap()["pg_version"], json!(15));
}

#[test]
fn test_load_inline_sources() {
    let inv = Inventory::load("a.example.com,b.example.com").unwrap();
    assert_eq!(inv.host_count(), 2);

    let inv = Inventory::load(r#"{"web": ["w1", "w2"]}"#).unwrap();
    assert_eq!(inv.list_hosts("web").unwrap(), vec!["w1", "w2"]);

    let inv = Inventory::load(r#"["x1", "x2"]"#).unwrap();
    assert_eq!(inv.list_hosts("all").unwrap(), vec!["x1", "x2"]);
}

#[test]
fn test_load_bracketed_ipv6_list() {
    let inv = Inventory::load("[fe80::1]:2222,10.0.0.1").unwrap();
    assert_eq!(inv.list_hosts("all").unwrap(), vec!["fe80::1", "10.0.0.1"]);
    assert_eq!(inv.get_host("fe80::1").unwrap().port, Some(2222));

    let exported = inv.to_engine_inventory();
    assert_eq!(exported["all"]["hosts"]["fe80::1"]["ansible_port"], json!(2222));
}

#[cfg(unix)]
#[test]
fn test_load_dynamic_script() {
    let dir = tempfile::TempDir::new().unwrap();
    let script = write_inventory_script(
        dir.path(),
        r#"{"app": {"hosts": ["a1", "a2"]}, "_meta": {"hostvars": {"a1": {"role": "leader"}}}}"#,
    );

    let inv = Inventory::load(script.to_str().unwrap()).unwrap();
    assert_eq!(inv.list_hosts("app").unwrap(), vec!["a1", "a2"]);
    assert_eq!(inv.host_vars("a1").unwrap()["role"], json!("leader"));
}

#[cfg(unix)]
#[test]
fn test_failing_dynamic_script() {
    let dir = tempfile::TempDir::new().unwrap();
    let script = write_failing_script(dir.path());

    let result = Inventory::load(script.to_str().unwrap());
    match result {
        Err(InventoryError::DynamicInventoryFailed(msg)) => {
            assert!(msg.contains("no inventory today"))
        }
        other => panic!("expected script failure, got {:?}", other),
    }
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn test_pattern_operators() {
    let inv = inventory(json!({
        "web": ["w1", "w2", "shared"],
        "db": ["d1", "shared"]
    }));

    assert_eq!(inv.list_hosts("web:db").unwrap(), vec!["w1", "w2", "shared", "d1"]);
    assert_eq!(inv.list_hosts("web:&db").unwrap(), vec!["shared"]);
    assert_eq!(inv.list_hosts("web:!db").unwrap(), vec!["w1", "w2"]);
    assert_eq!(inv.list_hosts("!web").unwrap(), vec!["d1"]);
    assert_eq!(inv.list_hosts("w*").unwrap(), vec!["w1", "w2"]);
    assert_eq!(inv.list_hosts("~d\\d").unwrap(), vec!["d1"]);
    assert!(inv.list_hosts("nothing-here").unwrap().is_empty());
}

#[test]
fn test_invalid_regex_pattern() {
    let inv = Inventory::from_spec("h1").unwrap();
    assert!(matches!(
        inv.list_hosts("~("),
        Err(InventoryError::InvalidPattern(_))
    ));
}

#[test]
fn test_reload_replaces_graph_and_cache() {
    let mut inv = Inventory::from_spec("old1,old2").unwrap();
    inv.list_hosts("all").unwrap();
    assert_eq!(inv.cached_patterns(), 1);

    inv.reload("new1").unwrap();
    assert_eq!(inv.cached_patterns(), 0);
    assert_eq!(inv.list_hosts("all").unwrap(), vec!["new1"]);

    // A broken spec leaves the graph untouched
    assert!(inv.reload(vec!["localhost", "localhost"]).is_err());
    assert_eq!(inv.list_hosts("all").unwrap(), vec!["new1"]);
}

// ============================================================================
// Engine Export
// ============================================================================

#[test]
fn test_engine_inventory_layout() {
    let inv = inventory(json!({
        "web": {"hosts": ["w1:2222"], "vars": {"http_port": 80}},
        "db": ["d1"]
    }));
    let exported = inv.to_engine_inventory();

    let all = &exported["all"];
    assert_eq!(all["hosts"]["w1"]["ansible_port"], json!(2222));
    assert_eq!(all["hosts"]["w1"]["http_port"], json!(80));
    assert!(all["children"]["web"]["hosts"]
        .as_object()
        .unwrap()
        .contains_key("w1"));
    assert!(all["children"]["db"]["hosts"]
        .as_object()
        .unwrap()
        .contains_key("d1"));
}
