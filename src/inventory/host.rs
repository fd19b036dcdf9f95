//! Host definition for the Fleetcall inventory.
//!
//! A [`Host`] is a single managed target keyed by its address. Its `vars`
//! hold the effective, already merged variable set produced by the
//! inventory builder.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::Vars;

/// Names that all refer to the machine running Fleetcall.
pub const LOCAL_ALIASES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// A managed host in the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Host address (hostname or IP, without port)
    pub name: String,

    /// Explicit port given as part of the address (`host:2222`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Effective variables (group vars, entry vars, then `_meta.hostvars`)
    #[serde(default)]
    pub vars: Vars,

    /// Groups this host is a direct member of
    #[serde(default)]
    pub groups: IndexSet<String>,

    /// Whether this host is the distinguished local machine
    #[serde(default)]
    pub local: bool,
}

impl Host {
    /// Create a new host with the given address
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
            vars: IndexMap::new(),
            groups: IndexSet::new(),
            local: false,
        }
    }

    /// Add this host to a group
    pub fn add_to_group(&mut self, group: impl Into<String>) {
        self.groups.insert(group.into());
    }

    /// Check whether an address names the local machine
    pub fn is_local_alias(name: &str) -> bool {
        LOCAL_ALIASES.contains(&name)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::hash::Hash for Host {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.contains(':') && self.port.is_some() {
            write!(f, "[{}]", self.name)?;
        } else {
            write!(f, "{}", self.name)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port` into address and port.
///
/// A bare address with more than one colon is taken as an IPv6 literal
/// without a port.
pub fn split_address(input: &str) -> Result<(String, Option<u16>), HostParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(HostParseError::EmptyInput);
    }

    if let Some(rest) = input.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .ok_or_else(|| HostParseError::InvalidAddress(input.to_string()))?;
        if addr.is_empty() {
            return Err(HostParseError::InvalidAddress(input.to_string()));
        }
        return match tail {
            "" => Ok((addr.to_string(), None)),
            _ => {
                let port = tail
                    .strip_prefix(':')
                    .ok_or_else(|| HostParseError::InvalidAddress(input.to_string()))?;
                Ok((addr.to_string(), Some(parse_port(port)?)))
            }
        };
    }

    match input.matches(':').count() {
        0 => Ok((input.to_string(), None)),
        1 => {
            let (addr, port) = input.split_once(':').unwrap_or((input, ""));
            if addr.is_empty() {
                return Err(HostParseError::InvalidAddress(input.to_string()));
            }
            Ok((addr.to_string(), Some(parse_port(port)?)))
        }
        _ => Ok((input.to_string(), None)),
    }
}

fn parse_port(value: &str) -> Result<u16, HostParseError> {
    value
        .parse()
        .map_err(|_| HostParseError::InvalidPort(value.to_string()))
}

/// Errors that can occur when parsing a host address
#[derive(Debug, thiserror::Error)]
pub enum HostParseError {
    #[error("empty host address")]
    EmptyInput,
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid host address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_new() {
        let host = Host::new("10.0.0.1");
        assert_eq!(host.name, "10.0.0.1");
        assert!(host.port.is_none());
        assert!(!host.local);
    }

    #[test]
    fn test_host_display_with_port() {
        let mut host = Host::new("web1.example.com");
        host.port = Some(2222);
        assert_eq!(host.to_string(), "web1.example.com:2222");

        let mut v6 = Host::new("fe80::1");
        v6.port = Some(2200);
        assert_eq!(v6.to_string(), "[fe80::1]:2200");
    }

    #[test]
    fn test_split_address_ipv6() {
        assert_eq!(
            split_address("fe80::1").unwrap(),
            ("fe80::1".to_string(), None)
        );
        assert_eq!(
            split_address("[fe80::1]:2200").unwrap(),
            ("fe80::1".to_string(), Some(2200))
        );
        assert_eq!(split_address("[::1]").unwrap(), ("::1".to_string(), None));
    }

    #[test]
    fn test_split_address_errors() {
        assert!(matches!(split_address("  "), Err(HostParseError::EmptyInput)));
        assert!(matches!(
            split_address("db1:ssh"),
            Err(HostParseError::InvalidPort(_))
        ));
        assert!(matches!(
            split_address("[fe80::1"),
            Err(HostParseError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_local_aliases() {
        assert!(Host::is_local_alias("localhost"));
        assert!(Host::is_local_alias("127.0.0.1"));
        assert!(Host::is_local_alias("::1"));
        assert!(!Host::is_local_alias("127.0.0.2"));
    }

    #[test]
    fn test_host_groups() {
        let mut host = Host::new("test");
        host.add_to_group("webservers");
        host.add_to_group("webservers");
        assert_eq!(host.groups.len(), 1);
        assert!(host.groups.contains("webservers"));
    }
}
