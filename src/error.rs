//! Error types for Fleetcall.
//!
//! Spec-level and invocation-level problems are reported through [`Error`].
//! Per-host failures during a run are never errors: they show up as data in
//! the `dark` bucket of a [`ResultSet`](crate::runner::ResultSet).

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;
use crate::inventory::InventoryError;

/// Result type alias for Fleetcall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Fleetcall.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Inventory Errors
    // ========================================================================
    /// The host specification could not be turned into an inventory.
    #[error("Malformed host specification: {0}")]
    MalformedSpec(#[from] InventoryError),

    /// The inventory holds no hosts at all.
    #[error("Inventory is empty")]
    EmptyInventory,

    /// The host pattern selects nothing.
    #[error("Pattern '{pattern}' does not match any hosts")]
    PatternMatch {
        /// Pattern that was resolved
        pattern: String,
    },

    // ========================================================================
    // Invocation Errors
    // ========================================================================
    /// The module needs arguments and none were given.
    #[error("No argument passed to '{module}' module")]
    MissingArguments {
        /// Module name
        module: String,
    },

    /// Playbook file does not exist.
    #[error("Playbook not found: {0}")]
    PlaybookNotFound(PathBuf),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The automation engine failed while running.
    #[error("Engine execution failed: {0}")]
    EngineExecution(#[from] EngineError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new pattern match error.
    pub fn pattern_match(pattern: impl Into<String>) -> Self {
        Self::PatternMatch {
            pattern: pattern.into(),
        }
    }

    /// Creates a new missing arguments error.
    pub fn missing_arguments(module: impl Into<String>) -> Self {
        Self::MissingArguments {
            module: module.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EngineExecution(_) => 3,
            Error::MalformedSpec(_) | Error::EmptyInventory | Error::PatternMatch { .. } => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::EmptyInventory.to_string(), "Inventory is empty");
        assert_eq!(
            Error::pattern_match("web*").to_string(),
            "Pattern 'web*' does not match any hosts"
        );
        assert_eq!(
            Error::missing_arguments("shell").to_string(),
            "No argument passed to 'shell' module"
        );
    }

    #[test]
    fn test_malformed_spec_from_inventory_error() {
        let err: Error = InventoryError::DuplicateLocalhost {
            first: "localhost".to_string(),
            second: "127.0.0.1".to_string(),
        }
        .into();
        assert!(matches!(err, Error::MalformedSpec(_)));
        assert_eq!(err.exit_code(), 5);
    }
}
