//! # Fleetcall - Ad-hoc Runs over an Ansible-compatible Engine
//!
//! Fleetcall turns a loosely shaped host specification into an inventory
//! graph and runs a single module (or an existing playbook) against it
//! through an external automation engine, collecting per-host results.
//!
//! ## Core Concepts
//!
//! - **Host spec**: a delimited string, an address list, or a mapping of groups
//! - **Inventory**: hosts and groups with pre-merged effective variables
//! - **Pattern**: a selector over the inventory (`web:&prod:!web3`)
//! - **Engine**: whatever actually executes the play
//! - **Result set**: per-host records split into `contacted` and `dark`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────────────┐
//! │  Host spec   │──▶│ Inventory builder  │──▶│      Inventory      │
//! └──────────────┘   └────────────────────┘   └─────────────────────┘
//!                                                        │
//!                                                        ▼
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────────────┐
//! │  Result set  │◀──│  Result collector  │◀──│ Runner ──▶ Engine   │
//! └──────────────┘   └────────────────────┘   └─────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use fleetcall::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let inventory = Inventory::from_spec(HostSpec::from_value(serde_json::json!({
//!         "web": {"hosts": ["10.0.0.1", "10.0.0.2"], "vars": {"http_port": 80}},
//!     }))?)?;
//!
//!     let results = Runner::new(inventory)
//!         .module("shell")
//!         .args("uptime")
//!         .pattern("web")
//!         .run(&AnsiblePlaybookEngine::new())
//!         .await?;
//!
//!     println!("{} contacted, {} dark", results.contacted.len(), results.dark.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod runner;

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Config;
    pub use crate::engine::{
        AnsiblePlaybookEngine, ConnectionOptions, Engine, EngineError, EngineEvent,
        EventSender, ExecutionRequest, ExecutionTarget, ModuleArgs, Play, TaskOutcome, TaskSpec,
    };
    pub use crate::error::{Error, Result};
    pub use crate::inventory::{Group, Host, HostSpec, Inventory, InventoryError, Vars};
    pub use crate::runner::{check_module_args, PlaybookRunner, ResultSet, Runner};
}

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
