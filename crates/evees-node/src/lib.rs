//! Evees Node - configuration and wiring for a content-addressed node
//!
//! Puts the storage and pinning crates together:
//! - `NodeConfig`: TOML configuration with `EVEES_*` environment overrides
//! - `EveesNode`: local and IPFS backends behind a multi-source resolver,
//!   plus the pin flush loop

pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{EveesNode, LOCAL_CAS_ID};
