//! Evees CAS - content-addressed entity stores
//!
//! Provides the storage side of evees entities:
//! - `CasStore`: the uniform create/get contract every backend implements
//! - Backends: in-memory cache, IPFS HTTP API, and a write-back cache layered
//!   over any remote backend
//! - `Connection`: readiness tracking composed into network backends
//! - `MultiSourceResolver`: concurrent lookups across all backends that
//!   return as soon as every hash is found or every backend has answered

pub mod cached;
pub mod connection;
pub mod entity;
pub mod ipfs;
pub mod memory;
pub mod resolver;
pub mod store;

pub use cached::CachedStore;
pub use connection::{Connection, ConnectionState};
pub use entity::{Entity, EntityCreate};
pub use ipfs::{IpfsConfig, IpfsStore};
pub use memory::MemoryStore;
pub use resolver::MultiSourceResolver;
pub use store::{ensure_hash, CasStore};

use evees_cid::CidError;
use evees_pinner::PinError;
use thiserror::Error;

/// Default time budget for a single backend request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default time the resolver waits for one backend to answer one hash.
/// Longer than a backend request so the backend's own timeout fires first.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 2 * DEFAULT_REQUEST_TIMEOUT_MS;

/// Errors originating from the storage layer.
#[derive(Error, Debug)]
pub enum CasError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Request to {cas_id} timed out after {timeout_ms}ms")]
    RequestTimeout { cas_id: String, timeout_ms: u64 },

    #[error("Hash mismatch: computed {computed}, backend returned {returned}")]
    HashMismatch { computed: String, returned: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Cid(#[from] CidError),

    #[error("Backend {cas_id} failed: {reason}")]
    Backend { cas_id: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Pin(#[from] PinError),
}

impl CasError {
    /// Integrity and content-addressing errors. A backend that reports one of
    /// these returned data that cannot be trusted, as opposed to simply not
    /// delivering it.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CasError::HashMismatch { .. } | CasError::Cid(_))
    }
}
