//! Evees Pinner - durable pin ledger and remote pinning flush loop
//!
//! Objects stored optimistically in a fast backend are registered here as
//! unpinned references. A periodic flush pushes them in batches to a remote
//! pinning service and marks them pinned only once that exact batch is
//! acknowledged:
//! - Ledger: redb table of references plus an index of the unpinned ones
//! - References: plain content hashes or database addresses, pinned through
//!   different endpoints
//! - Flush: at most one in flight, failed batches retried on the next tick

pub mod cache;
pub mod ledger;
pub mod reference;
pub mod service;

pub use cache::{FlushHandle, FlushOutcome, FlushReport, PinCache};
pub use ledger::{PinLedger, PinRecord};
pub use reference::{PinBatch, PinKind, PinRef, DATABASE_ADDRESS_PREFIX};
pub use service::{HttpPinner, PinnerConfig, PinningService};

use thiserror::Error;

/// Errors originating from the pinning layer.
#[derive(Error, Debug)]
pub enum PinError {
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid pinner configuration: {0}")]
    Config(String),

    #[error("Pin ledger storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Pinning service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pinning service rejected {kind} batch: {reason}")]
    Rejected { kind: PinKind, reason: String },

    #[error("Background task failed: {0}")]
    Task(String),
}

macro_rules! storage_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PinError {
                fn from(e: $ty) -> Self {
                    PinError::Storage(e.into())
                }
            }
        )*
    };
}

storage_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
