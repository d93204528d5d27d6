//! Tagged pin references.
//!
//! A reference is parsed once at the edge into either a content hash or a
//! database address so the flush loop never re-inspects string prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix that marks a database address rather than a content hash.
pub const DATABASE_ADDRESS_PREFIX: &str = "/orbitdb/";

/// Which pinning endpoint a reference goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinKind {
    Hash,
    DatabaseAddress,
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinKind::Hash => write!(f, "hash"),
            PinKind::DatabaseAddress => write!(f, "address"),
        }
    }
}

/// A reference to pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PinRef {
    Hash(String),
    DatabaseAddress(String),
}

impl PinRef {
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with(DATABASE_ADDRESS_PREFIX) {
            PinRef::DatabaseAddress(reference.to_string())
        } else {
            PinRef::Hash(reference.to_string())
        }
    }

    pub fn kind(&self) -> PinKind {
        match self {
            PinRef::Hash(_) => PinKind::Hash,
            PinRef::DatabaseAddress(_) => PinKind::DatabaseAddress,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PinRef::Hash(s) | PinRef::DatabaseAddress(s) => s,
        }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unpinned references split by endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinBatch {
    pub hashes: Vec<String>,
    pub addresses: Vec<String>,
}

impl PinBatch {
    pub fn partition<I>(refs: I) -> Self
    where
        I: IntoIterator<Item = PinRef>,
    {
        let mut batch = Self::default();
        for r in refs {
            match r {
                PinRef::Hash(s) => batch.hashes.push(s),
                PinRef::DatabaseAddress(s) => batch.addresses.push(s),
            }
        }
        batch
    }

    pub fn get(&self, kind: PinKind) -> &[String] {
        match kind {
            PinKind::Hash => &self.hashes,
            PinKind::DatabaseAddress => &self.addresses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.addresses.is_empty()
    }
}
