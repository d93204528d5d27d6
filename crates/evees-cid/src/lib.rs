//! Evees CID - canonical encoding and content identifiers
//!
//! Turns JSON-like objects into stable content identifiers:
//! - Canonicalization: recursive key sorting so insertion order never matters
//! - Encoding: a compact CBOR envelope that round-trips every canonical value
//! - Hashing: multihash digests wrapped in a CID rendered with a multibase
//! - Fixed-width packing of CIDs into two 32-byte words for on-chain slots

pub mod canonical;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod fixed_width;
pub mod hash;
pub mod value;

pub use canonical::{canonicalize, is_canonical};
pub use constants::*;
pub use encoding::{decode, encode};
pub use error::*;
pub use fixed_width::{cid_to_fixed_width, fixed_width_to_cid};
pub use hash::{
    cid_config_of, cid_for_bytes, hash_bytes, hash_object, parse_cid, render_cid, same_cid, CidConfig,
    ResolvedCidConfig,
};
pub use value::Value;
