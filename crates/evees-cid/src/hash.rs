//! Object hashing: canonicalize, encode, digest, wrap in a CID.
//!
//! `CidConfig` names the pipeline with the same strings the multiformats
//! tables use (`base32`, `raw`, `sha2-256`, ...). The names are resolved
//! once into a [`ResolvedCidConfig`]; unknown names are configuration errors.

use cid::multibase::{self, Base};
use cid::{Cid, Version};
use multihash::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize;
use crate::constants::{DEFAULT_BASE, DEFAULT_CID_VERSION, DEFAULT_CODEC, DEFAULT_HASH_TYPE};
use crate::encoding::encode;
use crate::error::CidError;
use crate::value::Value;

const BASES: &[(&str, Base)] = &[
    ("base58btc", Base::Base58Btc),
    ("base32", Base::Base32Lower),
    ("base32upper", Base::Base32Upper),
    ("base16", Base::Base16Lower),
    ("base16upper", Base::Base16Upper),
    ("base36", Base::Base36Lower),
    ("base64", Base::Base64),
    ("base64url", Base::Base64Url),
];

const CODECS: &[(&str, u64)] = &[
    ("raw", 0x55),
    ("dag-pb", 0x70),
    ("dag-cbor", 0x71),
    ("dag-json", 0x0129),
    ("json", 0x0200),
];

const HASHES: &[(&str, u64, Code)] = &[
    ("sha2-256", 0x12, Code::Sha2_256),
    ("sha2-512", 0x13, Code::Sha2_512),
    ("sha3-512", 0x14, Code::Sha3_512),
    ("sha3-256", 0x16, Code::Sha3_256),
    ("keccak-256", 0x1b, Code::Keccak256),
    ("blake3-256", 0x1e, Code::Blake3_256),
    ("blake2b-256", 0xb220, Code::Blake2b256),
    ("blake2b-512", 0xb240, Code::Blake2b512),
];

const DAG_PB: u64 = 0x70;
const SHA2_256: u64 = 0x12;

/// Parameters of the hashing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CidConfig {
    /// Multibase name used to render v1 CIDs.
    pub base: String,
    /// CID version, 0 or 1.
    pub version: u64,
    /// Multicodec name.
    pub codec: String,
    /// Multihash function name.
    #[serde(rename = "type")]
    pub hash_type: String,
}

impl Default for CidConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE.to_string(),
            version: DEFAULT_CID_VERSION,
            codec: DEFAULT_CODEC.to_string(),
            hash_type: DEFAULT_HASH_TYPE.to_string(),
        }
    }
}

/// A [`CidConfig`] with every name resolved to its multiformats value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCidConfig {
    pub base: Base,
    pub version: Version,
    pub codec: u64,
    pub hash: Code,
}

impl CidConfig {
    pub fn new(base: &str, version: u64, codec: &str, hash_type: &str) -> Self {
        Self {
            base: base.to_string(),
            version,
            codec: codec.to_string(),
            hash_type: hash_type.to_string(),
        }
    }

    /// The only configuration a v0 CID can have.
    pub fn v0() -> Self {
        Self::new("base58btc", 0, "dag-pb", "sha2-256")
    }

    /// Resolve every name, failing on the first unsupported one.
    pub fn resolve(&self) -> Result<ResolvedCidConfig, CidError> {
        let base = BASES
            .iter()
            .find(|(name, _)| *name == self.base)
            .map(|(_, base)| *base)
            .ok_or_else(|| CidError::UnsupportedMultibase(self.base.clone()))?;
        let codec = CODECS
            .iter()
            .find(|(name, _)| *name == self.codec)
            .map(|(_, code)| *code)
            .ok_or_else(|| CidError::UnsupportedCodec(self.codec.clone()))?;
        let (hash_code, hash) = HASHES
            .iter()
            .find(|(name, _, _)| *name == self.hash_type)
            .map(|(_, code, hash)| (*code, *hash))
            .ok_or_else(|| CidError::UnsupportedHashAlgorithm(self.hash_type.clone()))?;
        let version =
            Version::try_from(self.version).map_err(|_| CidError::UnsupportedVersion(self.version))?;

        if version == Version::V0 && (base != Base::Base58Btc || codec != DAG_PB || hash_code != SHA2_256) {
            return Err(CidError::InvalidConfig(format!(
                "CIDv0 requires base58btc, dag-pb and sha2-256, got {}, {}, {}",
                self.base, self.codec, self.hash_type
            )));
        }

        Ok(ResolvedCidConfig {
            base,
            version,
            codec,
            hash,
        })
    }

    /// Check the configuration without hashing anything.
    pub fn validate(&self) -> Result<(), CidError> {
        self.resolve().map(|_| ())
    }
}

/// Hash an object: canonicalize, encode, digest, render.
///
/// Pure and deterministic for a fixed config.
pub fn hash_object(object: &Value, config: &CidConfig) -> Result<String, CidError> {
    let resolved = config.resolve()?;
    let bytes = encode(&canonicalize(object))?;
    render_cid(&cid_for_bytes(&bytes, &resolved)?, resolved.base)
}

/// Hash already-encoded bytes.
pub fn hash_bytes(bytes: &[u8], config: &CidConfig) -> Result<String, CidError> {
    let resolved = config.resolve()?;
    render_cid(&cid_for_bytes(bytes, &resolved)?, resolved.base)
}

/// Build the binary CID for `bytes`.
pub fn cid_for_bytes(bytes: &[u8], config: &ResolvedCidConfig) -> Result<Cid, CidError> {
    let digest = config.hash.digest(bytes);
    match config.version {
        Version::V0 => Cid::new_v0(digest).map_err(|e| CidError::InvalidConfig(e.to_string())),
        Version::V1 => Ok(Cid::new_v1(config.codec, digest)),
    }
}

/// Render a CID. v0 CIDs are always bare base58btc.
pub fn render_cid(cid: &Cid, base: Base) -> Result<String, CidError> {
    match cid.version() {
        Version::V0 => Ok(cid.to_string()),
        Version::V1 => cid.to_string_of_base(base).map_err(|e| CidError::InvalidCid {
            cid: cid.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Parse a CID string.
pub fn parse_cid(cid: &str) -> Result<Cid, CidError> {
    Cid::try_from(cid).map_err(|e| CidError::InvalidCid {
        cid: cid.to_string(),
        reason: e.to_string(),
    })
}

/// Recover the configuration a CID string was produced with.
///
/// This is metadata extraction only; the hashed object cannot be recovered.
pub fn cid_config_of(cid: &str) -> Result<CidConfig, CidError> {
    let parsed = parse_cid(cid)?;
    let base = match parsed.version() {
        Version::V0 => Base::Base58Btc,
        Version::V1 => {
            multibase::decode(cid)
                .map_err(|e| CidError::InvalidCid {
                    cid: cid.to_string(),
                    reason: e.to_string(),
                })?
                .0
        }
    };

    let base = BASES
        .iter()
        .find(|(_, b)| *b == base)
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| CidError::UnsupportedMultibase(format!("{:?}", base)))?;
    let codec = CODECS
        .iter()
        .find(|(_, code)| *code == parsed.codec())
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| CidError::UnsupportedCodec(format!("0x{:x}", parsed.codec())))?;
    let hash_type = HASHES
        .iter()
        .find(|(_, code, _)| *code == parsed.hash().code())
        .map(|(name, _, _)| name.to_string())
        .ok_or_else(|| CidError::UnsupportedHashAlgorithm(format!("0x{:x}", parsed.hash().code())))?;

    Ok(CidConfig {
        base,
        version: u64::from(parsed.version()),
        codec,
        hash_type,
    })
}

/// Whether two CID strings address the same content under the same codec,
/// regardless of multibase or version (v0 is dag-pb).
pub fn same_cid(a: &str, b: &str) -> Result<bool, CidError> {
    let a = parse_cid(a)?;
    let b = parse_cid(b)?;
    Ok(a.codec() == b.codec() && a.hash() == b.hash())
}
