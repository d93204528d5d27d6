/// CID version used when a config does not name one.
pub const DEFAULT_CID_VERSION: u64 = 1;

/// Multicodec name used when a config does not name one.
pub const DEFAULT_CODEC: &str = "raw";

/// Multihash function used when a config does not name one.
pub const DEFAULT_HASH_TYPE: &str = "sha2-256";

/// Multibase used to render v1 CIDs when a config does not name one.
pub const DEFAULT_BASE: &str = "base32";

/// Hex characters in one fixed-width word (32 bytes).
pub const FIXED_WORD_HEX_LEN: usize = 64;

/// Bytes available across both fixed-width words, multibase indicator included.
pub const FIXED_WIDTH_MAX_BYTES: usize = 64;

/// Nesting limit applied while decoding untrusted payloads.
pub const MAX_DECODE_DEPTH: usize = 256;
