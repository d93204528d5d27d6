use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CidError {
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("Unsupported multibase: {0}")]
    UnsupportedMultibase(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Unsupported CID version: {0}")]
    UnsupportedVersion(u64),

    #[error("Invalid CID config: {0}")]
    InvalidConfig(String),

    #[error("Invalid CID {cid}: {reason}")]
    InvalidCid { cid: String, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("CID needs {0} bytes, fixed-width slots hold at most 64")]
    CidTooLong(usize),

    #[error("Invalid fixed-width word: {0}")]
    InvalidWord(String),
}
