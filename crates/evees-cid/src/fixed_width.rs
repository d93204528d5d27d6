//! Packing of CIDs into two fixed-size words.
//!
//! On-chain slots hold two `bytes32` words. A CID is stored as its multibase
//! indicator byte followed by the binary CID, hex encoded, left-padded with
//! zeros to 128 hex characters and split in the middle. The first word holds
//! the most significant half. An all-zero pair decodes to the empty string,
//! which stands for "no CID".

use cid::multibase::Base;
use cid::Version;

use crate::constants::{FIXED_WIDTH_MAX_BYTES, FIXED_WORD_HEX_LEN};
use crate::error::CidError;
use crate::hash::{parse_cid, render_cid};

/// Pack a CID string into `[hi, lo]`, each `0x` followed by 64 hex characters.
pub fn cid_to_fixed_width(cid: &str) -> Result<[String; 2], CidError> {
    let parsed = parse_cid(cid)?;
    let indicator = match parsed.version() {
        Version::V0 => Base::Base58Btc.code(),
        Version::V1 => cid.chars().next().ok_or_else(|| CidError::InvalidCid {
            cid: cid.to_string(),
            reason: "empty".to_string(),
        })?,
    };

    let cid_bytes = parsed.to_bytes();
    let mut bytes = Vec::with_capacity(cid_bytes.len() + 1);
    bytes.push(indicator as u8);
    bytes.extend_from_slice(&cid_bytes);
    if bytes.len() > FIXED_WIDTH_MAX_BYTES {
        return Err(CidError::CidTooLong(bytes.len()));
    }

    let padded = format!("{:0>width$}", hex::encode(&bytes), width = 2 * FIXED_WORD_HEX_LEN);
    let (hi, lo) = padded.split_at(FIXED_WORD_HEX_LEN);
    Ok([format!("0x{}", hi), format!("0x{}", lo)])
}

/// Unpack `[hi, lo]` back into the original CID string.
///
/// Returns an empty string when both words are zero.
pub fn fixed_width_to_cid(hi: &str, lo: &str) -> Result<String, CidError> {
    let joined = format!("{}{}", strip_word(hi)?, strip_word(lo)?);
    let significant = joined.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(String::new());
    }

    let even = if significant.len() % 2 == 1 {
        format!("0{}", significant)
    } else {
        significant.to_string()
    };
    let bytes = hex::decode(&even).map_err(|e| CidError::InvalidWord(e.to_string()))?;
    let (indicator, cid_bytes) = bytes
        .split_first()
        .ok_or_else(|| CidError::InvalidWord("missing multibase indicator".to_string()))?;

    let base = Base::from_code(*indicator as char)
        .map_err(|_| CidError::UnsupportedMultibase(format!("indicator {:?}", *indicator as char)))?;
    let cid = cid::Cid::try_from(cid_bytes).map_err(|e| CidError::InvalidCid {
        cid: even.clone(),
        reason: e.to_string(),
    })?;
    render_cid(&cid, base)
}

fn strip_word(word: &str) -> Result<&str, CidError> {
    let digits = word.strip_prefix("0x").unwrap_or(word);
    if digits.len() != FIXED_WORD_HEX_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CidError::InvalidWord(word.to_string()));
    }
    Ok(digits)
}
