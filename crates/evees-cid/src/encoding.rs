//! Binary envelope for canonical values.
//!
//! Values are written as definite-length CBOR (RFC 8949): integers use the
//! shortest head, floats are always 64-bit, maps are written in the order
//! they are given. Callers hash `encode(&canonicalize(v))`, never the
//! un-canonicalized value.

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::constants::MAX_DECODE_DEPTH;
use crate::error::CidError;
use crate::value::Value;

/// Encode a value into CBOR bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CidError> {
    let mut encoder = Encoder::new(Vec::new());
    write_value(&mut encoder, value)?;
    Ok(encoder.into_writer())
}

/// Decode CBOR bytes produced by [`encode`].
///
/// Fails with [`CidError::Decode`] on truncated input, trailing bytes,
/// indefinite-length items, tags, non-string map keys and any other data item
/// outside the value model.
pub fn decode(bytes: &[u8]) -> Result<Value, CidError> {
    let mut decoder = Decoder::new(bytes);
    let value = read_value(&mut decoder, 0)?;
    if decoder.position() != bytes.len() {
        return Err(CidError::Decode(format!(
            "{} trailing bytes after value",
            bytes.len() - decoder.position()
        )));
    }
    Ok(value)
}

fn encode_err<E: std::fmt::Display>(e: minicbor::encode::Error<E>) -> CidError {
    CidError::Encode(e.to_string())
}

fn decode_err(e: minicbor::decode::Error) -> CidError {
    CidError::Decode(e.to_string())
}

fn write_value(e: &mut Encoder<Vec<u8>>, value: &Value) -> Result<(), CidError> {
    match value {
        Value::Null => {
            e.null().map_err(encode_err)?;
        }
        Value::Bool(b) => {
            e.bool(*b).map_err(encode_err)?;
        }
        Value::Integer(i) => {
            if let Ok(n) = u64::try_from(*i) {
                e.u64(n).map_err(encode_err)?;
            } else if let Ok(n) = i64::try_from(*i) {
                e.i64(n).map_err(encode_err)?;
            } else {
                return Err(CidError::Encode(format!("integer {} out of range", i)));
            }
        }
        Value::Float(f) => {
            e.f64(*f).map_err(encode_err)?;
        }
        Value::String(s) => {
            e.str(s).map_err(encode_err)?;
        }
        Value::Bytes(bytes) => {
            e.bytes(bytes).map_err(encode_err)?;
        }
        Value::Array(items) => {
            e.array(items.len() as u64).map_err(encode_err)?;
            for item in items {
                write_value(e, item)?;
            }
        }
        Value::Map(entries) => {
            e.map(entries.len() as u64).map_err(encode_err)?;
            for (key, v) in entries {
                e.str(key).map_err(encode_err)?;
                write_value(e, v)?;
            }
        }
    }
    Ok(())
}

fn read_value(d: &mut Decoder<'_>, depth: usize) -> Result<Value, CidError> {
    if depth > MAX_DECODE_DEPTH {
        return Err(CidError::Decode(format!(
            "nesting deeper than {} levels",
            MAX_DECODE_DEPTH
        )));
    }

    let value = match d.datatype().map_err(decode_err)? {
        Type::Null => {
            d.null().map_err(decode_err)?;
            Value::Null
        }
        Type::Undefined => {
            d.undefined().map_err(decode_err)?;
            Value::Null
        }
        Type::Bool => Value::Bool(d.bool().map_err(decode_err)?),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            Value::Integer(d.u64().map_err(decode_err)? as i128)
        }
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => {
            Value::Integer(d.i64().map_err(decode_err)? as i128)
        }
        Type::F16 => Value::Float(d.f16().map_err(decode_err)? as f64),
        Type::F32 => Value::Float(d.f32().map_err(decode_err)? as f64),
        Type::F64 => Value::Float(d.f64().map_err(decode_err)?),
        Type::String => Value::String(d.str().map_err(decode_err)?.to_owned()),
        Type::Bytes => Value::Bytes(d.bytes().map_err(decode_err)?.to_vec()),
        Type::Array => {
            let len = definite(d.array().map_err(decode_err)?, "array")?;
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_value(d, depth + 1)?);
            }
            Value::Array(items)
        }
        Type::Map => {
            let len = definite(d.map().map_err(decode_err)?, "map")?;
            let mut entries = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                let key = match d.datatype().map_err(decode_err)? {
                    Type::String => d.str().map_err(decode_err)?.to_owned(),
                    other => {
                        return Err(CidError::Decode(format!("unsupported map key type {}", other)))
                    }
                };
                entries.push((key, read_value(d, depth + 1)?));
            }
            Value::Map(entries)
        }
        other => return Err(CidError::Decode(format!("unsupported data item {}", other))),
    };
    Ok(value)
}

fn definite(len: Option<u64>, what: &str) -> Result<u64, CidError> {
    len.ok_or_else(|| CidError::Decode(format!("indefinite-length {} not supported", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bytes() {
        let value = Value::Map(vec![
            ("a".to_string(), Value::Integer(1)),
            ("b".to_string(), Value::Array(vec![Value::Null, Value::Bool(true)])),
        ]);
        // {"a": 1, "b": [null, true]}
        let expected = vec![0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x82, 0xf6, 0xf5];
        assert_eq!(encode(&value).unwrap(), expected);
    }

    #[test]
    fn test_negative_and_float() {
        assert_eq!(encode(&Value::Integer(-1)).unwrap(), vec![0x20]);
        let float = encode(&Value::Float(1.5)).unwrap();
        assert_eq!(float[0], 0xfb);
        assert_eq!(float.len(), 9);
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode(&Value::String("hello".into())).unwrap();
        let err = decode(&bytes[..3]).unwrap_err();
        assert!(matches!(err, CidError::Decode(_)));
    }

    #[test]
    fn test_tag_is_unsupported() {
        // tag(1) followed by integer 0
        let err = decode(&[0xc1, 0x00]).unwrap_err();
        assert!(matches!(err, CidError::Decode(_)));
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let err = decode(&[0xf6, 0xf6]).unwrap_err();
        assert!(matches!(err, CidError::Decode(_)));
    }

    #[test]
    fn test_undefined_decodes_as_null() {
        assert_eq!(decode(&[0xf7]).unwrap(), Value::Null);
    }
}
