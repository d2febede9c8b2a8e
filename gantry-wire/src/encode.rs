//! [`Encode`] and [`Decode`]: typed values over the wire codec.
//!
//! Generated wrapper code drives these traits for every type that crosses
//! the boundary. Primitives and the composite shapes (optionals, sequences,
//! mappings, durations, timestamps) are implemented here; records and
//! tagged-variant enums are implemented by the generated code itself, field
//! by field in declaration order (the tests show the pattern by hand).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, SystemTime};

use crate::codec::{WireReader, WireWriter};
use crate::error::CodecError;

/// Lower a value into the wire encoding.
pub trait Encode {
    /// Append this value's encoding to the writer.
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError>;
}

/// Lift a value out of the wire encoding.
pub trait Decode: Sized {
    /// Read one value from the reader, consuming exactly its bytes.
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError>;
}

/// Encode a single top-level value to raw bytes.
pub fn encode_value<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut w = WireWriter::new();
    value.encode(&mut w)?;
    Ok(w.finish())
}

/// Decode a single top-level value, enforcing full consumption.
///
/// Trailing bytes after the value fail with [`CodecError::TrailingBytes`].
pub fn decode_value<T: Decode>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut r = WireReader::new(bytes);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

macro_rules! impl_codec_primitive {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
                    w.$write(*self);
                    Ok(())
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
                    r.$read()
                }
            }
        )*
    };
}

impl_codec_primitive! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Encode for str {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_string(self)
    }
}

impl Encode for String {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_string(self)
    }
}

impl Decode for String {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        r.read_string()
    }
}

impl Encode for Duration {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_duration(*self);
        Ok(())
    }
}

impl Decode for Duration {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        r.read_duration()
    }
}

impl Encode for SystemTime {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_timestamp(*self)
    }
}

impl Decode for SystemTime {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        r.read_timestamp()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        match self {
            None => {
                w.write_u8(0);
                Ok(())
            }
            Some(v) => {
                w.write_u8(1);
                v.encode(w)
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            other => Err(CodecError::InvalidOptionTag(other)),
        }
    }
}

// Note: for `Vec<u8>` the element-wise encoding is byte-for-byte identical
// to the contract's byte-array form (4-byte count, then raw bytes), so a
// dedicated bytes impl is not needed.
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_len(self.len())?;
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_len()?;
        // Cap the pre-allocation: the count is attacker-controlled relative
        // to the actual buffer size.
        let mut items = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<K: Encode, V: Encode> Encode for HashMap<K, V> {
    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.write_len(self.len())?;
        for (key, value) in self {
            key.encode(w)?;
            value.encode(w)?;
        }
        Ok(())
    }
}

impl<K: Decode + Eq + Hash, V: Decode> Decode for HashMap<K, V> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_len()?;
        let mut map = HashMap::with_capacity(count.min(r.remaining()));
        for index in 0..count {
            let key = K::decode(r)?;
            let value = V::decode(r)?;
            if map.insert(key, value).is_some() {
                return Err(CodecError::DuplicateMapKey { index });
            }
        }
        Ok(map)
    }
}
