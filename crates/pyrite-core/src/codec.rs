//! The deterministic binary format behind every hash and every persisted
//! record.
//!
//! Rules: fixed-width integers little-endian; byte strings and vectors
//! prefixed with a `u32` element count; compound records as the
//! concatenation of their fields in declaration order. `Sha256::compute`
//! over these bytes is the canonical identity of any domain object.

use primitive_types::U256;

use crate::error::{Error, Result};

// ── Writer / reader ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.bytes.len() - self.pos < len {
            return Err(Error::InvalidArgument(format!(
                "truncated input: wanted {len} bytes, {} left",
                self.bytes.len() - self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

// ── Traits ───────────────────────────────────────────────────────────────────

pub trait Encode {
    fn encode(&self, enc: &mut Encoder);
}

pub trait Decode: Sized {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self>;
}

/// Serialize a value to its canonical byte form.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut enc = Encoder::new();
    value.encode(&mut enc);
    enc.into_bytes()
}

/// Deserialize a value, requiring the input to be consumed exactly.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T> {
    let mut dec = Decoder::new(bytes);
    let value = T::decode(&mut dec)?;
    if dec.remaining() != 0 {
        return Err(Error::InvalidArgument(format!(
            "{} trailing bytes after decode",
            dec.remaining()
        )));
    }
    Ok(value)
}

// ── Primitive impls ──────────────────────────────────────────────────────────

macro_rules! int_codec {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode(&self, enc: &mut Encoder) {
                enc.write_raw(&self.to_le_bytes());
            }
        }

        impl Decode for $ty {
            fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
                let raw = dec.read_raw(std::mem::size_of::<$ty>())?;
                Ok(<$ty>::from_le_bytes(raw.try_into().expect("length checked")))
            }
        }
    )*};
}

int_codec!(u8, u16, u32, u64);

impl Encode for bool {
    fn encode(&self, enc: &mut Encoder) {
        (*self as u8).encode(enc);
    }
}

impl Decode for bool {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match u8::decode(dec)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidArgument(format!("invalid bool byte {other}"))),
        }
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_raw(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let raw = dec.read_raw(N)?;
        Ok(raw.try_into().expect("length checked"))
    }
}

impl Encode for U256 {
    fn encode(&self, enc: &mut Encoder) {
        let mut raw = [0u8; 32];
        self.to_little_endian(&mut raw);
        enc.write_raw(&raw);
    }
}

impl Decode for U256 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(U256::from_little_endian(dec.read_raw(32)?))
    }
}

// ── Sequences ────────────────────────────────────────────────────────────────

fn encode_len(len: usize, enc: &mut Encoder) {
    debug_assert!(len <= u32::MAX as usize);
    (len as u32).encode(enc);
}

fn decode_len(dec: &mut Decoder<'_>) -> Result<usize> {
    Ok(u32::decode(dec)? as usize)
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, enc: &mut Encoder) {
        encode_len(self.len(), enc);
        for item in self {
            item.encode(enc);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let len = decode_len(dec)?;
        // Guard against absurd length prefixes before allocating.
        if len > dec.remaining() {
            return Err(Error::InvalidArgument(format!(
                "sequence length {len} exceeds remaining input"
            )));
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::decode(dec)?);
        }
        Ok(out)
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) {
        encode_len(self.len(), enc);
        enc.write_raw(self.as_bytes());
    }
}

impl Decode for String {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let len = decode_len(dec)?;
        let raw = dec.read_raw(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::InvalidArgument(format!("invalid utf-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_are_little_endian() {
        assert_eq!(to_bytes(&0x0102_0304u32), vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(to_bytes(&1u64), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn vec_has_u32_length_prefix() {
        let bytes = to_bytes(&vec![0xAAu8, 0xBB]);
        assert_eq!(bytes, vec![2, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn round_trip_preserves_values() {
        let value = vec!["alpha".to_string(), "".to_string(), "β".to_string()];
        let decoded: Vec<String> = from_bytes(&to_bytes(&value)).unwrap();
        assert_eq!(decoded, value);

        let balance = U256::from(123_456_789u64);
        let decoded: U256 = from_bytes(&to_bytes(&balance)).unwrap();
        assert_eq!(decoded, balance);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_bytes(&7u32);
        bytes.push(0);
        assert!(from_bytes::<u32>(&bytes).is_err());
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = to_bytes(&7u64);
        assert!(from_bytes::<u64>(&bytes[..5]).is_err());
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        // Claims 2^31 elements with a four-byte body.
        let bytes = vec![0, 0, 0, 0x80, 1, 2, 3, 4];
        assert!(from_bytes::<Vec<u8>>(&bytes).is_err());
    }
}
