use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Error, Result};

/// 256-bit unsigned account balance.
pub type Balance = primitive_types::U256;

/// Per-transaction fee, which doubles as the gas budget for contract calls.
pub type Fee = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = u64;

/// Height of a block in the chain; genesis is depth 0.
pub type BlockDepth = u64;

/// Per-account transaction counter.
pub type Nonce = u64;

// ── Address ──────────────────────────────────────────────────────────────────

/// 20-byte account address: `RIPEMD160(SHA256(pubkey))` over the 65-byte
/// uncompressed secp256k1 public key. Rendered as base58.
///
/// The null address (20 zero bytes) doubles as the contract-creation
/// recipient sentinel and the genesis coinbase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const LENGTH: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_public_key(pubkey: &[u8; 65]) -> Self {
        Self(pyrite_crypto::ripemd160(&pyrite_crypto::sha256(pubkey)))
    }

    pub fn null() -> Self {
        Self([0u8; 20])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidArgument(format!("bad base58 address: {e}")))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("address must decode to 20 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Encode for Address {
    fn encode(&self, enc: &mut Encoder) {
        self.0.encode(enc);
    }
}

impl Decode for Address {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self(<[u8; 20]>::decode(dec)?))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Address::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

// ── Sha256 ───────────────────────────────────────────────────────────────────

/// 32-byte SHA-256 digest. Block and transaction identities are digests of
/// their canonical serialization. Rendered as base64 in the public API.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256([u8; 32]);

impl Sha256 {
    pub const LENGTH: usize = 32;

    pub fn compute(data: &[u8]) -> Self {
        Self(pyrite_crypto::sha256(data))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn null() -> Self {
        Self([0u8; 32])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| Error::InvalidArgument(format!("bad base64 hash: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("hash must decode to 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({}…)", &hex::encode(self.0)[..16])
    }
}

impl Encode for Sha256 {
    fn encode(&self, enc: &mut Encoder) {
        self.0.encode(enc);
    }
}

impl Decode for Sha256 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self(<[u8; 32]>::decode(dec)?))
    }
}

impl Serialize for Sha256 {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Sha256 {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Sha256::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

// ── Signature ────────────────────────────────────────────────────────────────

/// 65-byte recoverable secp256k1 signature (compact r ∥ s ∥ recovery id).
/// The all-zero value marks an unsigned transaction.
#[derive(Clone, Copy)]
pub struct Signature([u8; 65]);

impl Signature {
    pub const LENGTH: usize = 65;

    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn null() -> Self {
        Self([0u8; 65])
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| Error::InvalidArgument(format!("bad base64 signature: {e}")))?;
        let arr: [u8; 65] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("signature must decode to 65 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Signature(null)")
        } else {
            write!(f, "Signature({}…)", &hex::encode(self.0)[..16])
        }
    }
}

impl Encode for Signature {
    fn encode(&self, enc: &mut Encoder) {
        self.0.encode(enc);
    }
}

impl Decode for Signature {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self(<[u8; 65]>::decode(dec)?))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Signature::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_base58_round_trip() {
        let addr = Address::from_bytes([7u8; 20]);
        assert_eq!(Address::from_base58(&addr.to_base58()).unwrap(), addr);
    }

    #[test]
    fn address_base58_preserves_leading_zeros() {
        let mut bytes = [0u8; 20];
        bytes[19] = 1;
        let addr = Address::from_bytes(bytes);
        assert!(addr.to_base58().starts_with("111111111111111111"));
        assert_eq!(Address::from_base58(&addr.to_base58()).unwrap(), addr);
    }

    #[test]
    fn address_rejects_bad_base58() {
        assert!(Address::from_base58("0OIl").is_err()); // non-alphabet chars
        assert!(Address::from_base58("abc").is_err()); // wrong length
    }

    #[test]
    fn address_from_public_key_matches_manual_derivation() {
        let pubkey = [0x04u8; 65];
        let expected = pyrite_crypto::ripemd160(&pyrite_crypto::sha256(&pubkey));
        assert_eq!(*Address::from_public_key(&pubkey).as_bytes(), expected);
    }

    #[test]
    fn sha256_base64_round_trip() {
        let hash = Sha256::compute(b"payload");
        assert_eq!(Sha256::from_base64(&hash.to_base64()).unwrap(), hash);
    }

    #[test]
    fn null_markers() {
        assert!(Address::null().is_null());
        assert!(Sha256::null().is_null());
        assert!(Signature::null().is_null());
        assert!(!Sha256::compute(b"x").is_null());
    }
}
