pub mod aes;
pub mod hash;
pub mod keypair;

pub use aes::{Aes128CbcKey, Aes256CbcKey};
pub use hash::{keccak256, ripemd160, sha256};
pub use keypair::{recover_public_key, KeyPair, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secp256k1 failure: {0}")]
    Secp(#[from] secp256k1::Error),

    #[error("symmetric cipher failure: {0}")]
    Cipher(String),

    #[error("malformed key material: {0}")]
    MalformedKey(String),

    #[error("key file not accessible: {0}")]
    KeyFile(String),
}
