//! AES-CBC symmetric encryption, used for envelope encryption of wrapped
//! keys. Ciphertexts are laid out as `iv(16) ∥ ct`; a fresh random IV is
//! drawn per encryption.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroize;

use crate::CryptoError;

const IV_LENGTH: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

fn random_iv() -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

fn split_iv(data: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    if data.len() < IV_LENGTH {
        return Err(CryptoError::Cipher("ciphertext shorter than IV".into()));
    }
    Ok(data.split_at(IV_LENGTH))
}

macro_rules! cbc_key {
    ($name:ident, $enc:ty, $dec:ty, $key_len:expr) => {
        pub struct $name {
            key: [u8; $key_len],
        }

        impl $name {
            pub fn generate() -> Self {
                let mut key = [0u8; $key_len];
                rand::thread_rng().fill_bytes(&mut key);
                Self { key }
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
                let key: [u8; $key_len] = bytes
                    .try_into()
                    .map_err(|_| CryptoError::MalformedKey(format!("expected {} bytes", $key_len)))?;
                Ok(Self { key })
            }

            pub fn as_bytes(&self) -> &[u8; $key_len] {
                &self.key
            }

            pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
                let iv = random_iv();
                let ct = <$enc>::new(&self.key.into(), &iv.into())
                    .encrypt_padded_vec_mut::<Pkcs7>(data);
                let mut out = iv.to_vec();
                out.extend_from_slice(&ct);
                out
            }

            /// Decrypts `iv ∥ ct`. A wrong key or mangled ciphertext surfaces
            /// as a padding failure.
            pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let (iv, ct) = split_iv(data)?;
                let iv: [u8; IV_LENGTH] = iv.try_into().expect("split length checked");
                <$dec>::new(&self.key.into(), &iv.into())
                    .decrypt_padded_vec_mut::<Pkcs7>(ct)
                    .map_err(|e| CryptoError::Cipher(e.to_string()))
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.key.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(..)"))
            }
        }
    };
}

cbc_key!(Aes256CbcKey, Aes256CbcEnc, Aes256CbcDec, 32);
cbc_key!(Aes128CbcKey, Aes128CbcEnc, Aes128CbcDec, 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes256_round_trip() {
        let key = Aes256CbcKey::generate();
        let plaintext = b"the quick brown fox";
        let ct = key.encrypt(plaintext);
        assert_ne!(&ct[IV_LENGTH..], plaintext.as_slice());
        assert_eq!(key.decrypt(&ct).unwrap(), plaintext);
    }

    #[test]
    fn aes128_round_trip() {
        let key = Aes128CbcKey::generate();
        let ct = key.encrypt(b"payload");
        assert_eq!(key.decrypt(&ct).unwrap(), b"payload");
    }

    #[test]
    fn random_iv_gives_distinct_ciphertexts() {
        let key = Aes256CbcKey::generate();
        assert_ne!(key.encrypt(b"same input"), key.encrypt(b"same input"));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = Aes256CbcKey::generate();
        let other = Aes256CbcKey::generate();
        let ct = key.encrypt(b"sealed");
        match other.decrypt(&ct) {
            Err(CryptoError::Cipher(_)) => {}
            Ok(plain) => assert_ne!(plain, b"sealed"),
            Err(e) => panic!("unexpected error kind: {e}"),
        }
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let key = Aes256CbcKey::generate();
        assert!(key.decrypt(&[0u8; 7]).is_err());
    }
}
