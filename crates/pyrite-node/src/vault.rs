use std::path::Path;

use tracing::info;

use pyrite_core::{Address, Result};
use pyrite_crypto::KeyPair;

/// The node's signing identity: a secp256k1 keypair loaded from the key
/// directory, generated on first start.
pub struct KeyVault {
    keypair: KeyPair,
    address: Address,
}

impl KeyVault {
    pub fn open(keys_dir: &Path) -> Result<Self> {
        let keypair = match KeyPair::load_from_dir(keys_dir) {
            Ok(keypair) => keypair,
            Err(pyrite_crypto::CryptoError::KeyFile(_)) => {
                info!(dir = %keys_dir.display(), "no key material found, generating");
                let keypair = KeyPair::generate();
                keypair.save_to_dir(keys_dir)?;
                keypair
            }
            // A present-but-corrupt keyfile must not be silently replaced.
            Err(e) => return Err(e.into()),
        };
        let address = Address::from_public_key(&keypair.public_key_bytes());
        info!(%address, "node identity loaded");
        Ok(Self { keypair, address })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_generates_then_reloads_the_same_identity() {
        let dir = std::env::temp_dir().join(format!("pyrite_vault_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let first = KeyVault::open(&dir).unwrap();
        let second = KeyVault::open(&dir).unwrap();
        assert_eq!(first.address(), second.address());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
