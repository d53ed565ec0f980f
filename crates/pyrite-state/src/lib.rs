//! The global account state and its transactional overlay.
//!
//! [`StateManager`] owns the address → account map behind a reader-writer
//! lock. [`Commit`] is a copy-on-write view used to execute one transaction
//! reversibly: reads fall through to the underlying state, writes populate
//! the overlay, and nothing is visible to other readers until
//! [`StateManager::apply_commit`].

mod commit;
mod manager;

pub use commit::Commit;
pub use manager::StateManager;

use pyrite_core::{Address, Sha256};

/// Deterministic contract address: `RIPEMD160(code_hash ∥ creator ∥
/// ascii_decimal(creator_nonce))`.
pub fn derive_contract_address(code_hash: &Sha256, creator: &Address, nonce: u64) -> Address {
    let mut preimage = Vec::with_capacity(32 + 20 + 20);
    preimage.extend_from_slice(code_hash.as_bytes());
    preimage.extend_from_slice(creator.as_bytes());
    preimage.extend_from_slice(nonce.to_string().as_bytes());
    Address::from_bytes(pyrite_crypto::ripemd160(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_address_is_deterministic() {
        let code_hash = Sha256::compute(b"init code");
        let creator = Address::from_bytes([5u8; 20]);
        let a = derive_contract_address(&code_hash, &creator, 3);
        let b = derive_contract_address(&code_hash, &creator, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn contract_address_varies_with_inputs() {
        let code_hash = Sha256::compute(b"init code");
        let creator = Address::from_bytes([5u8; 20]);
        let base = derive_contract_address(&code_hash, &creator, 3);

        assert_ne!(derive_contract_address(&code_hash, &creator, 4), base);
        assert_ne!(
            derive_contract_address(&Sha256::compute(b"other"), &creator, 3),
            base
        );
        assert_ne!(
            derive_contract_address(&code_hash, &Address::from_bytes([6u8; 20]), 3),
            base
        );
    }
}
