use pyrite_crypto::KeyPair;

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Error, Result};
use crate::types::{Address, Balance, Fee, Sha256, Signature, Timestamp};

// ── Transaction ──────────────────────────────────────────────────────────────

/// A signed value transfer, contract call, or contract creation.
///
/// A null `to` address means contract creation, with `data` carrying an
/// encoded [`ContractData`]. Equality ignores the signature, matching the
/// containment semantics of [`crate::txset::TransactionsSet`].
#[derive(Clone, Debug)]
pub struct Transaction {
    from: Address,
    to: Address,
    amount: Balance,
    fee: Fee,
    timestamp: Timestamp,
    data: Vec<u8>,
    sign: Signature,
}

impl Transaction {
    pub fn new(
        from: Address,
        to: Address,
        amount: Balance,
        fee: Fee,
        timestamp: Timestamp,
        data: Vec<u8>,
    ) -> Result<Self> {
        if amount.is_zero() && fee == 0 {
            return Err(Error::Logic(
                "transaction must carry a non-zero amount or fee".into(),
            ));
        }
        Ok(Self {
            from,
            to,
            amount,
            fee,
            timestamp,
            data,
            sign: Signature::null(),
        })
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn amount(&self) -> Balance {
        self.amount
    }

    pub fn fee(&self) -> Fee {
        self.fee
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn signature(&self) -> &Signature {
        &self.sign
    }

    pub fn set_signature(&mut self, sign: Signature) {
        self.sign = sign;
    }

    /// True for a contract-creation transaction (`to` is the null sentinel).
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_null()
    }

    /// The canonical identity hash, computed over the *textual* field forms:
    /// `SHA256(base58(from) ∥ base58(to) ∥ dec(amount) ∥ dec(fee) ∥
    /// dec(timestamp) ∥ data)`. Binding signatures to the human-readable
    /// rendering keeps them independent of the binary serializer.
    pub fn hash_of(&self) -> Sha256 {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(self.from.to_base58().as_bytes());
        preimage.extend_from_slice(self.to.to_base58().as_bytes());
        preimage.extend_from_slice(self.amount.to_string().as_bytes());
        preimage.extend_from_slice(self.fee.to_string().as_bytes());
        preimage.extend_from_slice(self.timestamp.to_string().as_bytes());
        preimage.extend_from_slice(&self.data);
        Sha256::compute(&preimage)
    }

    /// Sign the canonical hash with `keypair`, storing the 65-byte
    /// recoverable signature.
    pub fn sign(&mut self, keypair: &KeyPair) {
        let digest = self.hash_of();
        self.sign = Signature::from_bytes(keypair.sign_recoverable(digest.as_bytes()));
    }

    /// Verify the stored signature: recover the public key from it, derive
    /// the address, and compare against `from`. Every failure mode
    /// (missing signature, unrecoverable point, mismatched address) is a
    /// `false`, never a panic.
    pub fn check_sign(&self) -> bool {
        if self.sign.is_null() {
            return false;
        }
        let digest = self.hash_of();
        match pyrite_crypto::recover_public_key(self.sign.as_bytes(), digest.as_bytes()) {
            Ok(pubkey) => Address::from_public_key(&pubkey) == self.from,
            Err(_) => false,
        }
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.amount == other.amount
            && self.fee == other.fee
            && self.timestamp == other.timestamp
            && self.data == other.data
    }
}

impl Eq for Transaction {}

impl Encode for Transaction {
    fn encode(&self, enc: &mut Encoder) {
        self.from.encode(enc);
        self.to.encode(enc);
        self.amount.encode(enc);
        self.fee.encode(enc);
        self.timestamp.encode(enc);
        self.data.encode(enc);
        self.sign.encode(enc);
    }
}

impl Decode for Transaction {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let from = Address::decode(dec)?;
        let to = Address::decode(dec)?;
        let amount = Balance::decode(dec)?;
        let fee = Fee::decode(dec)?;
        let timestamp = Timestamp::decode(dec)?;
        let data = Vec::<u8>::decode(dec)?;
        let sign = Signature::decode(dec)?;
        let mut tx = Transaction::new(from, to, amount, fee, timestamp, data)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        tx.set_signature(sign);
        Ok(tx)
    }
}

// ── ContractData ─────────────────────────────────────────────────────────────

/// Payload of a contract-creation transaction: the init bytecode plus the
/// contract's ABI description (JSON text, stored on the account).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractData {
    pub init_message: Vec<u8>,
    pub abi: String,
}

impl Encode for ContractData {
    fn encode(&self, enc: &mut Encoder) {
        self.init_message.encode(enc);
        self.abi.encode(enc);
    }
}

impl Decode for ContractData {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            init_message: Vec::<u8>::decode(dec)?,
            abi: String::decode(dec)?,
        })
    }
}

// ── TransactionStatus ────────────────────────────────────────────────────────

/// Outcome of executing one transaction, stored under the transaction hash
/// for later query. Execution failures become statuses; they never escape
/// the executor as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    Rejected = 1,
    Revert = 2,
    Failed = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionType {
    None = 0,
    Transfer = 1,
    ContractCall = 2,
    ContractCreation = 3,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionStatus {
    pub status: StatusCode,
    pub action: ActionType,
    pub fee_left: Fee,
    pub message: String,
}

impl TransactionStatus {
    pub fn new(status: StatusCode, action: ActionType, fee_left: Fee, message: String) -> Self {
        Self {
            status,
            action,
            fee_left,
            message,
        }
    }

    /// The status returned for transactions the node has never executed.
    pub fn unknown() -> Self {
        Self::new(StatusCode::Failed, ActionType::None, 0, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};

    fn transfer(amount: u64, fee: Fee) -> Transaction {
        Transaction::new(
            Address::from_bytes([1u8; 20]),
            Address::from_bytes([2u8; 20]),
            Balance::from(amount),
            fee,
            1_583_789_700,
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn rejects_zero_amount_and_fee() {
        let result = Transaction::new(
            Address::from_bytes([1u8; 20]),
            Address::from_bytes([2u8; 20]),
            Balance::zero(),
            0,
            0,
            vec![],
        );
        assert!(matches!(result, Err(Error::Logic(_))));
    }

    #[test]
    fn serialization_round_trip_preserves_identity() {
        let mut tx = transfer(100, 1);
        tx.set_signature(Signature::from_bytes([9u8; 65]));
        let bytes = to_bytes(&tx);
        let decoded: Transaction = from_bytes(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.signature(), tx.signature());
        assert_eq!(Sha256::compute(&to_bytes(&decoded)), Sha256::compute(&bytes));
    }

    #[test]
    fn sign_then_check_sign_succeeds() {
        let keypair = KeyPair::generate();
        let from = Address::from_public_key(&keypair.public_key_bytes());
        let mut tx = Transaction::new(
            from,
            Address::from_bytes([2u8; 20]),
            Balance::from(50u64),
            1,
            1_583_789_700,
            b"hello".to_vec(),
        )
        .unwrap();

        assert!(!tx.check_sign()); // unsigned
        tx.sign(&keypair);
        assert!(tx.check_sign());
    }

    #[test]
    fn mutating_any_field_invalidates_signature() {
        let keypair = KeyPair::generate();
        let from = Address::from_public_key(&keypair.public_key_bytes());
        let mut tx = Transaction::new(
            from,
            Address::from_bytes([2u8; 20]),
            Balance::from(50u64),
            1,
            1_583_789_700,
            vec![],
        )
        .unwrap();
        tx.sign(&keypair);

        let mut tampered = tx.clone();
        tampered.amount = Balance::from(51u64);
        assert!(!tampered.check_sign());

        let mut tampered = tx.clone();
        tampered.fee = 2;
        assert!(!tampered.check_sign());

        let mut tampered = tx.clone();
        tampered.data = b"x".to_vec();
        assert!(!tampered.check_sign());
    }

    #[test]
    fn flipped_signature_byte_fails_verification() {
        let keypair = KeyPair::generate();
        let from = Address::from_public_key(&keypair.public_key_bytes());
        let mut tx = Transaction::new(
            from,
            Address::from_bytes([2u8; 20]),
            Balance::from(100u64),
            1,
            1_583_789_700,
            vec![],
        )
        .unwrap();
        tx.sign(&keypair);

        let mut sig = *tx.signature().as_bytes();
        sig[10] ^= 0xFF;
        tx.set_signature(Signature::from_bytes(sig));
        assert!(!tx.check_sign());
    }

    #[test]
    fn signed_by_other_key_fails_verification() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let from = Address::from_public_key(&keypair.public_key_bytes());
        let mut tx = Transaction::new(
            from,
            Address::from_bytes([2u8; 20]),
            Balance::from(100u64),
            1,
            1_583_789_700,
            vec![],
        )
        .unwrap();
        tx.sign(&other);
        assert!(!tx.check_sign());
    }

    #[test]
    fn contract_data_round_trip() {
        let data = ContractData {
            init_message: vec![0x60, 0x01],
            abi: r#"{"methods":[]}"#.to_string(),
        };
        let decoded: ContractData = from_bytes(&to_bytes(&data)).unwrap();
        assert_eq!(decoded, data);
    }
}
