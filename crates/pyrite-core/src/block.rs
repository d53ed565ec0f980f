use crate::codec::{self, Decode, Decoder, Encode, Encoder};
use crate::error::{Error, Result};
use crate::txset::TransactionsSet;
use crate::types::{Address, BlockDepth, Sha256, Timestamp};

// ── ImmutableBlock ───────────────────────────────────────────────────────────

/// A sealed block. The hash over the canonical serialization is computed
/// once at construction and cached; the fields can never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImmutableBlock {
    depth: BlockDepth,
    nonce: u64,
    prev_block_hash: Sha256,
    timestamp: Timestamp,
    coinbase: Address,
    transactions: TransactionsSet,
    this_hash: Sha256,
}

impl ImmutableBlock {
    pub fn depth(&self) -> BlockDepth {
        self.depth
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn prev_block_hash(&self) -> &Sha256 {
        &self.prev_block_hash
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn coinbase(&self) -> &Address {
        &self.coinbase
    }

    pub fn transactions(&self) -> &TransactionsSet {
        &self.transactions
    }

    /// The cached canonical hash. Recomputing over the serialized fields
    /// always yields this same value.
    pub fn hash(&self) -> &Sha256 {
        &self.this_hash
    }
}

impl Encode for ImmutableBlock {
    fn encode(&self, enc: &mut Encoder) {
        self.depth.encode(enc);
        self.nonce.encode(enc);
        self.prev_block_hash.encode(enc);
        self.timestamp.encode(enc);
        self.coinbase.encode(enc);
        self.transactions.encode(enc);
    }
}

impl Decode for ImmutableBlock {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let block = MutableBlock {
            depth: BlockDepth::decode(dec)?,
            nonce: u64::decode(dec)?,
            prev_block_hash: Sha256::decode(dec)?,
            timestamp: Timestamp::decode(dec)?,
            coinbase: Address::decode(dec)?,
            transactions: TransactionsSet::decode(dec)?,
        };
        Ok(block.freeze())
    }
}

// ── MutableBlock ─────────────────────────────────────────────────────────────

/// The writable mirror of a block, used for template construction and
/// nonce search. Serializes identically to the immutable form, so hashing a
/// candidate during mining equals hashing the sealed result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutableBlock {
    pub depth: BlockDepth,
    pub nonce: u64,
    pub prev_block_hash: Sha256,
    pub timestamp: Timestamp,
    pub coinbase: Address,
    pub transactions: TransactionsSet,
}

impl MutableBlock {
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    /// Hash of the current field values.
    pub fn hash(&self) -> Sha256 {
        Sha256::compute(&codec::to_bytes(self))
    }

    /// Seal the block, fixing its fields and caching the canonical hash.
    pub fn freeze(self) -> ImmutableBlock {
        let this_hash = self.hash();
        ImmutableBlock {
            depth: self.depth,
            nonce: self.nonce,
            prev_block_hash: self.prev_block_hash,
            timestamp: self.timestamp,
            coinbase: self.coinbase,
            transactions: self.transactions,
            this_hash,
        }
    }
}

impl Encode for MutableBlock {
    fn encode(&self, enc: &mut Encoder) {
        self.depth.encode(enc);
        self.nonce.encode(enc);
        self.prev_block_hash.encode(enc);
        self.timestamp.encode(enc);
        self.coinbase.encode(enc);
        self.transactions.encode(enc);
    }
}

// ── BlockBuilder ─────────────────────────────────────────────────────────────

/// Collects block fields and produces either form. `build_*` fails with
/// `InvalidArgument` if any field was never set.
#[derive(Clone, Debug, Default)]
pub struct BlockBuilder {
    depth: Option<BlockDepth>,
    nonce: Option<u64>,
    prev_block_hash: Option<Sha256>,
    timestamp: Option<Timestamp>,
    coinbase: Option<Address>,
    transactions: Option<TransactionsSet>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, depth: BlockDepth) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn prev_block_hash(mut self, hash: Sha256) -> Self {
        self.prev_block_hash = Some(hash);
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = Some(coinbase);
        self
    }

    pub fn transactions(mut self, transactions: TransactionsSet) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn build_mutable(self) -> Result<MutableBlock> {
        fn require<T>(field: Option<T>, name: &str) -> Result<T> {
            field.ok_or_else(|| Error::InvalidArgument(format!("block field `{name}` not set")))
        }
        Ok(MutableBlock {
            depth: require(self.depth, "depth")?,
            nonce: require(self.nonce, "nonce")?,
            prev_block_hash: require(self.prev_block_hash, "prev_block_hash")?,
            timestamp: require(self.timestamp, "timestamp")?,
            coinbase: require(self.coinbase, "coinbase")?,
            transactions: require(self.transactions, "transactions")?,
        })
    }

    pub fn build_immutable(self) -> Result<ImmutableBlock> {
        Ok(self.build_mutable()?.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};
    use crate::transaction::Transaction;
    use crate::types::Balance;

    fn sample_builder() -> BlockBuilder {
        let mut txs = TransactionsSet::new();
        txs.add(
            Transaction::new(
                Address::from_bytes([1; 20]),
                Address::from_bytes([2; 20]),
                Balance::from(100u64),
                1,
                1_583_789_700,
                vec![],
            )
            .unwrap(),
        );
        BlockBuilder::new()
            .depth(1)
            .nonce(42)
            .prev_block_hash(Sha256::compute(b"parent"))
            .timestamp(1_583_789_800)
            .coinbase(Address::from_bytes([3; 20]))
            .transactions(txs)
    }

    #[test]
    fn build_fails_without_required_field() {
        let builder = BlockBuilder::new().depth(1).nonce(0);
        assert!(matches!(
            builder.build_immutable(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn cached_hash_matches_recomputation() {
        let block = sample_builder().build_immutable().unwrap();
        assert_eq!(*block.hash(), Sha256::compute(&to_bytes(&block)));
    }

    #[test]
    fn mutable_and_immutable_forms_hash_identically() {
        let mutable = sample_builder().build_mutable().unwrap();
        let hash_before = mutable.hash();
        let block = mutable.freeze();
        assert_eq!(*block.hash(), hash_before);
    }

    #[test]
    fn nonce_change_changes_hash() {
        let mut block = sample_builder().build_mutable().unwrap();
        let h1 = block.hash();
        block.set_nonce(43);
        assert_ne!(block.hash(), h1);
    }

    #[test]
    fn serialization_round_trip() {
        let block = sample_builder().build_immutable().unwrap();
        let decoded: ImmutableBlock = from_bytes(&to_bytes(&block)).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
    }
}
