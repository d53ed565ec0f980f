use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use tracing::{debug, info};

use pyrite_consensus::{Complexity, Consensus};
use pyrite_core::constants::MAX_TIMESTAMP_SKEW_SECS;
use pyrite_core::{
    codec, BlockDepth, Error, Event, ImmutableBlock, Result, Sha256, SubscriptionId, Transaction,
};
use pyrite_state::StateManager;
use pyrite_storage::{Database, KeyTag, LAST_BLOCK_HASH_KEY};

/// Outcome of offering a block to the chain. Validation failures are data,
/// not errors; only persistence corruption escapes as `Err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdditionResult {
    Added,
    AlreadyInBlockchain,
    InvalidParentHash,
    InvalidDepth,
    OldTimestamp,
    FutureTimestamp,
    InvalidTransactions,
    ConsensusError,
}

struct ChainIndex {
    blocks: HashMap<Sha256, ImmutableBlock>,
    by_depth: HashMap<BlockDepth, Sha256>,
    top_block_hash: Sha256,
}

/// The canonical chain: an in-memory index over content-addressed blocks,
/// mirrored to the persistent store on every acceptance.
pub struct Blockchain {
    index: RwLock<ChainIndex>,
    consensus: Mutex<Consensus>,
    database: Mutex<Database>,
    block_added: Event<ImmutableBlock>,
}

impl Blockchain {
    pub fn new(database: Database) -> Self {
        Self {
            index: RwLock::new(ChainIndex {
                blocks: HashMap::new(),
                by_depth: HashMap::new(),
                top_block_hash: Sha256::null(),
            }),
            consensus: Mutex::new(Consensus::new()),
            database: Mutex::new(database),
            block_added: Event::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn find_block(&self, hash: &Sha256) -> Option<ImmutableBlock> {
        self.index.read().expect("chain lock").blocks.get(hash).cloned()
    }

    pub fn find_block_hash_by_depth(&self, depth: BlockDepth) -> Option<Sha256> {
        self.index.read().expect("chain lock").by_depth.get(&depth).copied()
    }

    /// Scan the chain for a transaction by canonical hash.
    pub fn find_transaction(&self, hash: &Sha256) -> Option<Transaction> {
        let index = self.index.read().expect("chain lock");
        for block in index.blocks.values() {
            if let Some(tx) = block.transactions().find_by_hash(hash) {
                return Some(tx.clone());
            }
        }
        None
    }

    pub fn top_block_hash(&self) -> Sha256 {
        self.index.read().expect("chain lock").top_block_hash
    }

    pub fn top_block(&self) -> ImmutableBlock {
        let index = self.index.read().expect("chain lock");
        index
            .blocks
            .get(&index.top_block_hash)
            .cloned()
            .expect("chain always holds its tip")
    }

    pub fn len(&self) -> u64 {
        self.index.read().expect("chain lock").blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().expect("chain lock").blocks.is_empty()
    }

    /// Snapshot of the current PoW target, for the miner.
    pub fn complexity(&self) -> Complexity {
        self.consensus.lock().expect("consensus lock").complexity().clone()
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Install the founding block. Only an empty chain accepts it.
    pub fn add_genesis_block(&self, genesis: &ImmutableBlock) -> Result<()> {
        {
            let mut index = self.index.write().expect("chain lock");
            if !index.blocks.is_empty() {
                return Err(Error::Logic("cannot add genesis to a non-empty chain".into()));
            }
            let hash = *genesis.hash();
            index.blocks.insert(hash, genesis.clone());
            index.by_depth.insert(genesis.depth(), hash);
            index.top_block_hash = hash;
            self.persist(genesis)?;
        }
        self.consensus
            .lock()
            .expect("consensus lock")
            .apply_block(genesis)?;
        info!(hash = %genesis.hash(), "genesis block installed");
        self.block_added.notify(genesis);
        Ok(())
    }

    /// The block validation pipeline. Returns what happened; `Err` only for
    /// unrecoverable persistence or consensus corruption.
    pub fn try_add_block(
        &self,
        block: &ImmutableBlock,
        state: &StateManager,
    ) -> Result<AdditionResult> {
        let hash = *block.hash();
        {
            let index = self.index.read().expect("chain lock");
            if index.blocks.contains_key(&hash) {
                return Ok(AdditionResult::AlreadyInBlockchain);
            }
            if *block.prev_block_hash() != index.top_block_hash {
                return Ok(AdditionResult::InvalidParentHash);
            }
            if block.depth() != index.blocks.len() as u64 {
                return Ok(AdditionResult::InvalidDepth);
            }
            let parent = index
                .blocks
                .get(&index.top_block_hash)
                .expect("chain always holds its tip");
            if block.timestamp() < parent.timestamp() {
                return Ok(AdditionResult::OldTimestamp);
            }
        }
        let now = chrono::Utc::now().timestamp() as u64;
        if block.timestamp() > now + MAX_TIMESTAMP_SKEW_SECS {
            return Ok(AdditionResult::FutureTimestamp);
        }

        if !block.transactions().iter().all(Transaction::check_sign)
            || !state.check_transactions_set(block.transactions())
        {
            return Ok(AdditionResult::InvalidTransactions);
        }

        {
            let consensus = self.consensus.lock().expect("consensus lock");
            if !consensus.check_block(block) {
                return Ok(AdditionResult::ConsensusError);
            }
        }

        {
            let mut index = self.index.write().expect("chain lock");
            // Re-validate the race-prone predicates under the write lock.
            if index.blocks.contains_key(&hash) {
                return Ok(AdditionResult::AlreadyInBlockchain);
            }
            if *block.prev_block_hash() != index.top_block_hash {
                return Ok(AdditionResult::InvalidParentHash);
            }
            index.blocks.insert(hash, block.clone());
            index.by_depth.insert(block.depth(), hash);
            index.top_block_hash = hash;
            self.persist(block)?;
        }
        self.consensus
            .lock()
            .expect("consensus lock")
            .apply_block(block)?;

        debug!(hash = %hash, depth = block.depth(), "block accepted");
        self.block_added.notify(block);
        Ok(AdditionResult::Added)
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    fn persist(&self, block: &ImmutableBlock) -> Result<()> {
        let database = self.database.lock().expect("database lock");
        let hash = block.hash().as_bytes();
        if database.exists(KeyTag::Block, hash)? {
            return Ok(());
        }
        database.put(KeyTag::Block, hash, &codec::to_bytes(block))?;
        database.put(
            KeyTag::PreviousBlockHash,
            hash,
            block.prev_block_hash().as_bytes(),
        )?;
        database.put(KeyTag::System, LAST_BLOCK_HASH_KEY, hash)?;
        Ok(())
    }

    /// Read the persisted chain, genesis first, following the parent-hash
    /// links backward from the stored tip. Every inconsistency (missing
    /// link, undecodable record, hash mismatch) is fatal.
    pub fn load_blocks_from_storage(&self) -> Result<Vec<ImmutableBlock>> {
        let database = self.database.lock().expect("database lock");
        let Some(tip) = database.get(KeyTag::System, LAST_BLOCK_HASH_KEY)? else {
            return Ok(Vec::new());
        };

        let mut hashes = Vec::new();
        let mut current = decode_hash(&tip)?;
        while !current.is_null() {
            hashes.push(current);
            let parent = database
                .get(KeyTag::PreviousBlockHash, current.as_bytes())?
                .ok_or_else(|| {
                    Error::FatalConsensus(format!("missing parent link for block {current}"))
                })?;
            current = decode_hash(&parent)?;
        }
        hashes.reverse();

        let mut blocks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let raw = database
                .get(KeyTag::Block, hash.as_bytes())?
                .ok_or_else(|| Error::FatalConsensus(format!("missing block record {hash}")))?;
            let block: ImmutableBlock = codec::from_bytes(&raw)
                .map_err(|e| Error::FatalConsensus(format!("undecodable block {hash}: {e}")))?;
            if *block.hash() != hash {
                return Err(Error::FatalConsensus(format!(
                    "stored block {hash} rehashes to {}",
                    block.hash()
                )));
            }
            blocks.push(block);
        }
        info!(blocks = blocks.len(), "persistent chain walked");
        Ok(blocks)
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn subscribe_block_added(
        &self,
        callback: impl Fn(&ImmutableBlock) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.block_added.subscribe(callback)
    }
}

fn decode_hash(raw: &[u8]) -> Result<Sha256> {
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| Error::FatalConsensus("stored hash is not 32 bytes".into()))?;
    Ok(Sha256::from_bytes(bytes))
}
