use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use once_cell::sync::OnceCell;
use tokio::sync::broadcast;
use tracing::{info, warn};

use pyrite_chain::{genesis_block, AdditionResult, Blockchain};
use pyrite_core::{
    aggregate_cost, AccountInfo, Address, Balance, Error, Event, ImmutableBlock, MutableBlock,
    Result, Sha256, Transaction, TransactionStatus, TransactionsSet,
};
use pyrite_exec::Executor;
use pyrite_miner::Miner;
use pyrite_rpc::NodeInfoView;
use pyrite_state::StateManager;
use pyrite_storage::Database;

/// The consensus-validated node core: owns the blockchain, the account
/// state, the pending pool, the transaction-status index, and the miner,
/// and fans events out to API subscribers and the gossip layer.
pub struct Core {
    this_address: Address,
    state: StateManager,
    chain: Blockchain,
    miner: OnceCell<Miner>,
    mining_enabled: AtomicBool,

    pending: RwLock<TransactionsSet>,
    tx_statuses: RwLock<HashMap<Sha256, TransactionStatus>>,

    // In-process subscribers (gossip wiring, wait-for-inclusion).
    block_event: Event<ImmutableBlock>,
    pending_event: Event<Transaction>,

    // API subscriber streams.
    blocks_tx: broadcast::Sender<NodeInfoView>,
    accounts_tx: broadcast::Sender<Address>,
    statuses_tx: broadcast::Sender<(Sha256, TransactionStatus)>,
}

impl Core {
    /// Bring the node core up: install (or verify) genesis, replay the
    /// persisted chain through the executor, and start the miner threads.
    pub fn new(
        this_address: Address,
        database: Database,
        miner_threads: Option<usize>,
        mining_enabled: bool,
    ) -> Result<Arc<Self>> {
        let (blocks_tx, _) = broadcast::channel(64);
        let (accounts_tx, _) = broadcast::channel(256);
        let (statuses_tx, _) = broadcast::channel(256);

        let core = Arc::new(Self {
            this_address,
            state: StateManager::new(),
            chain: Blockchain::new(database),
            miner: OnceCell::new(),
            mining_enabled: AtomicBool::new(mining_enabled),
            pending: RwLock::new(TransactionsSet::new()),
            tx_statuses: RwLock::new(HashMap::new()),
            block_event: Event::new(),
            pending_event: Event::new(),
            blocks_tx,
            accounts_tx,
            statuses_tx,
        });

        // Bridge state-level account updates onto the API stream.
        {
            let accounts_tx = core.accounts_tx.clone();
            core.state.subscribe_account_updates(move |address| {
                let _ = accounts_tx.send(*address);
            });
        }

        core.bootstrap()?;

        let miner = {
            let weak = Arc::downgrade(&core);
            Miner::new(miner_threads, move |block| {
                if let Some(core) = weak.upgrade() {
                    match core.try_add_block(&block) {
                        Ok(AdditionResult::Added) => {}
                        Ok(other) => warn!(?other, "mined block not accepted"),
                        Err(e) => warn!(error = %e, "mined block failed fatally"),
                    }
                }
            })
        };
        core.miner.set(miner).ok().expect("miner installed once");
        core.retask_miner();

        Ok(core)
    }

    /// Install genesis on a fresh store, or verify and replay a persisted
    /// chain. Persistence stores blocks but not the derived state, so every
    /// block's transactions are re-executed here.
    fn bootstrap(&self) -> Result<()> {
        let persisted = self.chain.load_blocks_from_storage()?;

        // Refuse a foreign store before writing anything into it.
        if let Some(stored_genesis) = persisted.first() {
            if stored_genesis.hash() != genesis_block().hash() {
                return Err(Error::FatalConsensus(
                    "persistent store belongs to a different network".into(),
                ));
            }
        }

        self.chain.add_genesis_block(genesis_block())?;
        self.state.update_from_genesis(genesis_block());

        for block in persisted.iter().skip(1) {
            match self.chain.try_add_block(block, &self.state)? {
                AdditionResult::Added => self.execute_block(block),
                other => {
                    return Err(Error::FatalConsensus(format!(
                        "persisted block {} rejected on replay: {other:?}",
                        block.hash()
                    )))
                }
            }
        }
        if persisted.len() > 1 {
            info!(blocks = persisted.len() - 1, "persisted chain replayed");
        }
        Ok(())
    }

    // ── Block intake ─────────────────────────────────────────────────────────

    /// Offer a block from any source: the miner, gossip, or tests. On
    /// acceptance the block's transactions leave the pending pool, are
    /// executed into state, and subscribers hear about all of it.
    pub fn try_add_block(&self, block: &ImmutableBlock) -> Result<AdditionResult> {
        let result = self.chain.try_add_block(block, &self.state)?;
        if result != AdditionResult::Added {
            return Ok(result);
        }

        {
            let mut pending = self.pending.write().expect("pending lock");
            pending.remove_set(block.transactions());
        }
        self.execute_block(block);

        self.block_event.notify(block);
        let _ = self.blocks_tx.send(NodeInfoView {
            top_block_hash: *block.hash(),
            top_block_number: block.depth(),
        });

        self.retask_miner();
        Ok(AdditionResult::Added)
    }

    fn execute_block(&self, block: &ImmutableBlock) {
        let executor = Executor::new(&self.state, &self.chain);
        let outcomes = executor.apply_block_transactions(block);
        let mut statuses = self.tx_statuses.write().expect("status lock");
        for outcome in outcomes {
            statuses.insert(outcome.tx_hash, outcome.status.clone());
            let _ = self.statuses_tx.send((outcome.tx_hash, outcome.status));
        }
    }

    // ── Pending pool ─────────────────────────────────────────────────────────

    /// Admit a transaction into the pending pool: signature verifies, not
    /// already mined or pending, and the sender covers it on top of
    /// everything else they already have pending.
    pub fn add_pending_transaction(&self, tx: Transaction) -> bool {
        if !tx.check_sign() {
            return false;
        }
        let tx_hash = tx.hash_of();
        if self.chain.find_transaction(&tx_hash).is_some() {
            return false;
        }

        {
            let pending = self.pending.read().expect("pending lock");
            if pending.contains(&tx) {
                return false;
            }
            let mut outstanding = aggregate_cost(&pending)
                .remove(tx.from())
                .unwrap_or_else(Balance::zero);
            outstanding = outstanding
                .saturating_add(tx.amount())
                .saturating_add(Balance::from(tx.fee()));
            if self.state.get_balance(tx.from()) < outstanding {
                return false;
            }
        }

        self.pending.write().expect("pending lock").add(tx.clone());
        info!(hash = %tx_hash, "transaction pending");
        self.pending_event.notify(&tx);
        self.retask_miner();
        true
    }

    /// Like [`Core::add_pending_transaction`], but blocks the caller until
    /// a block containing the transaction is observed.
    pub fn add_pending_transaction_and_wait(&self, tx: Transaction) -> Result<()> {
        let tx_hash = tx.hash_of();
        let mined = Arc::new((Mutex::new(false), Condvar::new()));

        let subscription = {
            let mined = Arc::clone(&mined);
            self.block_event.subscribe(move |block| {
                if block.transactions().find_by_hash(&tx_hash).is_some() {
                    let (flag, condvar) = &*mined;
                    *flag.lock().expect("wait lock") = true;
                    condvar.notify_all();
                }
            })
        };

        if !self.add_pending_transaction(tx) {
            self.block_event.unsubscribe(subscription);
            return Err(Error::InvalidArgument("transaction rejected".into()));
        }

        let (flag, condvar) = &*mined;
        let mut guard = flag.lock().expect("wait lock");
        while !*guard {
            guard = condvar.wait(guard).expect("wait lock");
        }
        self.block_event.unsubscribe(subscription);
        Ok(())
    }

    pub fn pending_transactions(&self) -> TransactionsSet {
        self.pending.read().expect("pending lock").clone()
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    /// Template for the next block: parent = tip, next depth, wall-clock
    /// timestamp, this node as coinbase, the whole pending pool as payload.
    pub fn get_block_template(&self) -> MutableBlock {
        let top = self.chain.top_block();
        MutableBlock {
            depth: top.depth() + 1,
            nonce: 0,
            prev_block_hash: *top.hash(),
            timestamp: (chrono::Utc::now().timestamp() as u64).max(top.timestamp()),
            coinbase: self.this_address,
            transactions: self.pending_transactions(),
        }
    }

    fn retask_miner(&self) {
        let Some(miner) = self.miner.get() else { return };
        if !self.mining_enabled.load(Ordering::Relaxed) {
            return;
        }
        miner.find_nonce(self.get_block_template(), self.chain.complexity());
    }

    pub fn set_mining_enabled(&self, enabled: bool) {
        self.mining_enabled.store(enabled, Ordering::Relaxed);
        if enabled {
            self.retask_miner();
        } else if let Some(miner) = self.miner.get() {
            miner.drop_job();
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn this_address(&self) -> &Address {
        &self.this_address
    }

    pub fn top_block(&self) -> ImmutableBlock {
        self.chain.top_block()
    }

    pub fn find_block(&self, hash: &Sha256) -> Option<ImmutableBlock> {
        self.chain.find_block(hash)
    }

    pub fn find_block_by_depth(&self, depth: u64) -> Option<ImmutableBlock> {
        self.chain
            .find_block_hash_by_depth(depth)
            .and_then(|hash| self.chain.find_block(&hash))
    }

    pub fn find_transaction(&self, hash: &Sha256) -> Option<Transaction> {
        self.chain.find_transaction(hash)
    }

    pub fn get_account_info(&self, address: &Address) -> AccountInfo {
        self.state.get_account_info(address)
    }

    pub fn get_transaction_status(&self, hash: &Sha256) -> Option<TransactionStatus> {
        self.tx_statuses.read().expect("status lock").get(hash).cloned()
    }

    /// Read-only contract query (see the executor's view path).
    pub fn call_view_method(
        &self,
        from: &Address,
        contract: &Address,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        Executor::new(&self.state, &self.chain).call_view_method(from, contract, message)
    }

    // ── Event subscriptions ──────────────────────────────────────────────────

    pub fn subscribe_block_added(
        &self,
        callback: impl Fn(&ImmutableBlock) + Send + Sync + 'static,
    ) {
        self.block_event.subscribe(callback);
    }

    pub fn subscribe_pending_transaction(
        &self,
        callback: impl Fn(&Transaction) + Send + Sync + 'static,
    ) {
        self.pending_event.subscribe(callback);
    }

    pub fn blocks_stream(&self) -> broadcast::Receiver<NodeInfoView> {
        self.blocks_tx.subscribe()
    }

    pub fn accounts_stream(&self) -> broadcast::Receiver<Address> {
        self.accounts_tx.subscribe()
    }

    pub fn statuses_stream(&self) -> broadcast::Receiver<(Sha256, TransactionStatus)> {
        self.statuses_tx.subscribe()
    }
}
