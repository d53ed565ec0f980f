use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use pyrite_core::{
    aggregate_cost, AccountInfo, AccountState, AccountType, Address, Balance, Error, Event,
    ImmutableBlock, Result, Sha256, SubscriptionId, Transaction, TransactionsSet,
};

use crate::Commit;

/// The global account map. Reads take the shared lock, mutations the
/// exclusive lock; account-update events fire after the lock is released.
pub struct StateManager {
    states: RwLock<HashMap<Address, AccountState>>,
    account_update: Event<Address>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            account_update: Event::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn has_account(&self, address: &Address) -> bool {
        self.states.read().expect("state lock").contains_key(address)
    }

    /// Clone of the stored account. Lookups that require existence fail with
    /// `InvalidArgument`; use [`StateManager::get_account_info`] or
    /// [`StateManager::get_balance`] for zero-default reads.
    pub fn get_account(&self, address: &Address) -> Result<AccountState> {
        self.states
            .read()
            .expect("state lock")
            .get(address)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("no account at {address}")))
    }

    pub fn get_account_info(&self, address: &Address) -> AccountInfo {
        match self.states.read().expect("state lock").get(address) {
            Some(account) => account.to_info(*address),
            None => AccountInfo::absent(*address),
        }
    }

    pub fn get_balance(&self, address: &Address) -> Balance {
        self.states
            .read()
            .expect("state lock")
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_else(Balance::zero)
    }

    /// Single-transaction affordability check: the sender exists and covers
    /// `amount + fee`.
    pub fn check_transaction(&self, tx: &Transaction) -> bool {
        let states = self.states.read().expect("state lock");
        match states.get(tx.from()) {
            Some(account) => {
                account.balance >= tx.amount().saturating_add(Balance::from(tx.fee()))
            }
            None => false,
        }
    }

    /// Whole-block affordability check: every sender exists and covers its
    /// aggregate `amount + fee` across the set.
    pub fn check_transactions_set(&self, set: &TransactionsSet) -> bool {
        let states = self.states.read().expect("state lock");
        let cost = aggregate_cost(set);
        for tx in set {
            match states.get(tx.from()) {
                Some(account) => {
                    let sender_cost = cost.get(tx.from()).expect("sender present in aggregate");
                    if *sender_cost > account.balance {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    // ── Mutations on the base state ──────────────────────────────────────────

    /// Seed the state from the genesis block: each emission transaction
    /// creates a client account holding its amount.
    pub fn update_from_genesis(&self, genesis: &ImmutableBlock) {
        let mut states = self.states.write().expect("state lock");
        for tx in genesis.transactions() {
            let mut account = AccountState::new(AccountType::Client);
            account.balance = tx.amount();
            states.insert(*tx.to(), account);
        }
    }

    /// Record a transaction hash in the sender's history and advance its
    /// nonce. Unconditional: runs once per executed transaction regardless
    /// of the execution outcome, creating the account if needed.
    pub fn record_transaction(&self, address: &Address, tx_hash: Sha256) {
        let mut states = self.states.write().expect("state lock");
        states
            .entry(*address)
            .or_insert_with(|| AccountState::new(AccountType::Client))
            .record_transaction(tx_hash);
    }

    /// Credit the fixed per-block emission to the coinbase.
    pub fn apply_block_emission(&self, address: &Address, value: Balance) {
        {
            let mut states = self.states.write().expect("state lock");
            states
                .entry(*address)
                .or_insert_with(|| AccountState::new(AccountType::Client))
                .add_balance(value);
        }
        self.account_update.notify(address);
    }

    // ── Commits ──────────────────────────────────────────────────────────────

    pub fn create_commit(&self) -> Commit<'_> {
        Commit::new(self)
    }

    /// Fold a commit's overlay into the base state. Changed accounts are
    /// inserted or overwritten, deletions removed; update events fire per
    /// touched address once the exclusive lock is released.
    pub fn apply_commit(&self, commit: Commit<'_>) {
        let (changed, deleted) = commit.into_parts();
        let mut updated: Vec<Address> = Vec::with_capacity(changed.len() + deleted.len());
        {
            let mut states = self.states.write().expect("state lock");
            for (address, account) in changed {
                states.insert(address, account);
                updated.push(address);
            }
            for address in deleted {
                states.remove(&address);
                updated.push(address);
            }
        }
        debug!(accounts = updated.len(), "commit applied");
        for address in &updated {
            self.account_update.notify(address);
        }
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn subscribe_account_updates(
        &self,
        callback: impl Fn(&Address) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.account_update.subscribe(callback)
    }

    pub fn unsubscribe_account_updates(&self, id: SubscriptionId) {
        self.account_update.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn funded(manager: &StateManager, byte: u8, balance: u64) -> Address {
        let address = Address::from_bytes([byte; 20]);
        let mut commit = manager.create_commit();
        commit.create_client_account(&address);
        commit.add_balance(&address, Balance::from(balance)).unwrap();
        manager.apply_commit(commit);
        address
    }

    fn tx(from: Address, to: Address, amount: u64, fee: u64) -> Transaction {
        Transaction::new(from, to, Balance::from(amount), fee, 1_583_789_700, vec![]).unwrap()
    }

    #[test]
    fn missing_account_reads() {
        let manager = StateManager::new();
        let ghost = Address::from_bytes([9; 20]);
        assert!(!manager.has_account(&ghost));
        assert!(manager.get_account(&ghost).is_err());
        assert_eq!(manager.get_balance(&ghost), Balance::zero());
        assert_eq!(manager.get_account_info(&ghost), AccountInfo::absent(ghost));
    }

    #[test]
    fn check_transaction_requires_funds() {
        let manager = StateManager::new();
        let a = funded(&manager, 1, 100);
        let b = Address::from_bytes([2; 20]);

        assert!(manager.check_transaction(&tx(a, b, 99, 1)));
        assert!(!manager.check_transaction(&tx(a, b, 100, 1)));
        assert!(!manager.check_transaction(&tx(b, a, 1, 0)));
    }

    #[test]
    fn check_transactions_set_uses_aggregate_cost() {
        let manager = StateManager::new();
        let a = funded(&manager, 1, 100);
        let b = Address::from_bytes([2; 20]);
        let c = Address::from_bytes([3; 20]);

        // Each alone affordable, together 162 > 100.
        let mut set = TransactionsSet::new();
        set.add(tx(a, b, 80, 1));
        set.add(tx(a, c, 80, 1));
        assert!(!manager.check_transactions_set(&set));

        let mut set = TransactionsSet::new();
        set.add(tx(a, b, 50, 1));
        set.add(tx(a, c, 48, 1));
        assert!(manager.check_transactions_set(&set));
    }

    #[test]
    fn record_transaction_creates_and_advances() {
        let manager = StateManager::new();
        let a = Address::from_bytes([1; 20]);
        manager.record_transaction(&a, Sha256::compute(b"t1"));
        manager.record_transaction(&a, Sha256::compute(b"t2"));
        let info = manager.get_account_info(&a);
        assert_eq!(info.nonce, 2);
        assert_eq!(info.transactions.len(), 2);
    }

    #[test]
    fn apply_commit_fires_account_updates_per_address() {
        let manager = StateManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = Arc::clone(&count);
        manager.subscribe_account_updates(move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        });

        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        let mut commit = manager.create_commit();
        commit.create_client_account(&a);
        commit.create_client_account(&b);
        manager.apply_commit(commit);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
