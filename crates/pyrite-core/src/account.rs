use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Address, Balance, Nonce, Sha256};

/// Width of one contract storage slot, key and value alike.
pub const STORAGE_VALUE_LENGTH: usize = 32;

pub type StorageValue = [u8; STORAGE_VALUE_LENGTH];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountType {
    Client = 0,
    Contract = 1,
}

/// The full state of one account.
///
/// Invariants: a contract has a non-null `code_hash` from creation on;
/// `runtime_code` stays empty until initialization returns; balances never
/// go negative (checked subtraction).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub account_type: AccountType,
    pub nonce: Nonce,
    pub balance: Balance,
    pub code_hash: Sha256,
    pub transactions: Vec<Sha256>,
    pub storage: HashMap<Sha256, StorageValue>,
    pub runtime_code: Vec<u8>,
    pub abi: String,
}

impl AccountState {
    pub fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            nonce: 0,
            balance: Balance::zero(),
            code_hash: Sha256::null(),
            transactions: Vec::new(),
            storage: HashMap::new(),
            runtime_code: Vec::new(),
            abi: String::new(),
        }
    }

    pub fn is_contract(&self) -> bool {
        self.account_type == AccountType::Contract
    }

    pub fn add_balance(&mut self, value: Balance) {
        self.balance = self.balance.saturating_add(value);
    }

    pub fn sub_balance(&mut self, value: Balance) -> Result<()> {
        if self.balance < value {
            return Err(Error::Logic(format!(
                "balance underflow: have {}, need {}",
                self.balance, value
            )));
        }
        self.balance -= value;
        Ok(())
    }

    /// Append a transaction hash to the account history and advance the
    /// nonce. Called once per transaction regardless of execution outcome.
    pub fn record_transaction(&mut self, hash: Sha256) {
        self.transactions.push(hash);
        self.nonce += 1;
    }

    // ── Contract storage ─────────────────────────────────────────────────────

    pub fn check_storage_value(&self, key: &Sha256) -> bool {
        self.storage.contains_key(key)
    }

    pub fn get_storage_value(&self, key: &Sha256) -> Result<StorageValue> {
        self.storage
            .get(key)
            .copied()
            .ok_or_else(|| Error::Logic("no storage value under the given key".into()))
    }

    pub fn set_storage_value(&mut self, key: Sha256, value: StorageValue) {
        self.storage.insert(key, value);
    }

    /// Snapshot used by account queries over the public API.
    pub fn to_info(&self, address: Address) -> AccountInfo {
        AccountInfo {
            account_type: self.account_type,
            address,
            balance: self.balance,
            nonce: self.nonce,
            transactions: self.transactions.clone(),
        }
    }
}

/// The externally visible account snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_type: AccountType,
    pub address: Address,
    pub balance: Balance,
    pub nonce: Nonce,
    pub transactions: Vec<Sha256>,
}

impl AccountInfo {
    /// The default snapshot for an address the state has never seen.
    pub fn absent(address: Address) -> Self {
        Self {
            account_type: AccountType::Client,
            address,
            balance: Balance::zero(),
            nonce: 0,
            transactions: Vec::new(),
        }
    }
}
