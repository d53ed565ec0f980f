use std::collections::{HashMap, HashSet};

use pyrite_core::{AccountState, AccountType, Address, Balance, Error, Result, Sha256, StorageValue};

use crate::{derive_contract_address, StateManager};

/// Copy-on-write overlay over a [`StateManager`].
///
/// Reads fall through to the underlying state; the first mutation of an
/// account copies it into the overlay. A commit is confined to the single
/// thread executing one transaction; concurrent commits against the same
/// state are serialized by the caller.
pub struct Commit<'a> {
    state: &'a StateManager,
    changed: HashMap<Address, AccountState>,
    deleted: HashSet<Address>,
}

impl<'a> Commit<'a> {
    pub(crate) fn new(state: &'a StateManager) -> Self {
        Self {
            state,
            changed: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (HashMap<Address, AccountState>, HashSet<Address>) {
        (self.changed, self.deleted)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn has_account(&self, address: &Address) -> bool {
        if self.deleted.contains(address) {
            return false;
        }
        self.changed.contains_key(address) || self.state.has_account(address)
    }

    /// Clone of the account as this commit sees it.
    pub fn get_account(&self, address: &Address) -> Result<AccountState> {
        if self.deleted.contains(address) {
            return Err(Error::InvalidArgument(format!("no account at {address}")));
        }
        if let Some(account) = self.changed.get(address) {
            return Ok(account.clone());
        }
        self.state.get_account(address)
    }

    pub fn account_type(&self, address: &Address) -> Result<AccountType> {
        Ok(self.get_account(address)?.account_type)
    }

    pub fn get_balance(&self, address: &Address) -> Result<Balance> {
        Ok(self.get_account(address)?.balance)
    }

    // ── Account lifecycle ────────────────────────────────────────────────────

    /// Idempotence guard included: returns false if the address exists.
    pub fn create_client_account(&mut self, address: &Address) -> bool {
        if self.has_account(address) {
            return false;
        }
        self.deleted.remove(address);
        self.changed
            .insert(*address, AccountState::new(AccountType::Client));
        true
    }

    /// Create a contract account for code owned by `from`. The address is
    /// derived deterministically from the code hash, the creator, and the
    /// creator's current nonce; a collision with an existing account is an
    /// invariant violation.
    pub fn create_contract_account(
        &mut self,
        from: &Address,
        code_hash: Sha256,
    ) -> Result<Address> {
        let creator = self.get_account(from)?;
        let contract_address = derive_contract_address(&code_hash, from, creator.nonce);
        if self.has_account(&contract_address) {
            return Err(Error::Logic(format!(
                "derived contract address {contract_address} already exists"
            )));
        }

        let mut account = AccountState::new(AccountType::Contract);
        account.code_hash = code_hash;
        self.deleted.remove(&contract_address);
        self.changed.insert(contract_address, account);
        Ok(contract_address)
    }

    /// Move the whole balance to `beneficiary`, then tombstone the account.
    pub fn delete_account(&mut self, address: &Address, beneficiary: &Address) -> bool {
        let balance = match self.get_balance(address) {
            Ok(balance) => balance,
            Err(_) => return false,
        };
        if !balance.is_zero() && !self.try_transfer_money(address, beneficiary, balance) {
            return false;
        }
        self.changed.remove(address);
        self.deleted.insert(*address);
        true
    }

    // ── Balance movement ─────────────────────────────────────────────────────

    /// False when `from` is missing or underfunded; `to` is auto-created as
    /// a client account when absent.
    pub fn try_transfer_money(&mut self, from: &Address, to: &Address, amount: Balance) -> bool {
        if !self.copy_local_if_not_exists(from) {
            return false;
        }
        if self.local(from).balance < amount {
            return false;
        }
        if !self.copy_local_if_not_exists(to) {
            let created = self.create_client_account(to);
            debug_assert!(created);
        }

        self.local_mut(from).balance -= amount;
        self.local_mut(to).add_balance(amount);
        true
    }

    pub fn add_balance(&mut self, address: &Address, value: Balance) -> Result<()> {
        if !self.copy_local_if_not_exists(address) {
            self.create_client_account(address);
        }
        self.local_mut(address).add_balance(value);
        Ok(())
    }

    pub fn sub_balance(&mut self, address: &Address, value: Balance) -> Result<()> {
        if !self.copy_local_if_not_exists(address) {
            return Err(Error::InvalidArgument(format!("no account at {address}")));
        }
        self.local_mut(address).sub_balance(value)
    }

    // ── Contract storage and code ────────────────────────────────────────────

    pub fn check_storage_value(&self, contract: &Address, key: &Sha256) -> Result<bool> {
        let account = self.require_contract(contract)?;
        Ok(account.check_storage_value(key))
    }

    pub fn get_storage_value(&self, contract: &Address, key: &Sha256) -> Result<StorageValue> {
        let account = self.require_contract(contract)?;
        account.get_storage_value(key)
    }

    pub fn set_storage_value(
        &mut self,
        contract: &Address,
        key: Sha256,
        value: StorageValue,
    ) -> Result<()> {
        if !self.copy_local_if_not_exists(contract) {
            return Err(Error::InvalidArgument(format!("no account at {contract}")));
        }
        let account = self.local_mut(contract);
        if account.account_type != AccountType::Contract {
            return Err(Error::Logic("storage writes require a contract account".into()));
        }
        account.set_storage_value(key, value);
        Ok(())
    }

    pub fn get_code_size(&self, address: &Address) -> Result<usize> {
        Ok(self.get_account(address)?.runtime_code.len())
    }

    pub fn get_code_hash(&self, address: &Address) -> Result<Sha256> {
        Ok(self.get_account(address)?.code_hash)
    }

    pub fn get_runtime_code(&self, address: &Address) -> Result<Vec<u8>> {
        Ok(self.get_account(address)?.runtime_code)
    }

    pub fn set_runtime_code(&mut self, contract: &Address, code: Vec<u8>) -> Result<()> {
        if !self.copy_local_if_not_exists(contract) {
            return Err(Error::InvalidArgument(format!("no account at {contract}")));
        }
        let account = self.local_mut(contract);
        if account.account_type != AccountType::Contract {
            return Err(Error::Logic("runtime code requires a contract account".into()));
        }
        account.runtime_code = code;
        Ok(())
    }

    pub fn set_abi(&mut self, contract: &Address, abi: String) -> Result<()> {
        if !self.copy_local_if_not_exists(contract) {
            return Err(Error::InvalidArgument(format!("no account at {contract}")));
        }
        let account = self.local_mut(contract);
        if account.account_type != AccountType::Contract {
            return Err(Error::Logic("an ABI requires a contract account".into()));
        }
        account.abi = abi;
        Ok(())
    }

    // ── Overlay plumbing ─────────────────────────────────────────────────────

    fn require_contract(&self, address: &Address) -> Result<AccountState> {
        let account = self.get_account(address)?;
        if account.account_type != AccountType::Contract {
            return Err(Error::Logic(format!("{address} is not a contract account")));
        }
        Ok(account)
    }

    /// Pull the account into the overlay if it exists anywhere. False when
    /// the address is unknown.
    fn copy_local_if_not_exists(&mut self, address: &Address) -> bool {
        if !self.has_account(address) {
            return false;
        }
        if !self.changed.contains_key(address) {
            let account = self
                .state
                .get_account(address)
                .expect("checked by has_account");
            self.changed.insert(*address, account);
        }
        true
    }

    fn local(&self, address: &Address) -> &AccountState {
        self.changed.get(address).expect("account copied into overlay")
    }

    fn local_mut(&mut self, address: &Address) -> &mut AccountState {
        self.changed
            .get_mut(address)
            .expect("account copied into overlay")
    }
}
