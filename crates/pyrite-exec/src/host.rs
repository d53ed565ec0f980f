use primitive_types::U256;
use tracing::trace;

use pyrite_chain::Blockchain;
use pyrite_core::{Address, Sha256};
use pyrite_state::Commit;
use pyrite_vm::{CallKind, Host, StorageStatus, TxContext, VmMessage, VmResult, VmStatus};

/// The DIFFICULTY word contracts observe. Proof-of-work difficulty is a
/// 256-bit comparer here, not a scalar, so a fixed constant is exposed
/// instead.
pub const BLOCK_DIFFICULTY_WORD: u64 = 0x28;

/// Execution context shared by every frame of one outer transaction: the
/// block being applied and the originating transaction's identity. View
/// calls run under a null identity.
#[derive(Clone, Debug)]
pub struct HostContext {
    pub origin: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub coinbase: Address,
}

impl HostContext {
    /// The synthetic context for read-only view calls.
    pub fn null() -> Self {
        Self {
            origin: Address::null(),
            block_number: 0,
            block_timestamp: 0,
            coinbase: Address::null(),
        }
    }
}

/// [`Host`] implementation over the active [`Commit`]. Borrows the commit
/// and the chain for the duration of exactly one outer execution; no
/// ownership crosses that boundary.
///
/// Every callback is exception-neutral: internal failures degrade to safe
/// defaults instead of unwinding into the interpreter.
pub struct CommitHost<'a, 'b> {
    chain: &'a Blockchain,
    commit: &'a mut Commit<'b>,
    context: HostContext,
}

impl<'a, 'b> CommitHost<'a, 'b> {
    pub fn new(chain: &'a Blockchain, commit: &'a mut Commit<'b>, context: HostContext) -> Self {
        Self {
            chain,
            commit,
            context,
        }
    }
}

const ZERO_VALUE: [u8; 32] = [0u8; 32];

impl Host for CommitHost<'_, '_> {
    fn account_exists(&self, address: &Address) -> bool {
        self.commit.has_account(address)
    }

    fn get_storage(&self, address: &Address, key: &[u8; 32]) -> [u8; 32] {
        self.commit
            .get_storage_value(address, &Sha256::from_bytes(*key))
            .unwrap_or(ZERO_VALUE)
    }

    fn set_storage(
        &mut self,
        address: &Address,
        key: &[u8; 32],
        value: &[u8; 32],
    ) -> StorageStatus {
        let key = Sha256::from_bytes(*key);
        let existing = self.commit.get_storage_value(address, &key).ok();
        match existing {
            None => {
                if *value == ZERO_VALUE {
                    return StorageStatus::Unchanged;
                }
                if self.commit.set_storage_value(address, key, *value).is_err() {
                    return StorageStatus::Unchanged;
                }
                StorageStatus::Added
            }
            Some(old) => {
                if self.commit.set_storage_value(address, key, *value).is_err() {
                    return StorageStatus::Unchanged;
                }
                if old == *value {
                    StorageStatus::Unchanged
                } else if *value == ZERO_VALUE {
                    StorageStatus::Deleted
                } else {
                    StorageStatus::Modified
                }
            }
        }
    }

    fn get_balance(&self, address: &Address) -> U256 {
        self.commit.get_balance(address).unwrap_or_default()
    }

    fn get_code_size(&self, address: &Address) -> usize {
        self.commit.get_code_size(address).unwrap_or(0)
    }

    fn get_code_hash(&self, address: &Address) -> [u8; 32] {
        self.commit
            .get_code_hash(address)
            .map(|h| *h.as_bytes())
            .unwrap_or(ZERO_VALUE)
    }

    fn copy_code(&self, address: &Address, offset: usize, buffer: &mut [u8]) -> usize {
        let code = match self.commit.get_runtime_code(address) {
            Ok(code) => code,
            Err(_) => return 0,
        };
        if offset >= code.len() {
            return 0;
        }
        let count = buffer.len().min(code.len() - offset);
        buffer[..count].copy_from_slice(&code[offset..offset + count]);
        count
    }

    fn selfdestruct(&mut self, address: &Address, beneficiary: &Address) {
        if !self.commit.delete_account(address, beneficiary) {
            trace!(%address, "selfdestruct on unknown account ignored");
        }
    }

    fn call(&mut self, message: VmMessage) -> VmResult {
        // Value moves from the caller regardless of what the destination is.
        if !message.value.is_zero()
            && !self
                .commit
                .try_transfer_money(&message.sender, &message.destination, message.value)
        {
            return VmResult::new(VmStatus::Failure, message.gas, Vec::new());
        }

        let is_contract = self
            .commit
            .account_type(&message.destination)
            .map(|t| t == pyrite_core::AccountType::Contract)
            .unwrap_or(false);
        if !is_contract {
            // Plain transfer: the value already moved above.
            return VmResult::new(VmStatus::Success, message.gas, Vec::new());
        }

        let code = match self.commit.get_runtime_code(&message.destination) {
            Ok(code) => code,
            Err(_) => return VmResult::new(VmStatus::Failure, message.gas, Vec::new()),
        };
        debug_assert_eq!(message.kind, CallKind::Call);
        pyrite_vm::execute(self, &message, &code)
    }

    fn get_tx_context(&self) -> TxContext {
        TxContext {
            origin: self.context.origin,
            block_number: self.context.block_number,
            block_timestamp: self.context.block_timestamp,
            coinbase: self.context.coinbase,
            gas_price: U256::zero(),
            block_difficulty: U256::from(BLOCK_DIFFICULTY_WORD) << (8usize * 29),
            chain_id: U256::zero(),
        }
    }

    fn get_block_hash(&self, number: u64) -> [u8; 32] {
        self.chain
            .find_block_hash_by_depth(number)
            .map(|h| *h.as_bytes())
            .unwrap_or(ZERO_VALUE)
    }

    fn emit_log(&mut self, address: &Address, data: &[u8], topics: &[[u8; 32]]) {
        // Event logs are not persisted in this version.
        trace!(%address, data_len = data.len(), topics = topics.len(), "contract log dropped");
    }
}
