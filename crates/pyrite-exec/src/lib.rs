//! The transaction executor: replays the transactions of an accepted block
//! against the state, one reversible [`Commit`] per transaction, driving the
//! VM for contract creation and calls.

mod host;

pub use host::{CommitHost, HostContext, BLOCK_DIFFICULTY_WORD};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use primitive_types::U256;
use tracing::debug;

use pyrite_chain::Blockchain;
use pyrite_core::constants::{EMISSION_VALUE, VIEW_GAS_LIMIT};
use pyrite_core::{
    codec, ActionType, Address, Balance, ContractData, Error, Fee, ImmutableBlock, Result,
    Sha256, StatusCode, Transaction, TransactionStatus,
};
use pyrite_state::{Commit, StateManager};
use pyrite_vm::{CallKind, VmMessage, VmResult, VmStatus};

/// Result of executing one transaction: its hash and the status record to
/// index under it.
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    pub tx_hash: Sha256,
    pub status: TransactionStatus,
}

pub struct Executor<'a> {
    state: &'a StateManager,
    chain: &'a Blockchain,
}

impl<'a> Executor<'a> {
    pub fn new(state: &'a StateManager, chain: &'a Blockchain) -> Self {
        Self { state, chain }
    }

    /// Apply every transaction of `block`, in set order, after crediting
    /// the block emission to the coinbase. Execution never fails a block:
    /// each transaction lands as a status, good or bad.
    pub fn apply_block_transactions(&self, block: &ImmutableBlock) -> Vec<ExecutionOutcome> {
        self.state
            .apply_block_emission(block.coinbase(), Balance::from(EMISSION_VALUE));

        block
            .transactions()
            .iter()
            .map(|tx| self.execute_transaction(tx, block))
            .collect()
    }

    fn execute_transaction(&self, tx: &Transaction, block: &ImmutableBlock) -> ExecutionOutcome {
        let tx_hash = tx.hash_of();
        // History and nonce advance on the base state, once per transaction,
        // regardless of the execution outcome.
        self.state.record_transaction(tx.from(), tx_hash);

        let status = if tx.is_contract_creation() {
            self.execute_creation(tx, block)
        } else {
            let is_contract = self
                .state
                .get_account(tx.to())
                .map(|a| a.is_contract())
                .unwrap_or(false);
            if is_contract {
                self.execute_contract_call(tx, block)
            } else {
                self.execute_transfer(tx, block)
            }
        };

        debug!(hash = %tx_hash, status = ?status.status, action = ?status.action, "transaction executed");
        ExecutionOutcome { tx_hash, status }
    }

    // ── Contract creation ────────────────────────────────────────────────────

    fn execute_creation(&self, tx: &Transaction, block: &ImmutableBlock) -> TransactionStatus {
        let action = ActionType::ContractCreation;
        let mut commit = self.state.create_commit();
        if commit
            .sub_balance(tx.from(), Balance::from(tx.fee()))
            .is_err()
        {
            return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new());
        }

        let Ok(contract_data) = codec::from_bytes::<ContractData>(tx.data()) else {
            return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new());
        };

        let code_hash = Sha256::compute(&contract_data.init_message);
        let contract_address = match commit.create_contract_account(tx.from(), code_hash) {
            Ok(address) => address,
            Err(_) => {
                return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new())
            }
        };

        if !commit.try_transfer_money(tx.from(), &contract_address, tx.amount()) {
            return TransactionStatus::new(StatusCode::Rejected, action, tx.fee(), String::new());
        }

        let message = VmMessage {
            kind: CallKind::Create,
            is_static: false,
            depth: 0,
            gas: tx.fee(),
            sender: *tx.from(),
            destination: contract_address,
            value: tx.amount(),
            input: Vec::new(),
        };
        let result = self.run_vm(&mut commit, tx, block, &message, &contract_data.init_message);

        match result.status {
            VmStatus::Success => {
                let install = commit
                    .set_runtime_code(&contract_address, result.output)
                    .and_then(|_| commit.set_abi(&contract_address, contract_data.abi));
                if install.is_err() {
                    return TransactionStatus::new(
                        StatusCode::Failed,
                        action,
                        tx.fee(),
                        String::new(),
                    );
                }
                self.settle_success(commit, tx, block, result.gas_left);
                TransactionStatus::new(
                    StatusCode::Success,
                    action,
                    result.gas_left,
                    contract_address.to_base58(),
                )
            }
            VmStatus::Revert => {
                self.burn_fee(tx, block, result.gas_left);
                TransactionStatus::new(StatusCode::Revert, action, result.gas_left, String::new())
            }
            _ => {
                self.burn_fee(tx, block, result.gas_left);
                TransactionStatus::new(StatusCode::Failed, action, result.gas_left, String::new())
            }
        }
    }

    // ── Contract call ────────────────────────────────────────────────────────

    fn execute_contract_call(&self, tx: &Transaction, block: &ImmutableBlock) -> TransactionStatus {
        let action = ActionType::ContractCall;
        let mut commit = self.state.create_commit();
        if commit
            .sub_balance(tx.from(), Balance::from(tx.fee()))
            .is_err()
        {
            return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new());
        }

        if tx.data().is_empty() {
            return TransactionStatus::new(StatusCode::Rejected, action, tx.fee(), String::new());
        }

        if !tx.amount().is_zero() && !commit.try_transfer_money(tx.from(), tx.to(), tx.amount()) {
            return TransactionStatus::new(
                StatusCode::Rejected,
                ActionType::Transfer,
                tx.fee(),
                String::new(),
            );
        }

        let code = match commit.get_runtime_code(tx.to()) {
            Ok(code) => code,
            Err(_) => {
                return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new())
            }
        };

        let message = VmMessage {
            kind: CallKind::Call,
            is_static: false,
            depth: 0,
            gas: tx.fee(),
            sender: *tx.from(),
            destination: *tx.to(),
            value: tx.amount(),
            input: tx.data().to_vec(),
        };
        let result = self.run_vm(&mut commit, tx, block, &message, &code);

        match result.status {
            VmStatus::Success => {
                let rendered = BASE64.encode(&result.output);
                self.settle_success(commit, tx, block, result.gas_left);
                TransactionStatus::new(StatusCode::Success, action, result.gas_left, rendered)
            }
            VmStatus::Revert => {
                self.burn_fee(tx, block, result.gas_left);
                TransactionStatus::new(StatusCode::Revert, action, result.gas_left, String::new())
            }
            _ => {
                self.burn_fee(tx, block, result.gas_left);
                TransactionStatus::new(StatusCode::Failed, action, result.gas_left, String::new())
            }
        }
    }

    // ── Plain transfer ───────────────────────────────────────────────────────

    fn execute_transfer(&self, tx: &Transaction, block: &ImmutableBlock) -> TransactionStatus {
        let action = ActionType::Transfer;
        let mut commit = self.state.create_commit();
        if commit
            .sub_balance(tx.from(), Balance::from(tx.fee()))
            .is_err()
        {
            return TransactionStatus::new(StatusCode::Failed, action, tx.fee(), String::new());
        }

        if !commit.try_transfer_money(tx.from(), tx.to(), tx.amount()) {
            return TransactionStatus::new(StatusCode::Rejected, action, tx.fee(), String::new());
        }

        let _ = commit.add_balance(block.coinbase(), Balance::from(tx.fee()));
        self.state.apply_commit(commit);
        TransactionStatus::new(StatusCode::Success, action, 0, String::new())
    }

    // ── View calls ───────────────────────────────────────────────────────────

    /// Read-only contract query from the public API: a synthetic message of
    /// null identity under the static flag with a fixed small gas budget.
    /// The commit is never applied; a storage write attempt fails the call.
    pub fn call_view_method(
        &self,
        from: &Address,
        contract_address: &Address,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        let account = self.state.get_account(contract_address).map_err(|_| {
            Error::InvalidArgument(format!("no contract at address {contract_address}"))
        })?;
        if !account.is_contract() {
            return Err(Error::InvalidArgument(format!(
                "{contract_address} is not a contract account"
            )));
        }

        let mut commit = self.state.create_commit();
        let message = VmMessage {
            kind: CallKind::Call,
            is_static: true,
            depth: 0,
            gas: VIEW_GAS_LIMIT,
            sender: *from,
            destination: *contract_address,
            value: U256::zero(),
            input: input.to_vec(),
        };
        let mut host = CommitHost::new(self.chain, &mut commit, HostContext::null());
        let result = pyrite_vm::execute(&mut host, &message, &account.runtime_code);

        if result.status != VmStatus::Success {
            return Err(Error::InvalidArgument(format!(
                "view call ended with {:?}",
                result.status
            )));
        }
        Ok(result.output)
    }

    // ── Settlement helpers ───────────────────────────────────────────────────

    fn run_vm(
        &self,
        commit: &mut Commit<'_>,
        tx: &Transaction,
        block: &ImmutableBlock,
        message: &VmMessage,
        code: &[u8],
    ) -> VmResult {
        let context = HostContext {
            origin: *tx.from(),
            block_number: block.depth(),
            block_timestamp: block.timestamp(),
            coinbase: *block.coinbase(),
        };
        let mut host = CommitHost::new(self.chain, commit, context);
        pyrite_vm::execute(&mut host, message, code)
    }

    /// Successful execution: refund unused gas to the sender (who already
    /// paid the full fee inside the commit), pay the used part to the
    /// coinbase, and land the whole overlay.
    fn settle_success(
        &self,
        mut commit: Commit<'_>,
        tx: &Transaction,
        block: &ImmutableBlock,
        gas_left: Fee,
    ) {
        let _ = commit.add_balance(tx.from(), Balance::from(gas_left));
        let _ = commit.add_balance(block.coinbase(), Balance::from(tx.fee() - gas_left));
        self.state.apply_commit(commit);
    }

    /// Failed or reverted execution: the overlay is discarded; only the
    /// consumed part of the fee moves, from the sender to the coinbase, on
    /// the base state.
    fn burn_fee(&self, tx: &Transaction, block: &ImmutableBlock, gas_left: Fee) {
        let used = Balance::from(tx.fee() - gas_left);
        if used.is_zero() {
            return;
        }
        let mut commit = self.state.create_commit();
        if commit.sub_balance(tx.from(), used).is_ok() {
            let _ = commit.add_balance(block.coinbase(), used);
            self.state.apply_commit(commit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pyrite_chain::genesis_block;
    use pyrite_core::{AccountType, BlockBuilder, TransactionsSet};
    use pyrite_crypto::KeyPair;
    use pyrite_storage::{Database, OpenMode};

    // Runtime code: SSTORE(1, 7) then return the 32-byte word 7.
    const RUNTIME_STORE: [u8; 15] = [
        0x60, 0x07, 0x60, 0x01, 0x55, 0x60, 0x07, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    // Runtime code: REVERT with empty data.
    const RUNTIME_REVERT: [u8; 5] = [0x60, 0x00, 0x60, 0x00, 0xfd];
    // Runtime code: return the 32-byte word 42, no state access.
    const RUNTIME_PURE: [u8; 10] = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];

    /// Init code that CODECOPYs its tail into memory and returns it as the
    /// runtime code.
    fn init_code(runtime: &[u8]) -> Vec<u8> {
        let len = runtime.len() as u8;
        let mut code = vec![
            0x60, len, 0x60, 0x0c, 0x60, 0x00, 0x39, 0x60, len, 0x60, 0x00, 0xf3,
        ];
        code.extend_from_slice(runtime);
        code
    }

    struct Fixture {
        chain: Blockchain,
        state: StateManager,
        keypair: KeyPair,
        sender: Address,
        dir: std::path::PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let dir =
                std::env::temp_dir().join(format!("pyrite_exec_{}_{}", name, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            let chain = Blockchain::new(Database::open(&dir, OpenMode::Default).unwrap());
            chain.add_genesis_block(genesis_block()).unwrap();

            let state = StateManager::new();
            state.update_from_genesis(genesis_block());

            let keypair = KeyPair::generate();
            let sender = Address::from_public_key(&keypair.public_key_bytes());
            let mut commit = state.create_commit();
            commit.create_client_account(&sender);
            commit
                .add_balance(&sender, Balance::from(1_000_000u64))
                .unwrap();
            state.apply_commit(commit);

            Self {
                chain,
                state,
                keypair,
                sender,
                dir,
            }
        }

        fn coinbase(&self) -> Address {
            Address::from_bytes([0xCC; 20])
        }

        fn block_with(&self, txs: TransactionsSet) -> pyrite_core::ImmutableBlock {
            BlockBuilder::new()
                .depth(1)
                .nonce(0)
                .prev_block_hash(*genesis_block().hash())
                .timestamp(genesis_block().timestamp() + 60)
                .coinbase(self.coinbase())
                .transactions(txs)
                .build_immutable()
                .unwrap()
        }

        fn signed_tx(&self, to: Address, amount: u64, fee: Fee, data: Vec<u8>) -> Transaction {
            let mut tx = Transaction::new(
                self.sender,
                to,
                Balance::from(amount),
                fee,
                genesis_block().timestamp() + 30,
                data,
            )
            .unwrap();
            tx.sign(&self.keypair);
            tx
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn plain_transfer_moves_amount_and_fee() {
        let fx = Fixture::new("transfer");
        let recipient = Address::from_bytes([0xBB; 20]);
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(recipient, 100, 1, vec![]));
        let block = fx.block_with(txs);

        let executor = Executor::new(&fx.state, &fx.chain);
        let outcomes = executor.apply_block_transactions(&block);

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status.status, StatusCode::Success);
        assert_eq!(outcomes[0].status.action, ActionType::Transfer);
        assert_eq!(outcomes[0].status.fee_left, 0);

        assert_eq!(
            fx.state.get_balance(&fx.sender),
            Balance::from(1_000_000u64 - 101)
        );
        assert_eq!(fx.state.get_balance(&recipient), Balance::from(100u64));
        assert_eq!(
            fx.state.get_balance(&fx.coinbase()),
            Balance::from(EMISSION_VALUE + 1)
        );
    }

    #[test]
    fn overspending_transfer_is_rejected_without_movement() {
        let fx = Fixture::new("reject");
        let recipient = Address::from_bytes([0xBB; 20]);
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(recipient, 2_000_000, 1, vec![]));
        let block = fx.block_with(txs);

        let executor = Executor::new(&fx.state, &fx.chain);
        let outcomes = executor.apply_block_transactions(&block);

        assert_eq!(outcomes[0].status.status, StatusCode::Rejected);
        assert_eq!(outcomes[0].status.fee_left, 1);
        assert_eq!(fx.state.get_balance(&fx.sender), Balance::from(1_000_000u64));
        assert!(!fx.state.has_account(&recipient));
    }

    #[test]
    fn nonce_advances_even_on_rejection() {
        let fx = Fixture::new("nonce");
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::from_bytes([0xBB; 20]), 2_000_000, 1, vec![]));
        let block = fx.block_with(txs);

        Executor::new(&fx.state, &fx.chain).apply_block_transactions(&block);
        let info = fx.state.get_account_info(&fx.sender);
        assert_eq!(info.nonce, 1);
        assert_eq!(info.transactions.len(), 1);
    }

    #[test]
    fn contract_creation_installs_runtime_code() {
        let fx = Fixture::new("create");
        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_STORE),
            abi: r#"{"methods":["poke"]}"#.to_string(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 5, 10_000, data));
        let block = fx.block_with(txs);

        let executor = Executor::new(&fx.state, &fx.chain);
        let outcomes = executor.apply_block_transactions(&block);

        let status = &outcomes[0].status;
        assert_eq!(status.status, StatusCode::Success);
        assert_eq!(status.action, ActionType::ContractCreation);
        assert!(status.fee_left > 0);

        let contract_address = Address::from_base58(&status.message).unwrap();
        let contract = fx.state.get_account(&contract_address).unwrap();
        assert_eq!(contract.account_type, AccountType::Contract);
        assert_eq!(contract.runtime_code, RUNTIME_STORE.to_vec());
        assert!(!contract.code_hash.is_null());
        assert_eq!(contract.balance, Balance::from(5u64));

        // Sender paid the transferred amount plus consumed gas.
        let used = 10_000 - status.fee_left;
        assert_eq!(
            fx.state.get_balance(&fx.sender),
            Balance::from(1_000_000u64 - 5 - used)
        );
        assert_eq!(
            fx.state.get_balance(&fx.coinbase()),
            Balance::from(EMISSION_VALUE + used)
        );
    }

    #[test]
    fn contract_call_executes_and_persists_storage() {
        let fx = Fixture::new("call");
        let executor = Executor::new(&fx.state, &fx.chain);

        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_STORE),
            abi: String::new(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 0, 10_000, data));
        txs.add(fx.signed_tx(Address::from_bytes([0x77; 20]), 1, 1, vec![])); // keep amounts non-zero
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        let contract_address = Address::from_base58(&outcomes[0].status.message).unwrap();

        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(contract_address, 3, 10_000, vec![0x00]));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);

        let status = &outcomes[0].status;
        assert_eq!(status.status, StatusCode::Success);
        assert_eq!(status.action, ActionType::ContractCall);
        let output = BASE64.decode(&status.message).unwrap();
        assert_eq!(U256::from_big_endian(&output), U256::from(7));

        let contract = fx.state.get_account(&contract_address).unwrap();
        let slot = {
            let mut key = [0u8; 32];
            key[31] = 1;
            Sha256::from_bytes(key)
        };
        let mut expected = [0u8; 32];
        expected[31] = 7;
        assert_eq!(contract.get_storage_value(&slot).unwrap(), expected);
        assert_eq!(contract.balance, Balance::from(3u64));
    }

    #[test]
    fn reverting_call_burns_used_gas_only() {
        let fx = Fixture::new("revert");
        let executor = Executor::new(&fx.state, &fx.chain);

        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_REVERT),
            abi: String::new(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 1, 10_000, data));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        let contract_address = Address::from_base58(&outcomes[0].status.message).unwrap();

        let sender_before = fx.state.get_balance(&fx.sender);
        let coinbase_before = fx.state.get_balance(&fx.coinbase());

        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(contract_address, 0, 5_000, vec![0x01]));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);

        let status = &outcomes[0].status;
        assert_eq!(status.status, StatusCode::Revert);
        assert_eq!(status.action, ActionType::ContractCall);
        assert!(status.fee_left > 0 && status.fee_left < 5_000);

        let used = 5_000 - status.fee_left;
        assert_eq!(
            fx.state.get_balance(&fx.sender),
            sender_before - Balance::from(used)
        );
        // Coinbase collects the emission for the second block plus the burn.
        assert_eq!(
            fx.state.get_balance(&fx.coinbase()),
            coinbase_before + Balance::from(EMISSION_VALUE + used)
        );
    }

    #[test]
    fn empty_call_data_is_rejected() {
        let fx = Fixture::new("emptydata");
        let executor = Executor::new(&fx.state, &fx.chain);

        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_PURE),
            abi: String::new(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 1, 10_000, data));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        let contract_address = Address::from_base58(&outcomes[0].status.message).unwrap();

        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(contract_address, 1, 100, vec![]));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        assert_eq!(outcomes[0].status.status, StatusCode::Rejected);
    }

    #[test]
    fn view_call_returns_output_without_mutating() {
        let fx = Fixture::new("view");
        let executor = Executor::new(&fx.state, &fx.chain);

        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_PURE),
            abi: String::new(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 1, 10_000, data));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        let contract_address = Address::from_base58(&outcomes[0].status.message).unwrap();

        let output = executor
            .call_view_method(&fx.sender, &contract_address, &[0x00])
            .unwrap();
        assert_eq!(U256::from_big_endian(&output), U256::from(42));
    }

    #[test]
    fn view_call_rejects_storage_writes() {
        let fx = Fixture::new("viewwrite");
        let executor = Executor::new(&fx.state, &fx.chain);

        let data = codec::to_bytes(&ContractData {
            init_message: init_code(&RUNTIME_STORE),
            abi: String::new(),
        });
        let mut txs = TransactionsSet::new();
        txs.add(fx.signed_tx(Address::null(), 1, 10_000, data));
        let block = fx.block_with(txs);
        let outcomes = executor.apply_block_transactions(&block);
        let contract_address = Address::from_base58(&outcomes[0].status.message).unwrap();

        assert!(executor
            .call_view_method(&fx.sender, &contract_address, &[0x00])
            .is_err());
    }

    #[test]
    fn view_call_on_client_account_is_invalid() {
        let fx = Fixture::new("viewclient");
        let executor = Executor::new(&fx.state, &fx.chain);
        assert!(executor
            .call_view_method(&fx.sender, &fx.sender, &[0x00])
            .is_err());
    }
}
