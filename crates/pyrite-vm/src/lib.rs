//! A stack-machine interpreter for the EVM subset the node executes, driven
//! entirely through the [`Host`] trait: storage, balances, code access,
//! nested calls, and environment queries all route through the host so that
//! one execution stays confined to one commit overlay.

mod host;
mod interpreter;
pub mod opcode;

pub use host::{CallKind, Host, StorageStatus, TxContext, VmMessage, VmResult, VmStatus};
pub use interpreter::execute;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use primitive_types::U256;
    use pyrite_core::Address;

    use super::*;

    // ── Mock host ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockHost {
        storage: HashMap<(Address, [u8; 32]), [u8; 32]>,
        balances: HashMap<Address, U256>,
        logs: Vec<Vec<u8>>,
        destroyed: Vec<(Address, Address)>,
        call_answer: Option<VmResult>,
    }

    impl Host for MockHost {
        fn account_exists(&self, address: &Address) -> bool {
            self.balances.contains_key(address)
        }

        fn get_storage(&self, address: &Address, key: &[u8; 32]) -> [u8; 32] {
            self.storage.get(&(*address, *key)).copied().unwrap_or([0u8; 32])
        }

        fn set_storage(
            &mut self,
            address: &Address,
            key: &[u8; 32],
            value: &[u8; 32],
        ) -> StorageStatus {
            self.storage.insert((*address, *key), *value);
            StorageStatus::Modified
        }

        fn get_balance(&self, address: &Address) -> U256 {
            self.balances.get(address).copied().unwrap_or_default()
        }

        fn get_code_size(&self, _address: &Address) -> usize {
            0
        }

        fn get_code_hash(&self, _address: &Address) -> [u8; 32] {
            [0u8; 32]
        }

        fn copy_code(&self, _address: &Address, _offset: usize, _buffer: &mut [u8]) -> usize {
            0
        }

        fn selfdestruct(&mut self, address: &Address, beneficiary: &Address) {
            self.destroyed.push((*address, *beneficiary));
        }

        fn call(&mut self, _message: VmMessage) -> VmResult {
            self.call_answer
                .clone()
                .unwrap_or_else(|| VmResult::new(VmStatus::Success, 0, Vec::new()))
        }

        fn get_tx_context(&self) -> TxContext {
            TxContext {
                origin: Address::from_bytes([0xAA; 20]),
                block_number: 7,
                block_timestamp: 1_583_790_000,
                coinbase: Address::from_bytes([0xCC; 20]),
                gas_price: U256::zero(),
                block_difficulty: U256::from(0x28_0000u64),
                chain_id: U256::zero(),
            }
        }

        fn get_block_hash(&self, _number: u64) -> [u8; 32] {
            [0x11; 32]
        }

        fn emit_log(&mut self, _address: &Address, data: &[u8], _topics: &[[u8; 32]]) {
            self.logs.push(data.to_vec());
        }
    }

    fn message(gas: u64) -> VmMessage {
        VmMessage {
            kind: CallKind::Call,
            is_static: false,
            depth: 0,
            gas,
            sender: Address::from_bytes([1; 20]),
            destination: Address::from_bytes([2; 20]),
            value: U256::zero(),
            input: Vec::new(),
        }
    }

    fn run(code: &[u8]) -> VmResult {
        let mut host = MockHost::default();
        execute(&mut host, &message(100_000), code)
    }

    // ── Programs ─────────────────────────────────────────────────────────────

    #[test]
    fn add_and_return() {
        // PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            0x60, 0x02, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(5));
        assert!(result.gas_left > 0);
    }

    #[test]
    fn revert_returns_data_and_gas() {
        // PUSH1 0xEE, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let code = [0x60, 0xEE, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xfd];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Revert);
        assert_eq!(result.output, vec![0xEE]);
        assert!(result.gas_left > 0);
    }

    #[test]
    fn out_of_gas_consumes_everything() {
        let code = [0x60, 0x02, 0x60, 0x03, 0x01, 0x00];
        let mut host = MockHost::default();
        let result = execute(&mut host, &message(4), &code);
        assert_eq!(result.status, VmStatus::OutOfGas);
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn storage_round_trip_through_host() {
        // PUSH1 0x2A, PUSH1 1, SSTORE, PUSH1 1, SLOAD,
        // PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            0x60, 0x2A, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60,
            0x00, 0xf3,
        ];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(0x2A));
    }

    #[test]
    fn sstore_faults_under_static_flag() {
        let code = [0x60, 0x2A, 0x60, 0x01, 0x55];
        let mut host = MockHost::default();
        let mut msg = message(100_000);
        msg.is_static = true;
        let result = execute(&mut host, &msg, &code);
        assert_eq!(result.status, VmStatus::StaticViolation);
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn log_faults_under_static_flag() {
        // PUSH1 0, PUSH1 0, LOG0
        let code = [0x60, 0x00, 0x60, 0x00, 0xa0];
        let mut host = MockHost::default();
        let mut msg = message(100_000);
        msg.is_static = true;
        let result = execute(&mut host, &msg, &code);
        assert_eq!(result.status, VmStatus::StaticViolation);
    }

    #[test]
    fn jump_to_non_jumpdest_faults() {
        // PUSH1 3, JUMP, STOP (offset 3 is STOP, not JUMPDEST)
        let code = [0x60, 0x03, 0x56, 0x00];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::BadJumpDestination);
    }

    #[test]
    fn conditional_jump_taken() {
        // 0: PUSH1 1, 2: PUSH1 6, 4: JUMPI, 5: INVALID, 6: JUMPDEST, 7: STOP
        let code = [0x60, 0x01, 0x60, 0x06, 0x57, 0xfe, 0x5b, 0x00];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Success);
    }

    #[test]
    fn keccak_matches_reference() {
        // PUSH1 0, PUSH1 0, KECCAK256 over empty memory,
        // PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x00, 0x60, 0x00, 0x20, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(result.output, pyrite_crypto::keccak256(&[]).to_vec());
    }

    #[test]
    fn calldata_is_visible() {
        // CALLDATALOAD at 0, write to memory, return.
        let code = [0x60, 0x00, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let mut host = MockHost::default();
        let mut msg = message(100_000);
        msg.input = word_bytes(U256::from(0xBEEFu64)).to_vec();
        let result = execute(&mut host, &msg, &code);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(0xBEEFu64));
    }

    #[test]
    fn selfdestruct_reaches_host() {
        // PUSH20 beneficiary, SELFDESTRUCT
        let mut code = vec![0x73];
        code.extend_from_slice(&[0x44; 20]);
        code.push(0xff);
        let mut host = MockHost::default();
        let msg = message(100_000);
        let result = execute(&mut host, &msg, &code);
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(
            host.destroyed,
            vec![(msg.destination, Address::from_bytes([0x44; 20]))]
        );
    }

    #[test]
    fn nested_call_pushes_success_and_return_data() {
        // Push retLen, retOffset, argsLen, argsOffset, value, addr, gas
        // (gas ends on top), CALL, then return the success word from memory.
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x64,
            0xf1, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];
        let mut host = MockHost::default();
        host.call_answer = Some(VmResult::new(VmStatus::Success, 10, b"ok".to_vec()));
        let result = execute(&mut host, &message(100_000), &code);
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(U256::from_big_endian(&result.output), U256::one());
    }

    #[test]
    fn contract_initiated_create_is_rejected() {
        // PUSH1 0, PUSH1 0, PUSH1 0, CREATE
        let code = [0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xf0];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Failure);
    }

    #[test]
    fn invalid_opcode_faults() {
        let code = [0xfe];
        let result = run(&code);
        assert_eq!(result.status, VmStatus::InvalidInstruction);
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn running_off_code_end_is_implicit_stop() {
        let code = [0x60, 0x01]; // PUSH1 1 then end
        let result = run(&code);
        assert_eq!(result.status, VmStatus::Success);
    }

    fn word_bytes(value: U256) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        bytes
    }

    #[test]
    fn call_with_empty_answer_still_succeeds() {
        let code = [
            0x60, 0x00, // retLen
            0x60, 0x00, // retOffset
            0x60, 0x00, // argsLen
            0x60, 0x00, // argsOffset
            0x60, 0x00, // value
            0x60, 0x00, // addr
            0x60, 0x32, // gas
            0xf1, 0x00,
        ];
        let mut host = MockHost::default();
        let result = execute(&mut host, &message(100_000), &code);
        assert_eq!(result.status, VmStatus::Success);
    }
}
