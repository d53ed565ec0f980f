use primitive_types::U256;

use pyrite_core::Address;

/// How a message enters the VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Run a contract's runtime code.
    Call,
    /// Run init code; the successful output becomes the runtime code.
    Create,
}

/// One VM invocation: the message an outer transaction (or a nested CALL)
/// delivers to a contract.
#[derive(Clone, Debug)]
pub struct VmMessage {
    pub kind: CallKind,
    /// Read-only execution: storage writes, logs, selfdestruct, and
    /// value-bearing calls all fault.
    pub is_static: bool,
    pub depth: u32,
    pub gas: u64,
    pub sender: Address,
    pub destination: Address,
    pub value: U256,
    pub input: Vec<u8>,
}

/// Why an execution stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmStatus {
    Success,
    /// Explicit REVERT: state changes are discarded, remaining gas returned.
    Revert,
    /// Generic fault. Consumes all gas.
    Failure,
    OutOfGas,
    InvalidInstruction,
    BadJumpDestination,
    StackUnderflow,
    StackOverflow,
    /// A mutating operation under the static flag.
    StaticViolation,
}

impl VmStatus {
    pub fn is_success(self) -> bool {
        self == VmStatus::Success
    }
}

/// Outcome of one VM invocation.
#[derive(Clone, Debug)]
pub struct VmResult {
    pub status: VmStatus,
    pub gas_left: u64,
    pub output: Vec<u8>,
}

impl VmResult {
    pub fn new(status: VmStatus, gas_left: u64, output: Vec<u8>) -> Self {
        Self {
            status,
            gas_left,
            output,
        }
    }

    /// A fault that consumes the entire gas budget.
    pub fn fault(status: VmStatus) -> Self {
        Self::new(status, 0, Vec::new())
    }
}

/// Effect classification of an SSTORE, as reported back to the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageStatus {
    Unchanged,
    Added,
    Deleted,
    Modified,
}

/// Transaction-level environment visible to contract code.
#[derive(Clone, Debug)]
pub struct TxContext {
    pub origin: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub coinbase: Address,
    pub gas_price: U256,
    pub block_difficulty: U256,
    pub chain_id: U256,
}

/// The services a contract execution environment must provide. One host
/// instance backs one outer transaction; it borrows the active commit and
/// the associated block for exactly that long.
///
/// Every implementation must be exception-neutral: internal failures are
/// swallowed and a safe default returned, never propagated into the
/// interpreter.
pub trait Host {
    fn account_exists(&self, address: &Address) -> bool;

    /// Contract storage read; 32 zero bytes when the slot was never written.
    fn get_storage(&self, address: &Address, key: &[u8; 32]) -> [u8; 32];

    fn set_storage(&mut self, address: &Address, key: &[u8; 32], value: &[u8; 32])
        -> StorageStatus;

    /// Account balance, zero for unknown addresses.
    fn get_balance(&self, address: &Address) -> U256;

    fn get_code_size(&self, address: &Address) -> usize;

    fn get_code_hash(&self, address: &Address) -> [u8; 32];

    /// Copy runtime code starting at `offset` into `buffer`; returns the
    /// number of bytes copied.
    fn copy_code(&self, address: &Address, offset: usize, buffer: &mut [u8]) -> usize;

    /// Transfer the account's balance to `beneficiary` and mark it deleted.
    fn selfdestruct(&mut self, address: &Address, beneficiary: &Address);

    /// Nested invocation: recurses into the VM when the destination is a
    /// contract, otherwise performs a plain transfer.
    fn call(&mut self, message: VmMessage) -> VmResult;

    fn get_tx_context(&self) -> TxContext;

    /// Hash of the block at `number`, zero when unknown.
    fn get_block_hash(&self, number: u64) -> [u8; 32];

    /// Contract log record. Events are not persisted in this version.
    fn emit_log(&mut self, address: &Address, data: &[u8], topics: &[[u8; 32]]);
}
