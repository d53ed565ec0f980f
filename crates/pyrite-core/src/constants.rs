//! Protocol constants. Changing any consensus-facing value here forks the
//! chain.

/// Blocks per difficulty window. The target is recalculated whenever an
/// accepted block's depth is a multiple of this rate.
pub const DIFFICULTY_RECALCULATION_RATE: u64 = 100;

/// Desired block production rate used by the retarget formula.
pub const TARGET_BLOCKS_PER_MINUTE: u64 = 3;

/// Fixed emission credited to the coinbase of every accepted block, on top
/// of collected fees.
pub const EMISSION_VALUE: u64 = 1000;

/// Gas budget for read-only contract queries from the public API.
pub const VIEW_GAS_LIMIT: u64 = 5000;

/// A block timestamped further than this ahead of local wall-clock time is
/// rejected as FutureTimestamp.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 2 * 60 * 60;

/// Genesis block timestamp (Unix seconds, UTC).
pub const GENESIS_TIMESTAMP: u64 = 1_583_789_617;

/// Base58 address credited with the protocol reserve in the genesis block.
pub const GENESIS_RESERVE_ADDRESS: &str = "28dpzpURpyqqLoWrEhnHrajndeCq";

/// Reserve balance emitted at genesis.
pub const GENESIS_RESERVE_BALANCE: u64 = 0xFFFF_FFFF;
