pub mod account;
pub mod block;
pub mod codec;
pub mod constants;
pub mod error;
pub mod event;
pub mod transaction;
pub mod txset;
pub mod types;

pub use account::{AccountInfo, AccountState, AccountType, StorageValue, STORAGE_VALUE_LENGTH};
pub use block::{BlockBuilder, ImmutableBlock, MutableBlock};
pub use error::{Error, Result};
pub use event::{Event, SubscriptionId};
pub use transaction::{ActionType, ContractData, StatusCode, Transaction, TransactionStatus};
pub use txset::{aggregate_cost, TransactionsSet};
pub use types::{Address, Balance, BlockDepth, Fee, Nonce, Sha256, Signature, Timestamp};
