use std::sync::Arc;

use tokio::sync::broadcast;

use pyrite_core::{AccountInfo, Address, ImmutableBlock, Result, Sha256, Transaction, TransactionStatus};
use pyrite_rpc::{NodeFacade, NodeInfoView};

use crate::core::Core;

/// The API server's view of the node. A thin adapter so the RPC crate
/// depends only on the capability set, not on `Core` itself.
pub struct CoreFacade {
    core: Arc<Core>,
}

impl CoreFacade {
    pub fn new(core: Arc<Core>) -> Self {
        Self { core }
    }
}

impl NodeFacade for CoreFacade {
    fn last_block_info(&self) -> NodeInfoView {
        let top = self.core.top_block();
        NodeInfoView {
            top_block_hash: *top.hash(),
            top_block_number: top.depth(),
        }
    }

    fn account_info(&self, address: &Address) -> AccountInfo {
        self.core.get_account_info(address)
    }

    fn find_block_by_hash(&self, hash: &Sha256) -> Option<ImmutableBlock> {
        self.core.find_block(hash)
    }

    fn find_block_by_number(&self, number: u64) -> Option<ImmutableBlock> {
        self.core.find_block_by_depth(number)
    }

    fn find_transaction(&self, hash: &Sha256) -> Option<Transaction> {
        self.core.find_transaction(hash)
    }

    fn transaction_status(&self, hash: &Sha256) -> Option<TransactionStatus> {
        self.core.get_transaction_status(hash)
    }

    fn push_transaction(&self, tx: Transaction) -> bool {
        self.core.add_pending_transaction(tx)
    }

    fn call_view(&self, from: &Address, contract: &Address, data: &[u8]) -> Result<Vec<u8>> {
        self.core.call_view_method(from, contract, data)
    }

    fn minimal_fee(&self) -> u64 {
        // No fee market: the node relays any affordable transaction.
        0
    }

    fn subscribe_blocks(&self) -> broadcast::Receiver<NodeInfoView> {
        self.core.blocks_stream()
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Address> {
        self.core.accounts_stream()
    }

    fn subscribe_tx_statuses(&self) -> broadcast::Receiver<(Sha256, TransactionStatus)> {
        self.core.statuses_stream()
    }
}
