use once_cell::sync::Lazy;

use pyrite_core::constants::{
    GENESIS_RESERVE_ADDRESS, GENESIS_RESERVE_BALANCE, GENESIS_TIMESTAMP,
};
use pyrite_core::{
    Address, Balance, BlockBuilder, ImmutableBlock, Sha256, Transaction, TransactionsSet,
};

/// The fixed founding block: depth 0, null parent, null coinbase, and a
/// single unsigned emission transaction crediting the protocol reserve.
/// Every node derives the identical block, so its hash is a network
/// constant.
pub fn genesis_block() -> &'static ImmutableBlock {
    static GENESIS: Lazy<ImmutableBlock> = Lazy::new(|| {
        let reserve = Address::from_base58(GENESIS_RESERVE_ADDRESS)
            .expect("reserve address constant is valid base58");
        let emission = Transaction::new(
            Address::null(),
            reserve,
            Balance::from(GENESIS_RESERVE_BALANCE),
            0,
            GENESIS_TIMESTAMP,
            Vec::new(),
        )
        .expect("genesis emission carries a non-zero amount");

        let mut transactions = TransactionsSet::new();
        transactions.add(emission);

        BlockBuilder::new()
            .depth(0)
            .nonce(0)
            .prev_block_hash(Sha256::null())
            .timestamp(GENESIS_TIMESTAMP)
            .coinbase(Address::null())
            .transactions(transactions)
            .build_immutable()
            .expect("all genesis fields are set")
    });
    &GENESIS
}
