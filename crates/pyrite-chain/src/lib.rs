//! The replicated chain of blocks: in-memory index, validation pipeline,
//! and content-addressed persistence.

mod blockchain;
mod genesis;

pub use blockchain::{AdditionResult, Blockchain};
pub use genesis::genesis_block;
