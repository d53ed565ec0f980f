//! The full-node assembly: `Core` orchestration, configuration, the key
//! vault, and the API facade. The binary in `main.rs` wires these to the
//! gossip network and the public API server.

pub mod config;
pub mod core;
pub mod facade;
pub mod vault;

pub use config::Config;
pub use core::Core;
pub use facade::CoreFacade;
pub use vault::KeyVault;
