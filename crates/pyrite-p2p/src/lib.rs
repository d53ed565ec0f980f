//! Peer-to-peer gossip: a length-prefixed wire protocol with one-byte
//! message tags, a Kademlia-style routing table, per-peer behavioral
//! ratings, and a tokio TCP service tying them together.

pub mod message;
pub mod network;
pub mod rating;
pub mod table;

pub use message::{Message, PeerInfo, RefusalReason};
pub use network::{
    InboundEvent, Network, NetworkHandle, OutboundCommand, P2pConfig, TopHashFn,
};
pub use rating::Rating;
pub use table::{RoutingTable, MAX_BUCKET_SIZE, PING_FREQUENCY};
