//! The public JSON API: a bespoke call/subscribe envelope served over
//! WebSocket, with the `call` subset mirrored over plain HTTP POST for
//! one-shot clients.

mod server;
pub mod types;

pub use server::{serve, NodeFacade};
pub use types::{NodeInfoView, Request, RequestKind, Response, API_VERSION};
