//! Real-time collaborative text editing server: an RGA CRDT engine behind
//! a WebSocket session protocol, with pluggable persistence.
//!
//! - [`rga`]: the CRDT engine: element identity, operations, integration.
//! - [`persistence`]: the append-only op log contract and an in-memory
//!   reference implementation.
//! - [`document`]: one live RGA per document, serialized integration.
//! - [`session`]: per-document rooms, the outbound fan-out queue.
//! - [`protocol`]: the wire message taxonomy.
//! - [`server`]: axum routes and the connection handler state machine.
//! - [`config`]: process configuration.
//! - [`error`]: typed errors at each module seam.

pub mod config;
pub mod document;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod rga;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use document::DocumentService;
pub use rga::{ElementId, Op, Rga};
pub use server::{ServerContext, create_router};
pub use session::SessionManager;
