//! Persistence interface: the contract an append-only per-document op log
//! plus an optional latest-snapshot cache must satisfy.
//!
//! Synchronous from the caller's point of view; concrete backends may
//! block internally. The document service serializes per-document calls
//! with its own lock, so implementations need only be safe under
//! concurrent calls across *different* documents.

pub mod memory;

pub use memory::InMemoryPersistence;

use crate::error::PersistenceError;
use crate::rga::Op;

/// One integrated operation, assigned its server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRecord {
    pub doc_id: String,
    pub server_seq: u64,
    pub origin_client_id: String,
    pub client_msg_id: String,
    pub op: Op,
}

pub trait Persistence: Send + Sync {
    /// Appends a record. Callers guarantee `server_seq` is strictly
    /// increasing per `doc_id`.
    fn append_op(&self, record: OpRecord) -> Result<(), PersistenceError>;

    /// Ops strictly after `since_server_seq`, ascending. `Ok(None)` means
    /// "cannot answer" (e.g. truncated history) and forces a resync;
    /// `Ok(Some(vec![]))` means "no ops since". Unknown docs return
    /// `Ok(Some(vec![]))`.
    fn get_ops_since(
        &self,
        doc_id: &str,
        since_server_seq: u64,
    ) -> Result<Option<Vec<OpRecord>>, PersistenceError>;

    /// Zero for unknown docs.
    fn get_latest_server_seq(&self, doc_id: &str) -> Result<u64, PersistenceError>;

    fn get_snapshot_text(&self, doc_id: &str) -> Result<Option<(String, u64)>, PersistenceError>;

    /// `server_seq` is monotonically non-decreasing per doc.
    fn store_snapshot_text(
        &self,
        doc_id: &str,
        server_seq: u64,
        full_text: String,
    ) -> Result<(), PersistenceError>;
}
