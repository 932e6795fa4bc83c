//! Document service: one live RGA per active document, a per-document lock
//! serializing `server_seq` assignment + CRDT integration + log append +
//! snapshot update, and lazy construction/rebuild from the op log.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::error::DocumentError;
use crate::persistence::{OpRecord, Persistence};
use crate::rga::{Op, Rga};

struct DocInner {
    rga: Rga,
    server_seq: u64,
}

struct LiveDocState {
    inner: AsyncMutex<DocInner>,
}

/// Holds one live [`Rga`] per active document behind a global registry
/// lock used only to insert/look up live states; each document's own
/// mutations are serialized by its own lock, so different documents
/// progress in parallel.
pub struct DocumentService {
    persistence: Arc<dyn Persistence>,
    docs: AsyncMutex<HashMap<String, Arc<LiveDocState>>>,
}

impl DocumentService {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        DocumentService {
            persistence,
            docs: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Lock-free read delegated to persistence. Callers accept an
    /// eventual-consistency window relative to in-flight writes.
    pub fn get_server_seq(&self, doc_id: &str) -> Result<u64, DocumentError> {
        Ok(self.persistence.get_latest_server_seq(doc_id)?)
    }

    /// Lock-free read delegated to persistence.
    pub fn get_snapshot(&self, doc_id: &str) -> Result<(String, u64), DocumentError> {
        Ok(self
            .persistence
            .get_snapshot_text(doc_id)?
            .unwrap_or_else(|| (String::new(), 0)))
    }

    /// Integrates one client operation into `doc_id`, assigning it the next
    /// `server_seq`. Atomicity: the in-memory sequence is only committed
    /// after `append_op` succeeds, so a persistence failure leaves the
    /// document's assigned sequence unchanged for the next attempt.
    ///
    /// `on_committed` runs with the per-doc lock still held, after the op
    /// is durably appended and the sequence is committed, and before this
    /// call returns. The caller uses it to broadcast the `op_echo` from
    /// inside the same critical section that assigned `server_seq`, so two
    /// concurrent writers on one document can never have their broadcasts
    /// observed out of `server_seq` order (`spec.md` §4.5/§8 property 7).
    pub async fn apply_op(
        &self,
        doc_id: &str,
        origin_client_id: &str,
        client_msg_id: &str,
        op: Op,
        on_committed: impl FnOnce(u64),
    ) -> Result<u64, DocumentError> {
        let state = self.get_or_create(doc_id).await?;
        let mut inner = state.inner.lock().await;

        let tentative_seq = inner.server_seq + 1;
        inner.rga.integrate(op.clone());
        let full_text = inner.rga.materialize();

        let record = OpRecord {
            doc_id: doc_id.to_string(),
            server_seq: tentative_seq,
            origin_client_id: origin_client_id.to_string(),
            client_msg_id: client_msg_id.to_string(),
            op,
        };
        self.persistence.append_op(record)?;
        inner.server_seq = tentative_seq;

        info!(doc_id, origin_client_id, server_seq = tentative_seq, "crdt integrated");

        if let Err(err) = self
            .persistence
            .store_snapshot_text(doc_id, tentative_seq, full_text)
        {
            warn!(doc_id, server_seq = tentative_seq, %err, "snapshot store failed, op log remains authoritative");
        }

        on_committed(tentative_seq);

        Ok(tentative_seq)
    }

    async fn get_or_create(&self, doc_id: &str) -> Result<Arc<LiveDocState>, DocumentError> {
        // The global registry lock is held across the whole lookup-or-build
        // sequence (acquiring it is itself a suspension point); it is never
        // held while a per-document lock is also held, so lock order is
        // strictly global -> doc, never reversed.
        let mut docs = self.docs.lock().await;
        if let Some(state) = docs.get(doc_id) {
            return Ok(state.clone());
        }

        let mut rga = Rga::new();
        let server_seq = self.persistence.get_latest_server_seq(doc_id)?;
        let ops = self
            .persistence
            .get_ops_since(doc_id, 0)?
            .unwrap_or_default();

        if !ops.is_empty() {
            info!(doc_id, server_seq, "crdt rebuild from oplog start");
        }
        for rec in ops {
            rga.integrate(rec.op);
        }
        let full_text = rga.materialize();
        self.persistence
            .store_snapshot_text(doc_id, server_seq, full_text)?;
        if server_seq > 0 {
            info!(doc_id, server_seq, "crdt rebuild from oplog done");
        }

        let state = Arc::new(LiveDocState {
            inner: AsyncMutex::new(DocInner { rga, server_seq }),
        });
        docs.insert(doc_id.to_string(), state.clone());
        Ok(state)
    }
}
