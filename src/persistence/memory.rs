//! Reference in-memory `Persistence` implementation.
//!
//! Keeps each document's op log in a `crossbeam_skiplist::SkipMap` keyed by
//! `server_seq`, lock-free and always kept in ascending key order, so
//! `get_ops_since` is a cheap ordered range scan with no locking of its own.
//! A `parking_lot::RwLock` guards only the outer `doc_id -> DocStore` map,
//! contended solely on first touch per document.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;

use super::{OpRecord, Persistence};
use crate::error::PersistenceError;

struct DocStore {
    ops: SkipMap<u64, OpRecord>,
    last_seq: AtomicU64,
    snapshot: RwLock<Option<(String, u64)>>,
}

impl DocStore {
    fn new() -> Self {
        DocStore {
            ops: SkipMap::new(),
            last_seq: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }
}

/// The reference `Persistence` backend. Never fails; every method returns
/// `Ok`, and the `Result` in the trait exists for durable backends.
#[derive(Default)]
pub struct InMemoryPersistence {
    docs: RwLock<HashMap<String, Arc<DocStore>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_doc(&self, doc_id: &str) -> Arc<DocStore> {
        if let Some(store) = self.docs.read().get(doc_id) {
            return store.clone();
        }
        self.docs
            .write()
            .entry(doc_id.to_string())
            .or_insert_with(|| Arc::new(DocStore::new()))
            .clone()
    }
}

impl Persistence for InMemoryPersistence {
    fn append_op(&self, record: OpRecord) -> Result<(), PersistenceError> {
        let doc = self.get_or_create_doc(&record.doc_id);
        let server_seq = record.server_seq;
        doc.ops.insert(server_seq, record);
        doc.last_seq.fetch_max(server_seq, Ordering::SeqCst);
        Ok(())
    }

    fn get_ops_since(
        &self,
        doc_id: &str,
        since_server_seq: u64,
    ) -> Result<Option<Vec<OpRecord>>, PersistenceError> {
        let Some(doc) = self.docs.read().get(doc_id).cloned() else {
            return Ok(Some(Vec::new()));
        };
        let records = doc
            .ops
            .range((since_server_seq + 1)..)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Some(records))
    }

    fn get_latest_server_seq(&self, doc_id: &str) -> Result<u64, PersistenceError> {
        let Some(doc) = self.docs.read().get(doc_id).cloned() else {
            return Ok(0);
        };
        Ok(doc.last_seq.load(Ordering::SeqCst))
    }

    fn get_snapshot_text(&self, doc_id: &str) -> Result<Option<(String, u64)>, PersistenceError> {
        let Some(doc) = self.docs.read().get(doc_id).cloned() else {
            return Ok(None);
        };
        Ok(doc.snapshot.read().clone())
    }

    fn store_snapshot_text(
        &self,
        doc_id: &str,
        server_seq: u64,
        full_text: String,
    ) -> Result<(), PersistenceError> {
        let doc = self.get_or_create_doc(doc_id);
        *doc.snapshot.write() = Some((full_text, server_seq));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rga::{ElementId, InsertOp, Op, root_id};

    fn sample_record(doc_id: &str, seq: u64) -> OpRecord {
        OpRecord {
            doc_id: doc_id.to_string(),
            server_seq: seq,
            origin_client_id: "c1".to_string(),
            client_msg_id: format!("m{seq}"),
            op: Op::Insert(InsertOp {
                parent_id: root_id(),
                id: ElementId::new(seq, "c1"),
                value: 'x',
            }),
        }
    }

    #[test]
    fn unknown_doc_reports_empty_ops_and_zero_seq() {
        let store = InMemoryPersistence::new();
        assert_eq!(store.get_ops_since("nope", 0).unwrap(), Some(Vec::new()));
        assert_eq!(store.get_latest_server_seq("nope").unwrap(), 0);
        assert_eq!(store.get_snapshot_text("nope").unwrap(), None);
    }

    #[test]
    fn ops_since_is_ascending_and_exclusive() {
        let store = InMemoryPersistence::new();
        for seq in 1..=5 {
            store.append_op(sample_record("d1", seq)).unwrap();
        }

        let since_2 = store.get_ops_since("d1", 2).unwrap().unwrap();
        let seqs: Vec<u64> = since_2.iter().map(|r| r.server_seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);

        assert_eq!(store.get_latest_server_seq("d1").unwrap(), 5);
    }

    #[test]
    fn snapshot_is_independent_of_log_until_written() {
        let store = InMemoryPersistence::new();
        store.append_op(sample_record("d1", 1)).unwrap();
        assert_eq!(store.get_snapshot_text("d1").unwrap(), None);

        store.store_snapshot_text("d1", 1, "x".to_string()).unwrap();
        assert_eq!(
            store.get_snapshot_text("d1").unwrap(),
            Some(("x".to_string(), 1))
        );
    }
}
