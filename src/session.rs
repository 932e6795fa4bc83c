//! Session manager: groups live connections into per-document rooms and
//! fans out messages to them.
//!
//! The room map is guarded by a plain sync lock: every operation here is
//! map mutation with no suspension point, so holding it across an `.await`
//! never comes up; it is independent of the document service's locks and
//! never held across I/O (broadcast snapshots the room, then sends outside
//! the lock).

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::error::CloseCode;
use crate::protocol::ServerMessage;

/// Outbound queue capacity per `spec.md` §3/§4.6.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One live duplex connection. Identity is by `id`, not by channel value,
/// so it can live in a `HashSet` and be looked up/removed cheaply.
///
/// Carries both the outbound message queue and a side channel the writer
/// task watches for a requested close: a plain message queue has no way to
/// express "stop and send a close frame", so closing is signaled
/// separately via `close_notify`/`pending_close` rather than through
/// `outbound`.
pub struct ConnectionHandle {
    id: u64,
    pub client_id: String,
    outbound: mpsc::Sender<ServerMessage>,
    closed: AtomicBool,
    close_notify: Notify,
    pending_close: Mutex<Option<(u16, String)>>,
}

impl ConnectionHandle {
    pub fn new(client_id: String) -> (Arc<Self>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = Arc::new(ConnectionHandle {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            client_id,
            outbound: tx,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            pending_close: Mutex::new(None),
        });
        (handle, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Non-blocking enqueue. Returns `false` (and closes the connection
    /// with the backpressure code) if the outbound queue is full.
    pub fn try_send(&self, message: ServerMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(_) => {
                self.request_close(CloseCode::Backpressure.code(), "outbound queue overflow");
                false
            }
        }
    }

    /// Marks the connection closed and wakes the writer task to send a
    /// close frame with `code`/`reason`, abandoning anything still queued.
    pub fn request_close(&self, code: u16, reason: impl Into<String>) {
        self.mark_closed();
        *self.pending_close.lock() = Some((code, reason.into()));
        self.close_notify.notify_one();
    }

    pub async fn closed_notified(&self) {
        self.close_notify.notified().await;
    }

    pub fn take_pending_close(&self) -> Option<(u16, String)> {
        self.pending_close.lock().take()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ConnectionHandle {}
impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Default)]
struct Rooms {
    by_doc: HashMap<String, HashSet<Arc<ConnectionHandle>>>,
    doc_by_conn: HashMap<u64, String>,
}

/// Groups connections into per-document rooms; a connection belongs to at
/// most one room.
#[derive(Default)]
pub struct SessionManager {
    rooms: Mutex<Rooms>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, doc_id: &str, connection: Arc<ConnectionHandle>) {
        let mut rooms = self.rooms.lock();
        rooms
            .by_doc
            .entry(doc_id.to_string())
            .or_default()
            .insert(connection.clone());
        rooms.doc_by_conn.insert(connection.id, doc_id.to_string());
    }

    pub fn leave_any(&self, connection: &Arc<ConnectionHandle>) {
        let mut rooms = self.rooms.lock();
        let Some(doc_id) = rooms.doc_by_conn.remove(&connection.id) else {
            return;
        };
        if let Some(room) = rooms.by_doc.get_mut(&doc_id) {
            room.remove(connection);
            if room.is_empty() {
                rooms.by_doc.remove(&doc_id);
            }
        }
    }

    /// Snapshots the room under the lock, then enqueues on each connection
    /// outside the lock, so a slow/full outbound queue on one connection
    /// never blocks the room lock for everyone else.
    pub fn broadcast(&self, doc_id: &str, message: ServerMessage) {
        let conns: Vec<Arc<ConnectionHandle>> = {
            let rooms = self.rooms.lock();
            match rooms.by_doc.get(doc_id) {
                Some(room) => room.iter().cloned().collect(),
                None => return,
            }
        };
        for conn in conns {
            conn.try_send(message.clone());
        }
    }

    #[cfg(test)]
    fn room_size(&self, doc_id: &str) -> usize {
        self.rooms
            .lock()
            .by_doc
            .get(doc_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}
