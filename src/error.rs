//! Crate-wide error types.
//!
//! Each module seam gets its own error enum rather than a shared catch-all,
//! so callers can match on exactly the failures relevant to them. The
//! connection handler is the one place all of these eventually funnel into
//! a transport close code.

use thiserror::Error;

/// Failures while parsing or validating a wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("empty doc_id")]
    EmptyDocId,
    #[error("empty client_id")]
    EmptyClientId,
    #[error("empty client_msg_id")]
    EmptyClientMsgId,
}

/// Failures from a `Persistence` backend.
///
/// The in-memory reference implementation never produces one; the variant
/// exists for durable backends that can fail (disk full, connection lost).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the document service.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("persistence failure while applying op: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("rga invariant violation: {0}")]
    Invariant(String),
}

/// Disposition of a connection-handler failure, carrying the WebSocket
/// close code `spec.md` §6/§7 assigns to it.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("first message was not hello")]
    NotHello,
    #[error("unexpected message type in RUNNING state")]
    UnexpectedType,
    #[error("identity mismatch: doc_id or client_id differs from hello")]
    IdentityMismatch,
    #[error("outbound queue overflowed")]
    Backpressure,
    #[error("internal error: {0}")]
    Internal(#[from] DocumentError),
    #[error("transport closed")]
    TransportClosed,
}

/// WebSocket close codes assigned per `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    ProtocolViolation = 1002,
    UnexpectedType = 1003,
    IdentityMismatch = 1008,
    InternalError = 1011,
    Backpressure = 1013,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl ConnectionError {
    /// Maps this error to the close code a correct implementation must use.
    ///
    /// `TransportClosed` has no code of its own; the peer is already gone,
    /// so there is nothing to close with (§7: "close quietly").
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            ConnectionError::Protocol(_) => Some(CloseCode::ProtocolViolation),
            ConnectionError::NotHello => Some(CloseCode::ProtocolViolation),
            ConnectionError::UnexpectedType => Some(CloseCode::UnexpectedType),
            ConnectionError::IdentityMismatch => Some(CloseCode::IdentityMismatch),
            ConnectionError::Backpressure => Some(CloseCode::Backpressure),
            ConnectionError::Internal(_) => Some(CloseCode::InternalError),
            ConnectionError::TransportClosed => None,
        }
    }
}
