//! The explicit server context threaded through every connection, built
//! once at startup instead of the process-wide singletons `spec.md` §9
//! flags as a design smell in the current source.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::document::DocumentService;
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct ServerContext {
    pub documents: Arc<DocumentService>,
    pub sessions: Arc<SessionManager>,
    /// Direct persistence handle for the connection handler's catch-up
    /// replay decision, which calls `get_ops_since` itself rather than
    /// through `DocumentService`, the same `Arc` `documents` was built on.
    pub persistence: Arc<dyn Persistence>,
    pub config: ServerConfig,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
        ServerContext {
            documents: Arc::new(DocumentService::new(persistence.clone())),
            sessions: Arc::new(SessionManager::new()),
            persistence,
            config,
        }
    }
}
