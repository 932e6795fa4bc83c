//! Process configuration.
//!
//! The Python original hardcodes a FastAPI app with no configuration
//! surface; a Rust service binary takes its bind address and the replay
//! policy constant from the environment/CLI the way the rest of the
//! example pack's services do.

use clap::Parser;

/// Default cap on ops replayed during reconnect catch-up before the
/// connection handler falls back to a snapshot resync (`spec.md` §4.6).
pub const DEFAULT_REPLAY_LIMIT: usize = 500;

#[derive(Debug, Clone, Parser)]
#[command(name = "collab-rga-server", about = "Real-time collaborative text editing server")]
pub struct ServerConfig {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, env = "COLLAB_RGA_BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: String,

    /// Maximum number of ops replayed on reconnect before falling back to a
    /// full-text resync.
    #[arg(long, env = "COLLAB_RGA_REPLAY_LIMIT", default_value_t = DEFAULT_REPLAY_LIMIT)]
    pub replay_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            replay_limit: DEFAULT_REPLAY_LIMIT,
        }
    }
}
