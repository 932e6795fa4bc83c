//! HTTP/WebSocket route table.

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;

use crate::server::connection::handle_connection;
use crate::server::context::ServerContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<ServerContext>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, ctx))
}

pub fn create_router() -> Router<ServerContext> {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
}
