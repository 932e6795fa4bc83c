//! Connection handler: drives one duplex WebSocket through
//! `AWAIT_HELLO -> CATCHUP -> RUNNING -> CLOSED`.
//!
//! Grounded on `examples/original_source/api/ws.py`'s control flow and
//! `src/server/websocket.rs`'s per-connection handler struct shape from the
//! teacher, generalized from a single shared document to per-document
//! rooms with replay-or-resync catch-up.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{Stream, SinkExt, StreamExt};
use tracing::{info, warn};

use crate::error::ConnectionError;
use crate::protocol::{ClientMessage, ServerMessage, parse_client_message};
use crate::server::context::ServerContext;
use crate::session::ConnectionHandle;

/// How long teardown waits for the writer task to flush/close cooperatively
/// before cancelling it outright (`spec.md` §5: cancellation is
/// cooperative, but must still happen on teardown).
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub async fn handle_connection(socket: WebSocket, ctx: ServerContext) {
    let (mut sink, mut stream) = socket.split();

    let (doc_id, client_id, last_seen_server_seq) = match await_hello(&mut stream).await {
        Ok(hello) => hello,
        Err(None) => return, // transport closed before a hello arrived
        Err(Some(err)) => {
            warn!(%err, "protocol violation awaiting hello");
            close_raw(&mut sink, err.close_code().map_or(1002, |c| c.code()), &err.to_string()).await;
            return;
        }
    };

    info!(doc_id, client_id, "ws hello");

    let (conn, outbound_rx) = ConnectionHandle::new(client_id.clone());
    ctx.sessions.join(&doc_id, conn.clone());

    let mut writer_task = tokio::spawn(writer_loop(sink, outbound_rx, conn.clone()));

    let result = async {
        catch_up(&ctx, &conn, &doc_id, last_seen_server_seq).await?;
        run(&ctx, &conn, &mut stream, &doc_id, &client_id).await
    }
    .await;

    if let Err(err) = result {
        warn!(doc_id, client_id, %err, "closing connection");
        if let Some(code) = err.close_code() {
            conn.request_close(code.code(), err.to_string());
        }
    }

    ctx.sessions.leave_any(&conn);

    tokio::select! {
        _ = &mut writer_task => {}
        _ = tokio::time::sleep(WRITER_SHUTDOWN_GRACE) => {
            writer_task.abort();
        }
    }

    info!(doc_id, client_id, "ws session ended");
}

/// Reads the first frame and requires it to be a valid `hello`. The `Err`
/// variant distinguishes "transport already gone" (`None`, nothing to close)
/// from an actual protocol violation (`Some`, needs a close frame).
async fn await_hello(
    stream: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> Result<(String, String, u64), Option<ConnectionError>> {
    let frame = match stream.next().await {
        Some(Ok(frame)) => frame,
        _ => return Err(None),
    };
    let Message::Text(text) = frame else {
        return Err(Some(ConnectionError::NotHello));
    };
    match parse_client_message(&text) {
        Ok(ClientMessage::Hello {
            doc_id,
            client_id,
            last_seen_server_seq,
        }) => Ok((doc_id, client_id, last_seen_server_seq)),
        Ok(ClientMessage::Op { .. }) => Err(Some(ConnectionError::NotHello)),
        Err(err) => Err(Some(ConnectionError::Protocol(err))),
    }
}

async fn catch_up(
    ctx: &ServerContext,
    conn: &ConnectionHandle,
    doc_id: &str,
    last_seen_server_seq: u64,
) -> Result<(), ConnectionError> {
    let current_seq = ctx.documents.get_server_seq(doc_id)?;
    conn.try_send(ServerMessage::HelloAck {
        doc_id: doc_id.to_string(),
        server_seq: current_seq,
    });

    let replay = if last_seen_server_seq > 0 && last_seen_server_seq < current_seq {
        ctx.persistence
            .get_ops_since(doc_id, last_seen_server_seq)
            .map_err(crate::error::DocumentError::from)?
    } else {
        None
    };

    match replay {
        Some(ops) if ops.len() <= ctx.config.replay_limit => {
            info!(doc_id, server_seq = current_seq, count = ops.len(), "ws replay start");
            for rec in ops {
                conn.try_send(ServerMessage::OpEcho {
                    doc_id: rec.doc_id,
                    server_seq: rec.server_seq,
                    origin_client_id: rec.origin_client_id,
                    client_msg_id: rec.client_msg_id,
                    op: rec.op,
                });
            }
            info!(doc_id, server_seq = current_seq, "ws replay done");
        }
        _ => {
            let (full_text, server_seq) = ctx.documents.get_snapshot(doc_id)?;
            info!(doc_id, server_seq, "ws resync");
            conn.try_send(ServerMessage::Resync {
                doc_id: doc_id.to_string(),
                server_seq,
                full_text,
            });
        }
    }

    Ok(())
}

async fn run(
    ctx: &ServerContext,
    conn: &ConnectionHandle,
    stream: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    doc_id: &str,
    client_id: &str,
) -> Result<(), ConnectionError> {
    while !conn.is_closed() {
        let frame = match stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(_)) => return Err(ConnectionError::TransportClosed),
            None => return Err(ConnectionError::TransportClosed),
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!(doc_id, client_id, "ws closed by client");
                return Ok(());
            }
            _ => continue,
        };

        let client_msg = parse_client_message(&text).map_err(ConnectionError::Protocol)?;

        let (op_doc_id, op_client_id, client_msg_id, op) = match client_msg {
            ClientMessage::Op {
                doc_id,
                client_id,
                client_msg_id,
                op,
            } => (doc_id, client_id, client_msg_id, op),
            ClientMessage::Hello { .. } => return Err(ConnectionError::UnexpectedType),
        };

        if op_doc_id != doc_id || op_client_id != client_id {
            return Err(ConnectionError::IdentityMismatch);
        }

        // The broadcast happens from inside `apply_op`'s callback, while its
        // per-doc lock is still held, so two concurrent writers on the same
        // document can never have their op_echoes observed out of order.
        let sessions = &ctx.sessions;
        let echo_doc_id = doc_id.to_string();
        let echo_client_id = client_id.to_string();
        let server_seq = ctx
            .documents
            .apply_op(doc_id, client_id, &client_msg_id, op.clone(), |server_seq| {
                sessions.broadcast(
                    &echo_doc_id,
                    ServerMessage::OpEcho {
                        doc_id: echo_doc_id.clone(),
                        server_seq,
                        origin_client_id: echo_client_id.clone(),
                        client_msg_id: client_msg_id.clone(),
                        op: op.clone(),
                    },
                );
            })
            .await?;

        info!(doc_id, client_id, server_seq, "op integrated");
    }
    Ok(())
}

async fn writer_loop(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: tokio::sync::mpsc::Receiver<ServerMessage>,
    conn: std::sync::Arc<ConnectionHandle>,
) {
    loop {
        tokio::select! {
            biased;
            _ = conn.closed_notified(), if conn.is_closed() => {
                if let Some((code, reason)) = conn.take_pending_close() {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                }
                return;
            }
            maybe_msg = outbound_rx.recv() => {
                match maybe_msg {
                    Some(msg) => {
                        if sink.send(Message::Text(msg.to_json())).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

async fn close_raw(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) {
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}
