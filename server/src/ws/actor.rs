use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::error::SinkError;
use crate::hub::{OutboundSink, Termination};
use crate::state::AppState;

/// How long the writer gets to flush queued frames (usually a close frame)
/// after the connection is torn down.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Hub-facing sink for one WebSocket connection.
///
/// Frames go through the actor's bounded outbound queue to the writer task,
/// so a send fails once the writer has exited.
pub struct WsSink {
    tx: mpsc::Sender<Message>,
}

impl WsSink {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OutboundSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<(), SinkError> {
        self.tx
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn close(&mut self, reason: &Termination) {
        if let Some(frame) = close_frame_for(reason) {
            // The queue may be full when the peer stopped reading; the socket
            // is dropped either way.
            let _ = self.tx.try_send(Message::Close(Some(frame)));
        }
    }
}

/// Close frame sent to the peer when the hub ends its subscription.
/// `None` when the peer is already gone or the actor is closing the socket.
fn close_frame_for(reason: &Termination) -> Option<CloseFrame> {
    let (code, reason) = match reason {
        Termination::HubClosed => (close_code::AWAY, "Server shutting down"),
        Termination::Lagged { .. } => (close_code::POLICY, "Subscriber fell behind"),
        Termination::Stalled => (close_code::AGAIN, "Subscriber too slow"),
        Termination::Aborted => (close_code::ERROR, "Internal error"),
        Termination::Cancelled | Termination::SendFailed => return None,
    };
    Some(CloseFrame {
        code,
        reason: reason.into(),
    })
}

/// Run the actor-per-connection pattern for one subscriber.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from a bounded mpsc channel
/// - Forwarding task (owned by the hub): pushes events into that channel
/// - Ping task: keepalive; ends when the peer stops answering
/// - Reader loop: watches for disconnects, answers pings, ignores payloads
pub async fn run_connection(socket: WebSocket, state: AppState, session_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(state.ws.outbound_queue.max(1));

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let mut subscription = match state.hub.subscribe(session_id.clone(), WsSink::new(tx.clone())) {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Subscribe rejected");
            let _ = tx.try_send(Message::Close(Some(CloseFrame {
                code: close_code::AWAY,
                reason: "Server unavailable".into(),
            })));
            drop(tx);
            finish_writer(writer_handle).await;
            return;
        }
    };

    tracing::info!(session_id = %session_id, "WebSocket actor started");

    // Track pong reception
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(ping_task(
        tx.clone(),
        pong_rx,
        state.ws.ping_interval(),
        state.ws.pong_timeout(),
    ));

    let mut forwarding_ended = false;
    loop {
        tokio::select! {
            reason = &mut subscription => {
                forwarding_ended = true;
                tracing::info!(
                    session_id = %session_id,
                    reason = %reason,
                    "Event forwarding ended"
                );
                break;
            }
            _ = &mut ping_handle => {
                tracing::info!(session_id = %session_id, "Keepalive failed, dropping connection");
                break;
            }
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(
                        session_id = %session_id,
                        "Ignoring inbound text frame: {}",
                        text.as_str().chars().take(100).collect::<String>()
                    );
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(
                        session_id = %session_id,
                        len = data.len(),
                        "Ignoring inbound binary frame"
                    );
                }
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                Some(Ok(Message::Ping(data))) => {
                    // Skip the pong rather than block the reader on a full queue
                    let _ = tx.try_send(Message::Pong(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(
                        session_id = %session_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::info!(session_id = %session_id, "WebSocket stream ended");
                    break;
                }
            }
        }
    }

    ping_handle.abort();

    // No-op when the forwarding task already deregistered itself
    state.hub.unsubscribe(&session_id);
    if !forwarding_ended {
        let _ = (&mut subscription).await;
    }

    drop(tx);
    finish_writer(writer_handle).await;

    tracing::info!(session_id = %session_id, "WebSocket actor stopped");
}

/// Writer task: receives frames from the mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // Connection is broken
            break;
        }
        if is_close {
            break;
        }
    }
}

/// Ping task: sends periodic pings. Returns when a pong does not come back
/// in time or the writer is gone, which tears the connection down.
async fn ping_task(
    tx: mpsc::Sender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let mut ping_timer = interval(ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).await.is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                // A dead peer may have filled the queue
                let _ = tx.try_send(Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

/// Give the writer a moment to flush, then abort it.
async fn finish_writer(handle: JoinHandle<()>) {
    let abort = handle.abort_handle();
    if timeout(WRITER_DRAIN_TIMEOUT, handle).await.is_err() {
        abort.abort();
    }
}
