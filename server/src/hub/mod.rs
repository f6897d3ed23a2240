//! Broadcast hub: one multicast event stream fanned out to many subscribers.
//!
//! Every subscriber gets its own forwarding task that reads from a shared
//! `tokio::sync::broadcast` channel at its own pace and writes to that
//! subscriber's [`OutboundSink`]. Publishing never waits on subscribers:
//! a subscriber that falls more than `buffer_capacity` events behind, or whose
//! sink takes longer than `send_timeout` for one frame, is disconnected.

pub mod config;
pub mod event;
pub mod registry;
pub mod sink;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::HubError;

pub use config::HubConfig;
pub use event::Event;
pub use registry::{SessionHandle, SessionRegistry};
pub use sink::{ChannelSink, OutboundSink};

/// Why a forwarding task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Unsubscribed, or cancelled through its [`Subscription`].
    Cancelled,
    /// The hub was shut down.
    HubClosed,
    /// The sink reported a failed send.
    SendFailed,
    /// A single send did not finish within the send timeout.
    Stalled,
    /// The subscriber fell behind by more than the buffer capacity.
    Lagged { skipped: u64 },
    /// The task panicked or was aborted by the runtime.
    Aborted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Cancelled => write!(f, "cancelled"),
            Termination::HubClosed => write!(f, "hub closed"),
            Termination::SendFailed => write!(f, "send failed"),
            Termination::Stalled => write!(f, "send stalled"),
            Termination::Lagged { skipped } => write!(f, "lagged by {} events", skipped),
            Termination::Aborted => write!(f, "aborted"),
        }
    }
}

/// Handle to one subscriber's forwarding task.
///
/// Awaiting it yields the reason the task ended. Dropping it leaves the task
/// running; use [`BroadcastHub::unsubscribe`] or [`Subscription::cancel`] to
/// stop it.
#[derive(Debug)]
pub struct Subscription {
    session_id: String,
    token: CancellationToken,
    task: JoinHandle<Termination>,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Future for Subscription {
    type Output = Termination;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(reason)) => Poll::Ready(reason),
            Poll::Ready(Err(e)) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "Forwarding task aborted"
                );
                Poll::Ready(Termination::Aborted)
            }
        }
    }
}

/// The fan-out hub. Cheap to clone; all clones share one stream and registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    sender: broadcast::Sender<Arc<Event>>,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    next_epoch: AtomicU64,
    send_timeout: Duration,
}

impl BroadcastHub {
    pub fn new(config: &HubConfig) -> Self {
        // broadcast::channel panics on a zero capacity
        let (sender, _) = broadcast::channel(config.buffer_capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                sender,
                registry: Arc::new(SessionRegistry::new()),
                shutdown: CancellationToken::new(),
                next_epoch: AtomicU64::new(1),
                send_timeout: config.send_timeout(),
            }),
        }
    }

    /// Append an event to the stream.
    ///
    /// Returns how many subscribers it was queued for; zero subscribers is
    /// not an error. Fails with [`HubError::Closed`] after [`shutdown`].
    ///
    /// [`shutdown`]: BroadcastHub::shutdown
    pub fn publish(&self, event: Event) -> Result<usize, HubError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(HubError::Closed);
        }

        tracing::debug!(event = ?event, "Emitting event");
        // send() only fails when nobody is subscribed
        let receivers = self.inner.sender.send(Arc::new(event)).unwrap_or(0);
        Ok(receivers)
    }

    /// Register a subscriber and start its forwarding task.
    ///
    /// The subscriber receives every event published after this call returns,
    /// and nothing published before it.
    pub fn subscribe<S: OutboundSink>(
        &self,
        session_id: impl Into<String>,
        sink: S,
    ) -> Result<Subscription, HubError> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(HubError::Closed);
        }

        let session_id = session_id.into();
        let handle = SessionHandle {
            token: inner.shutdown.child_token(),
            epoch: inner.next_epoch.fetch_add(1, Ordering::Relaxed),
        };
        inner.registry.add(&session_id, handle.clone())?;

        let forwarder = Forwarder {
            session_id: session_id.clone(),
            handle: handle.clone(),
            registry: Arc::clone(&inner.registry),
            shutdown: inner.shutdown.clone(),
            send_timeout: inner.send_timeout,
        };
        let task = tokio::spawn(forwarder.run(inner.sender.subscribe(), sink));

        tracing::info!(
            session_id = %session_id,
            subscribers = inner.registry.len(),
            "Subscriber connected"
        );

        Ok(Subscription {
            session_id,
            token: handle.token,
            task,
        })
    }

    /// Cancel a subscriber's forwarding task and forget it.
    ///
    /// Returns `false` when the session was not subscribed, including when it
    /// already went away on its own.
    pub fn unsubscribe(&self, session_id: &str) -> bool {
        match self.inner.registry.remove(session_id) {
            Some(handle) => {
                handle.token.cancel();
                tracing::info!(
                    session_id = %session_id,
                    subscribers = self.inner.registry.len(),
                    "Subscriber disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Stop every forwarding task and refuse further publish/subscribe calls.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::info!(
                subscribers = self.inner.registry.len(),
                "Shutting down broadcast hub"
            );
            self.inner.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn is_subscribed(&self, session_id: &str) -> bool {
        self.inner.registry.contains(session_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }
}

/// State owned by one forwarding task.
struct Forwarder {
    session_id: String,
    handle: SessionHandle,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    send_timeout: Duration,
}

impl Forwarder {
    async fn run<S: OutboundSink>(
        self,
        mut rx: broadcast::Receiver<Arc<Event>>,
        mut sink: S,
    ) -> Termination {
        let token = self.handle.token.clone();
        let reason = loop {
            let received = tokio::select! {
                biased;
                () = token.cancelled() => break self.cancel_reason(),
                received = rx.recv() => received,
            };

            let event = match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        skipped,
                        "Subscriber fell behind, disconnecting"
                    );
                    break Termination::Lagged { skipped };
                }
                Err(RecvError::Closed) => break Termination::HubClosed,
            };

            let frame = match sink.encode(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "Failed to encode event, skipping delivery"
                    );
                    continue;
                }
            };
            tracing::trace!(session_id = %self.session_id, frame = %frame, "Push event to subscriber");

            let sent = tokio::select! {
                biased;
                () = token.cancelled() => break self.cancel_reason(),
                sent = tokio::time::timeout(self.send_timeout, sink.send(frame)) => sent,
            };
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(
                        session_id = %self.session_id,
                        error = %e,
                        "Send to subscriber failed"
                    );
                    break Termination::SendFailed;
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        timeout_ms = self.send_timeout.as_millis() as u64,
                        "Subscriber send stalled, disconnecting"
                    );
                    break Termination::Stalled;
                }
            }
        };

        // No-op when unsubscribe already removed the entry
        if self.registry.remove_if_epoch(&self.session_id, self.handle.epoch) {
            tracing::info!(
                session_id = %self.session_id,
                reason = %reason,
                subscribers = self.registry.len(),
                "Subscriber removed"
            );
        }
        token.cancel();

        if tokio::time::timeout(self.send_timeout, sink.close(&reason))
            .await
            .is_err()
        {
            tracing::debug!(session_id = %self.session_id, "Sink close timed out");
        }

        reason
    }

    fn cancel_reason(&self) -> Termination {
        if self.shutdown.is_cancelled() {
            Termination::HubClosed
        } else {
            Termination::Cancelled
        }
    }
}
