//! Connection supervisor: connect/disconnect lifecycle for one event source,
//! reconnect on unexpected drops, and normalization of its payloads onto the
//! dispatch queue.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use actionhub_engine::{DispatchQueue, EventInvocationRequest};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::{EventSource, SourceSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Turns a source payload into a request, or handles it inline.
#[async_trait]
pub trait PayloadRouter<P: Send + 'static>: Send + Sync {
    /// `None` means nothing to enqueue.
    async fn route(&self, payload: P) -> Option<EventInvocationRequest>;

    /// Called each time the source reports a live session.
    async fn on_connected(&self) {}
}

type SharedSource<P> = Arc<dyn EventSource<Payload = P>>;

struct Inner<P: Send + 'static> {
    source: SharedSource<P>,
    router: Arc<dyn PayloadRouter<P>>,
    queue: DispatchQueue,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
    state: watch::Sender<ConnectionState>,
    disconnect_requested: AtomicBool,
    session: Mutex<Option<CancellationToken>>,
    reconnect_attempts: AtomicU64,
}

impl<P: Send + 'static> Inner<P> {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn replace_session(&self, next: Option<CancellationToken>) {
        let previous = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *session, next)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

/// Owns one source's connection lifecycle.
///
/// Each session gets its own signal channel and pump task. An unexpected drop
/// (a `Disconnected` signal or the source dropping its sender) schedules a
/// reconnect after `reconnect_delay`; an explicit `disconnect` suppresses it.
pub struct ConnectionSupervisor<P: Send + 'static> {
    inner: Arc<Inner<P>>,
}

impl<P: Send + 'static> Clone for ConnectionSupervisor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Send + 'static> ConnectionSupervisor<P> {
    pub fn new(
        source: SharedSource<P>,
        router: Arc<dyn PayloadRouter<P>>,
        queue: DispatchQueue,
        reconnect_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                source,
                router,
                queue,
                reconnect_delay,
                shutdown,
                state,
                disconnect_requested: AtomicBool::new(false),
                session: Mutex::new(None),
                reconnect_attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.source.name()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Reconnects started after unexpected drops, successful or not.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Open a session. Rejected with `Ok(false)` while already connected or
    /// connecting.
    pub async fn connect(&self) -> Result<bool> {
        if self.state() != ConnectionState::Disconnected {
            warn!(source = self.name(), state = %self.state(), "Already connected, ignoring connect");
            return Ok(false);
        }
        self.inner.disconnect_requested.store(false, Ordering::SeqCst);
        connect_session(Arc::clone(&self.inner)).await
    }

    /// Close the session and cancel any pending reconnect.
    pub async fn disconnect(&self) -> Result<bool> {
        let inner = &self.inner;
        inner.disconnect_requested.store(true, Ordering::SeqCst);
        inner.replace_session(None);

        if inner.state() == ConnectionState::Disconnected {
            info!(source = self.name(), "Not connected, pending reconnects cancelled");
            return Ok(false);
        }

        let result = inner.source.disconnect().await;
        inner.set_state(ConnectionState::Disconnected);
        info!(source = self.name(), "Disconnected on request");
        result
    }
}

/// Boxed so the connect → pump → reconnect → connect cycle has a nameable type.
fn connect_session<P: Send + 'static>(inner: Arc<Inner<P>>) -> BoxFuture<'static, Result<bool>> {
    async move {
        let began = inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !began {
            debug!(source = inner.source.name(), "Connect already in progress");
            return Ok(false);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let session = inner.shutdown.child_token();
        inner.replace_session(Some(session.clone()));

        info!(source = inner.source.name(), "Connecting");
        match inner.source.connect(tx).await {
            Ok(true) if session.is_cancelled() => {
                if let Err(e) = inner.source.disconnect().await {
                    debug!(source = inner.source.name(), error = %e, "Teardown after cancelled connect failed");
                }
                inner.set_state(ConnectionState::Disconnected);
                info!(source = inner.source.name(), "Disconnect requested while connecting");
                Ok(false)
            }
            Ok(true) => {
                inner.set_state(ConnectionState::Connected);
                info!(source = inner.source.name(), "Connected");
                tokio::spawn(pump(Arc::clone(&inner), rx, session));
                Ok(true)
            }
            Ok(false) => {
                session.cancel();
                inner.set_state(ConnectionState::Disconnected);
                warn!(source = inner.source.name(), "Source refused connection");
                Ok(false)
            }
            Err(e) => {
                session.cancel();
                inner.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }
    .boxed()
}

async fn pump<P: Send + 'static>(
    inner: Arc<Inner<P>>,
    mut signals: mpsc::UnboundedReceiver<SourceSignal<P>>,
    session: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            biased;
            _ = session.cancelled() => return,
            signal = signals.recv() => signal,
        };

        match signal {
            Some(SourceSignal::Payload(payload)) => {
                if let Some(request) = inner.router.route(payload).await {
                    inner.queue.enqueue(request);
                }
            }
            Some(SourceSignal::Connected) => {
                debug!(source = inner.source.name(), "Source reported session live");
                inner.router.on_connected().await;
            }
            Some(SourceSignal::Error(message)) => {
                warn!(source = inner.source.name(), error = %message, "Source reported error");
            }
            Some(SourceSignal::Disconnected) | None => {
                handle_drop(&inner, &session);
                return;
            }
        }
    }
}

fn handle_drop<P: Send + 'static>(inner: &Arc<Inner<P>>, session: &CancellationToken) {
    // A cancelled session was already torn down by disconnect or a newer connect.
    if session.is_cancelled() {
        return;
    }
    session.cancel();
    inner.set_state(ConnectionState::Disconnected);

    if inner.disconnect_requested.load(Ordering::SeqCst) {
        info!(source = inner.source.name(), "Disconnected");
        return;
    }

    warn!(
        source = inner.source.name(),
        delay_secs = inner.reconnect_delay.as_secs_f64(),
        "Connection dropped unexpectedly, scheduling reconnect"
    );
    tokio::spawn(reconnect(Arc::clone(inner)));
}

fn reconnect<P: Send + 'static>(inner: Arc<Inner<P>>) -> BoxFuture<'static, ()> {
    async move {
        loop {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {
                    debug!(source = inner.source.name(), "Shutdown, abandoning reconnect");
                    return;
                }
                _ = tokio::time::sleep(inner.reconnect_delay) => {}
            }

            if inner.disconnect_requested.load(Ordering::SeqCst) {
                info!(source = inner.source.name(), "Disconnect requested, aborting reconnect");
                return;
            }
            if inner.state() != ConnectionState::Disconnected {
                debug!(source = inner.source.name(), "Already reconnected, nothing to do");
                return;
            }

            inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = inner.source.disconnect().await {
                debug!(source = inner.source.name(), error = %e, "Teardown before reconnect failed");
            }

            match connect_session(Arc::clone(&inner)).await {
                Ok(true) => {
                    info!(source = inner.source.name(), "Reconnected");
                    return;
                }
                Ok(false) => {
                    warn!(source = inner.source.name(), "Reconnect failed, retrying");
                }
                Err(e) => {
                    warn!(source = inner.source.name(), error = %e, "Reconnect failed, retrying");
                }
            }
            // connect_session may have lost a race with an explicit connect.
            if inner.state() != ConnectionState::Disconnected {
                return;
            }
        }
    }
    .boxed()
}
