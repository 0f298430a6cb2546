//! Persistent command/notification stream.
//!
//! A [`StreamSession`] owns at most one live connection to the cloud's
//! stream endpoint. Outbound messages go through it; inbound status
//! pushes are parsed and fanned out on a [`tokio::sync::broadcast`]
//! channel.
//!
//! There is no background reconnect loop. A closed or failed stream stays
//! closed until the next [`send`](StreamSession::send) or
//! [`connect`](StreamSession::connect), and a send makes at most one
//! connection attempt before giving up.
//!
//! # Example
//!
//! ```rust,ignore
//! use weback_api::{StreamOptions, StreamSession, protocol};
//!
//! let stream = StreamSession::websocket(&session, StreamOptions::default());
//! let mut updates = stream.subscribe();
//!
//! stream.send(&protocol::status_query("robot-1", "vacuum")).await?;
//! while let Ok(update) = updates.recv().await {
//!     println!("{:?}: {:?}", update.thing_name, update.status);
//! }
//! ```

mod connector;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use connector::{BASIC_AUTHORIZATION, Connector, Frame, FrameSink, FrameStream, Link, StreamTarget, WsConnector};

use crate::auth::Session;
use crate::error::Error;
use crate::protocol::{self, Message, StatusUpdate};

// ── Options ─────────────────────────────────────────────────────────

/// Tuning knobs for a [`StreamSession`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// How long `connect` waits for the stream to open. Default: 10s.
    pub connect_wait: Duration,
    /// Status updates buffered per subscriber. Default: 256.
    pub update_capacity: usize,
    /// Outbound messages queued on an open link. Default: 32.
    pub outbound_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            connect_wait: Duration::from_secs(10),
            update_capacity: 256,
            outbound_capacity: 32,
        }
    }
}

// ── ConnectionState ─────────────────────────────────────────────────

/// Lifecycle of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
    Error,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Error => "error",
        })
    }
}

// ── Shared link state ───────────────────────────────────────────────

struct Outbound {
    text: String,
    ack: oneshot::Sender<Result<(), Error>>,
}

/// Bookkeeping for the current connection attempt.
///
/// Every attempt gets a fresh generation. Callbacks from a superseded
/// attempt carry an old generation and are ignored.
#[derive(Default)]
struct LinkSlot {
    generation: u64,
    outbound: Option<mpsc::Sender<Outbound>>,
    task: Option<JoinHandle<()>>,
    last_error: Option<Error>,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    slot: Mutex<LinkSlot>,
    updates: broadcast::Sender<Arc<StatusUpdate>>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, LinkSlot> {
        self.slot.lock().expect("stream slot lock poisoned")
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Start a new attempt, superseding whatever came before.
    fn begin(&self) -> u64 {
        let mut slot = self.lock();
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.generation += 1;
        slot.outbound = None;
        slot.last_error = None;
        self.state.send_replace(ConnectionState::Connecting);
        slot.generation
    }

    fn attach(&self, generation: u64, task: JoinHandle<()>) {
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.task = Some(task);
        } else {
            task.abort();
        }
    }

    fn opened(&self, generation: u64, outbound: mpsc::Sender<Outbound>) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        slot.outbound = Some(outbound);
        self.state.send_replace(ConnectionState::Open);
        true
    }

    fn failed(&self, generation: u64, err: Error) {
        let mut slot = self.lock();
        if slot.generation != generation {
            return;
        }
        slot.outbound = None;
        slot.last_error = Some(err);
        self.state.send_replace(ConnectionState::Error);
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.generation != generation {
            return;
        }
        slot.outbound = None;
        if self.current() != ConnectionState::Closed {
            self.state.send_replace(ConnectionState::Closed);
        }
    }

    /// Give up on an attempt that did not open: stop it, end in `Closed`.
    ///
    /// An expired-credentials rejection is returned as is so callers can
    /// tell it apart from an unreachable endpoint.
    fn abandon(&self, generation: u64, fallback: String) -> Error {
        let mut slot = self.lock();
        if slot.generation != generation {
            return Error::StreamConnect(fallback);
        }
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.outbound = None;
        if self.current() == ConnectionState::Connecting {
            self.state.send_replace(ConnectionState::Error);
        }
        if self.current() != ConnectionState::Closed {
            self.state.send_replace(ConnectionState::Closed);
        }
        match slot.last_error.take() {
            Some(e) if e.is_auth_expired() => e,
            Some(e @ Error::StreamConnect(_)) => e,
            Some(e) => Error::StreamConnect(e.to_string()),
            None => Error::StreamConnect(fallback),
        }
    }

    fn outbound(&self) -> Option<mpsc::Sender<Outbound>> {
        let slot = self.lock();
        if self.current().is_open() {
            slot.outbound.clone()
        } else {
            None
        }
    }

    fn dispatch(&self, text: &str) {
        match protocol::parse_inbound(text) {
            Ok(Some(update)) => {
                debug!(thing = ?update.thing_name, "status update");
                // No subscribers is fine
                let _ = self.updates.send(Arc::new(update));
            }
            Ok(None) => debug!("ignoring non-status stream payload"),
            Err(e) => warn!(error = %e, "dropping malformed stream payload"),
        }
    }
}

// ── StreamSession ───────────────────────────────────────────────────

/// The single persistent stream shared by every device of an account.
pub struct StreamSession {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    target: ArcSwap<StreamTarget>,
    options: StreamOptions,
    connect_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Create a closed stream session. Nothing is opened until the first
    /// `connect` or `send`.
    pub fn new(session: &Session, connector: Arc<dyn Connector>, options: StreamOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        let (updates, _) = broadcast::channel(options.update_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                state,
                slot: Mutex::new(LinkSlot::default()),
                updates,
            }),
            connector,
            target: ArcSwap::from_pointee(StreamTarget::from_session(session)),
            options,
            connect_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Stream session over a real WebSocket.
    pub fn websocket(session: &Session, options: StreamOptions) -> Self {
        Self::new(session, Arc::new(WsConnector), options)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    /// Watch connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Receive every parsed status update pushed on the stream.
    ///
    /// Updates that arrive while nobody is subscribed are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusUpdate>> {
        self.shared.updates.subscribe()
    }

    /// Use `session`'s token and endpoint for future connection attempts.
    /// A currently open stream is left alone.
    pub fn update_session(&self, session: &Session) {
        self.target.store(Arc::new(StreamTarget::from_session(session)));
    }

    /// Open the stream if it is not already open.
    ///
    /// Waits at most `connect_wait` for the open signal. On failure the
    /// session ends up `Closed` and the next send will try again. A
    /// handshake refused for an expired token yields
    /// [`Error::SessionExpired`]. After [`shutdown`](Self::shutdown) this
    /// fails straight away.
    pub async fn connect(&self) -> Result<(), Error> {
        let _guard = self.connect_lock.lock().await;
        self.connect_locked().await
    }

    async fn connect_locked(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::StreamConnect("stream session is shut down".into()));
        }
        if self.state().is_open() {
            return Ok(());
        }

        let target = StreamTarget::clone(&self.target.load());
        let mut state_rx = self.shared.state.subscribe();
        let generation = self.shared.begin();
        info!(url = %target.url, generation, "opening stream");

        let task = tokio::spawn(run_link(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            target,
            generation,
            self.options.outbound_capacity.max(1),
            self.cancel.child_token(),
        ));
        self.shared.attach(generation, task);

        let wait = self.options.connect_wait;
        let outcome = tokio::time::timeout(wait, async {
            state_rx
                .wait_for(|s| *s != ConnectionState::Connecting)
                .await
                .map(|s| *s)
        })
        .await;

        match outcome {
            Ok(Ok(ConnectionState::Open)) => {
                info!(generation, "stream open");
                Ok(())
            }
            Ok(_) => {
                let err = self.shared.abandon(generation, "stream closed while connecting".into());
                warn!(generation, error = %err, "stream connect failed");
                Err(err)
            }
            Err(_elapsed) => {
                let err = self
                    .shared
                    .abandon(generation, format!("no open signal within {}s", wait.as_secs()));
                warn!(generation, error = %err, "stream connect timed out");
                Err(err)
            }
        }
    }

    /// Send one message.
    ///
    /// If the stream is not open, exactly one connection attempt is made
    /// first; if that fails the message is dropped and `Error::Send`
    /// returned (`Error::SessionExpired` is passed through). A transport
    /// failure while writing closes the stream.
    pub async fn send(&self, message: &Message) -> Result<(), Error> {
        let text = message.to_text()?;
        debug!(opt = message.opt(), thing = message.thing_name(), "sending message");

        let outbound = if let Some(tx) = self.shared.outbound() {
            tx
        } else {
            let _guard = self.connect_lock.lock().await;
            // Another sender may have connected while we waited
            if let Some(tx) = self.shared.outbound() {
                tx
            } else {
                debug!(state = %self.state(), "stream not open, connecting before send");
                self.connect_locked().await.map_err(|e| {
                    if e.is_auth_expired() {
                        e
                    } else {
                        Error::send(format!("stream unavailable: {e}"))
                    }
                })?;
                self.shared
                    .outbound()
                    .ok_or_else(|| Error::send("stream closed right after opening"))?
            }
        };

        deliver(outbound, text).await
    }

    /// Send messages in order, stopping at the first failure.
    pub async fn send_all(&self, messages: &[Message]) -> Result<(), Error> {
        for message in messages {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Close the stream and stop its background task.
    pub fn shutdown(&self) {
        info!("shutting down stream");
        self.cancel.cancel();
        let mut slot = self.shared.lock();
        slot.generation += 1;
        slot.outbound = None;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        self.shared.state.send_replace(ConnectionState::Closed);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn deliver(outbound: mpsc::Sender<Outbound>, text: String) -> Result<(), Error> {
    let (ack, done) = oneshot::channel();
    outbound
        .send(Outbound { text, ack })
        .await
        .map_err(|_| Error::send("stream closed before delivery"))?;
    done.await
        .map_err(|_| Error::send("stream closed before delivery"))?
}

// ── Connection task ─────────────────────────────────────────────────

/// Open one link and pump it until it ends: inbound frames are parsed and
/// broadcast, queued outbound messages are written in order.
async fn run_link(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    target: StreamTarget,
    generation: u64,
    capacity: usize,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = connector.open(target) => result,
    };

    let Link { mut sink, mut frames } = match opened {
        Ok(link) => link,
        Err(e) => {
            warn!(generation, error = %e, "stream transport failed to open");
            shared.failed(generation, e);
            shared.finish(generation);
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Outbound>(capacity);
    if !shared.opened(generation, tx) {
        return;
    }

    let failure = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break None,
            frame = frames.next() => match frame {
                Some(Ok(Frame::Text(text))) => shared.dispatch(&text),
                Some(Ok(Frame::Close { code, reason })) => {
                    info!(generation, code, %reason, "stream closed by server");
                    break None;
                }
                Some(Err(e)) => break Some(e),
                None => {
                    info!(generation, "stream ended");
                    break None;
                }
            },
            outbound = rx.recv() => {
                let Some(Outbound { text, ack }) = outbound else { break None };
                if let Err(e) = sink.send(text).await {
                    warn!(generation, error = %e, "stream write failed");
                    shared.finish(generation);
                    let _ = ack.send(Err(e));
                    return;
                }
                let _ = ack.send(Ok(()));
            }
        }
    };

    if let Some(e) = failure {
        warn!(generation, error = %e, "stream transport error");
        shared.failed(generation, e);
    }
    shared.finish(generation);
}
