#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::channels::ChannelRegistry;
use super::config::Config;
use super::error::LiveError;
use super::frame::Frame;
use super::router::EventRouter;
use crate::Result;
use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state tracking.
///
/// Exactly one value holds at any instant; every other component observes
/// transitions of this value through the watch channel rather than touching
/// the transport.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be
    Idle,
    /// Attempting to open the transport
    Connecting,
    /// Transport open and traffic flowing
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Manual disconnect in progress
    Closing,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting {
        /// Current reconnection attempt number
        attempt: u32,
    },
    /// Reconnect attempts exhausted; terminal until `disconnect()` resets it
    PermanentlyFailed,
}

impl ConnectionState {
    /// Check if the transport is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Check if the connection gave up after exhausting its retries.
    #[must_use]
    pub const fn is_permanently_failed(self) -> bool {
        matches!(self, Self::PermanentlyFailed)
    }
}

/// Why the connection loop exited.
enum LoopExit {
    Manual,
    Exhausted(u32),
}

/// Why one open-transport session ended.
enum SessionEnd {
    Manual,
    Dropped(LiveError),
}

/// Everything the background connection loop needs, bundled so the spawned
/// task owns its handles outright.
struct LoopContext {
    endpoint: Url,
    config: Config,
    router: Arc<EventRouter>,
    channels: Arc<ChannelRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>,
    cancel: CancellationToken,
    loop_active: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
}

/// Manages the single live WebSocket connection: lifecycle, subscription
/// replay, heartbeat, and bounded reconnection.
///
/// This is the only component that talks to the transport. The channel set
/// and the event router are owned sub-objects shared with the facade through
/// `Arc`; the transport handle, the outbound sender, and the reconnect
/// attempt counter live exclusively inside the background loop, which is
/// what keeps the at-most-one-physical-connection invariant enforceable
/// without locks around the socket itself.
pub struct ConnectionManager {
    endpoint: Url,
    config: Config,
    router: Arc<EventRouter>,
    channels: Arc<ChannelRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender for the currently open session, if any
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>,
    /// Cancellation token for the current connect cycle
    cancel: Mutex<CancellationToken>,
    /// Whether a connection loop is currently running
    loop_active: Arc<AtomicBool>,
    /// Inbound frames discarded because they failed to parse
    dropped_frames: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a new manager. No connection is attempted until
    /// [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        endpoint: Url,
        config: Config,
        router: Arc<EventRouter>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        Self {
            endpoint,
            config,
            router,
            channels,
            state_tx,
            state_rx,
            outbound: Arc::new(RwLock::new(None)),
            cancel: Mutex::new(CancellationToken::new()),
            loop_active: Arc::new(AtomicBool::new(false)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the connection loop with the given access token.
    ///
    /// A no-op when a loop is already running (connecting, open, or waiting
    /// to reconnect). Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the state is
    /// [`ConnectionState::PermanentlyFailed`]: that state is terminal and
    /// only `disconnect()` followed by a fresh `connect()` recovers from it.
    pub fn connect(&self, token: &SecretString) -> Result<()> {
        if self.state().is_permanently_failed() {
            return Err(Error::validation(
                "connection permanently failed; call disconnect() before reconnecting",
            ));
        }
        if self
            .loop_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Already connecting, open, or waiting to reconnect.
            return Ok(());
        }

        let mut endpoint = self.endpoint.clone();
        endpoint
            .query_pairs_mut()
            .append_pair("token", token.expose_secret());

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();

        let ctx = LoopContext {
            endpoint,
            config: self.config.clone(),
            router: Arc::clone(&self.router),
            channels: Arc::clone(&self.channels),
            state_tx: self.state_tx.clone(),
            outbound: Arc::clone(&self.outbound),
            cancel,
            loop_active: Arc::clone(&self.loop_active),
            dropped_frames: Arc::clone(&self.dropped_frames),
        };
        tokio::spawn(Self::connection_loop(ctx));

        Ok(())
    }

    /// Tear the connection down and return the system to idle.
    ///
    /// Idempotent, and the single authoritative cancellation path: it cancels
    /// an in-flight connect, a pending reconnect delay, and the heartbeat in
    /// one stroke, then waits for the loop to finish unwinding. Also resets
    /// a [`ConnectionState::PermanentlyFailed`] state back to idle.
    pub async fn disconnect(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        cancel.cancel();

        let mut state_rx = self.state_tx.subscribe();
        while self.loop_active.load(Ordering::Acquire) {
            if state_rx.changed().await.is_err() {
                break;
            }
        }

        _ = self.state_tx.send(ConnectionState::Idle);
    }

    /// Main connection loop with bounded, backed-off reconnection.
    async fn connection_loop(ctx: LoopContext) {
        let mut attempt = 0_u32;
        let mut backoff: ExponentialBackoff = ctx.config.reconnect.clone().into();

        let exit = loop {
            _ = ctx.state_tx.send(ConnectionState::Connecting);

            let connected = tokio::select! {
                res = connect_async(ctx.endpoint.as_str()) => res,
                () = ctx.cancel.cancelled() => break LoopExit::Manual,
            };

            match connected {
                Ok((ws_stream, _)) => {
                    attempt = 0;
                    backoff.reset();

                    match Self::handle_connection(ws_stream, &ctx).await {
                        SessionEnd::Manual => break LoopExit::Manual,
                        SessionEnd::Dropped(e) => {
                            tracing::warn!(error = %e, "live connection dropped");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unable to open live connection");
                }
            }

            attempt = attempt.saturating_add(1);
            if !ctx.config.reconnect.has_attempts_remaining(attempt) {
                break LoopExit::Exhausted(attempt);
            }

            _ = ctx.state_tx.send(ConnectionState::Reconnecting { attempt });

            let delay = backoff
                .next_backoff()
                .unwrap_or(ctx.config.reconnect.max_backoff);
            tokio::select! {
                () = sleep(delay) => {}
                () = ctx.cancel.cancelled() => break LoopExit::Manual,
            }
        };

        ctx.loop_active.store(false, Ordering::Release);
        match exit {
            LoopExit::Manual => {
                _ = ctx.state_tx.send(ConnectionState::Idle);
            }
            LoopExit::Exhausted(attempts) => {
                tracing::error!(attempts, "reconnect attempts exhausted; giving up");
                _ = ctx.state_tx.send(ConnectionState::PermanentlyFailed);
            }
        }
    }

    /// Drive one open transport session until it drops or is cancelled.
    async fn handle_connection(ws_stream: WsStream, ctx: &LoopContext) -> SessionEnd {
        let (mut write, mut read) = ws_stream.split();

        // Install the outbound sender before announcing Open so a caller
        // that observes the state change can enqueue frames right away.
        let (sender_tx, mut sender_rx) = mpsc::unbounded_channel::<String>();
        *ctx.outbound.write().unwrap_or_else(PoisonError::into_inner) = Some(sender_tx);

        _ = ctx.state_tx.send(ConnectionState::Open {
            since: Instant::now(),
        });

        // Replay the active channel set before any inbound frame is routed.
        for channel in ctx.channels.snapshot() {
            match Frame::subscribe(&channel).to_text() {
                Ok(text) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        *ctx.outbound.write().unwrap_or_else(PoisonError::into_inner) = None;
                        return SessionEnd::Dropped(LiveError::ConnectionClosed);
                    }
                }
                Err(e) => {
                    tracing::error!(%channel, error = %e, "failed to encode subscribe frame");
                }
            }
        }

        let (ping_tx, mut ping_rx) = mpsc::unbounded_channel::<String>();
        let heartbeat_state = ctx.state_tx.subscribe();
        let heartbeat_interval = ctx.config.heartbeat_interval;
        let heartbeat_handle = tokio::spawn(async move {
            Self::heartbeat_loop(ping_tx, heartbeat_state, heartbeat_interval).await;
        });

        let end = loop {
            tokio::select! {
                // Inbound frames
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        Self::route_text(&ctx.router, &text, &ctx.dropped_frames);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break SessionEnd::Dropped(LiveError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {
                        // Binary and protocol-level ping/pong frames are ignored.
                    }
                    Some(Err(e)) => {
                        // Logged here; the stream ending is the authoritative close.
                        tracing::warn!(error = %e, "live transport error");
                        break SessionEnd::Dropped(LiveError::Connection(e));
                    }
                },

                // Outbound control frames from the facade
                Some(text) = sender_rx.recv() => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break SessionEnd::Dropped(LiveError::ConnectionClosed);
                    }
                }

                // Keep-alive pings from the heartbeat task
                Some(text) = ping_rx.recv() => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break SessionEnd::Dropped(LiveError::ConnectionClosed);
                    }
                }

                // Manual disconnect
                () = ctx.cancel.cancelled() => {
                    _ = ctx.state_tx.send(ConnectionState::Closing);
                    _ = write.send(Message::Close(None)).await;
                    break SessionEnd::Manual;
                }
            }
        };

        heartbeat_handle.abort();
        *ctx.outbound.write().unwrap_or_else(PoisonError::into_inner) = None;

        end
    }

    /// Heartbeat loop emitting a keep-alive `ping` frame every interval
    /// while the state remains open.
    ///
    /// Fire-and-forget: the monitor never judges connection health from the
    /// absence of a reply. Liveness detection, if wanted, is a caller
    /// concern layered on top of the router.
    async fn heartbeat_loop(
        ping_tx: mpsc::UnboundedSender<String>,
        state_rx: watch::Receiver<ConnectionState>,
        period: Duration,
    ) {
        let mut ticker = interval(period);
        // The first tick completes immediately; consume it so pings start
        // one full period after the connection opens.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if !state_rx.borrow().is_open() {
                break;
            }

            let Ok(text) = Frame::ping().to_text() else {
                break;
            };
            if ping_tx.send(text).is_err() {
                // Session loop has terminated
                break;
            }
        }
    }

    /// Parse and route one inbound text frame. Malformed frames are dropped
    /// and counted, never raised.
    fn route_text(router: &EventRouter, text: &str, dropped_frames: &AtomicU64) {
        match Frame::parse(text) {
            Ok(frame) => {
                tracing::trace!(event = %frame.event, "routing live frame");
                router.dispatch(&frame);
            }
            Err(e) => {
                dropped_frames.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "discarding malformed live frame");
            }
        }
    }

    /// Enqueue an outbound frame on the current session.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::ConnectionClosed`] when no session is open.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let text = frame.to_text()?;
        let guard = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) if tx.send(text).is_ok() => Ok(()),
            _ => Err(LiveError::ConnectionClosed.into()),
        }
    }

    /// Enqueue an outbound frame only when the connection is open.
    ///
    /// Returns `Ok(false)` without sending when it is not, including when
    /// the session dropped between the state check and the send; registry
    /// mutations not sent here are replayed on the next open instead.
    pub fn send_if_open(&self, frame: &Frame) -> Result<bool> {
        if !self.state().is_open() {
            return Ok(false);
        }
        let text = frame.to_text()?;
        let guard = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) if tx.send(text).is_ok() => Ok(true),
            _ => Ok(false),
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    ///
    /// This is the read-only connectivity signal: collaborators watch it to
    /// render connected/not-connected and to observe permanent failure.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Number of inbound frames discarded because they failed to parse.
    #[must_use]
    pub fn dropped_frame_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}
