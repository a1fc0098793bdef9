//! Session lifecycle and message dispatch.
//!
//! The [`SessionManager`] owns the listening socket, accepts exactly one
//! peer, runs the receive loop, and fans decoded messages out to the
//! transfer pipeline and the clipboard sync engine. The host layer (CLI,
//! GUI) drives it through commands and observes it through
//! [`EngineEvent`]s; it never touches the stream.
//!
//! Three activities run concurrently once a session is active: the accept
//! step, the receive loop, and the clipboard poll loop. Reads happen only
//! in the receive loop; writes go through [`SessionManager::send`], which
//! serializes concurrent writers behind an async mutex so frames are
//! never interleaved mid-write. `stop` unblocks all three via a broadcast
//! shutdown signal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::clipboard::{ClipboardAccess, ClipboardSync, NativeClipboard, DEFAULT_POLL_INTERVAL};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{self, Message};
use crate::transfer;
use crate::MAX_FRAME_BYTES;

/// Capacity of the event channel towards the host layer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session activity
    Idle,
    /// Listening socket bound, waiting for the peer
    Listening,
    /// Exactly one peer attached
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Events emitted to the host layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The session state changed
    StatusChanged {
        /// New state
        state: SessionState,
        /// Peer device name, once known
        peer: Option<String>,
    },
    /// Human-readable progress label for an ongoing transfer
    TransferProgress(String),
    /// A file landed in the sync folder, under its resolved name
    FileReceived(String),
    /// A non-silent failure; per-message or connection-fatal
    Error {
        /// Stable error kind (see [`Error::kind`])
        kind: &'static str,
        /// Human-readable description
        message: String,
    },
}

impl EngineEvent {
    /// Short name of the event kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status_changed",
            Self::TransferProgress(_) => "transfer_progress",
            Self::FileReceived(_) => "file_received",
            Self::Error { .. } => "error",
        }
    }
}

struct Inner {
    sync_folder: PathBuf,
    state: StdMutex<SessionState>,
    peer_name: StdMutex<Option<String>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    clipboard: ClipboardSync,
    clipboard_dev: StdMutex<Box<dyn ClipboardAccess>>,
    events: mpsc::Sender<EngineEvent>,
    shutdown: broadcast::Sender<()>,
}

/// Handle to the session engine. Cheap to clone; all clones drive the
/// same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create the engine with native clipboard access.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform clipboard cannot be opened.
    pub fn new(config: &Config) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let clipboard = NativeClipboard::new()?;
        Ok(Self::with_clipboard(config, Box::new(clipboard)))
    }

    /// Create the engine with an injected clipboard implementation.
    ///
    /// Used by tests and by hosts that bring their own clipboard glue.
    #[must_use]
    pub fn with_clipboard(
        config: &Config,
        clipboard_dev: Box<dyn ClipboardAccess>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = broadcast::channel(1);

        let manager = Self {
            inner: Arc::new(Inner {
                sync_folder: config.sync_folder.clone(),
                state: StdMutex::new(SessionState::Idle),
                peer_name: StdMutex::new(None),
                writer: Mutex::new(None),
                clipboard: ClipboardSync::new(config.clipboard_sync),
                clipboard_dev: StdMutex::new(clipboard_dev),
                events,
                shutdown,
            }),
        };

        (manager, event_rx)
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    /// Peer device name, once the handshake provided one.
    #[must_use]
    pub fn peer_name(&self) -> Option<String> {
        lock(&self.inner.peer_name).clone()
    }

    /// Directory receiving transferred files.
    #[must_use]
    pub fn sync_folder(&self) -> &Path {
        &self.inner.sync_folder
    }

    /// Start listening for a peer on `0.0.0.0:port`.
    ///
    /// Port 0 binds an ephemeral port; the resolved address is returned
    /// either way. At most one session may run at a time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionActive`] if a session is already listening
    /// or connected, or [`Error::Bind`] if the port is unavailable.
    pub async fn start(&self, port: u16) -> Result<SocketAddr> {
        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Idle {
                return Err(Error::SessionActive);
            }
            *state = SessionState::Listening;
        }

        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                *lock(&self.inner.state) = SessionState::Idle;
                return Err(Error::Bind {
                    port,
                    reason: e.to_string(),
                });
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                *lock(&self.inner.state) = SessionState::Idle;
                return Err(Error::Bind {
                    port,
                    reason: e.to_string(),
                });
            }
        };
        tracing::info!("listening on {addr}");
        self.emit(EngineEvent::StatusChanged {
            state: SessionState::Listening,
            peer: None,
        });

        let shutdown_rx = self.inner.shutdown.subscribe();
        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_accept(listener, shutdown_rx).await;
        });

        Ok(addr)
    }

    /// Stop the session from any state.
    ///
    /// Idempotent and safe before `start`. Unblocks the accept step, the
    /// receive loop, and the poll loop, closes the peer stream, and
    /// returns the session to [`SessionState::Idle`].
    pub async fn stop(&self) {
        let _ = self.inner.shutdown.send(());

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            use tokio::io::AsyncWriteExt;
            let _ = writer.shutdown().await;
        }

        let previous = {
            let mut state = lock(&self.inner.state);
            std::mem::replace(&mut *state, SessionState::Idle)
        };
        lock(&self.inner.peer_name).take();

        if previous != SessionState::Idle {
            tracing::info!("session stopped");
            self.emit(EngineEvent::StatusChanged {
                state: SessionState::Idle,
                peer: None,
            });
        }
    }

    /// Frame and write one message to the connected peer.
    ///
    /// May be called concurrently from the poll loop and user-initiated
    /// operations; the write-half mutex guarantees whole frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a peer,
    /// [`Error::FrameTooLarge`] for a payload the length prefix cannot
    /// represent (nothing is written), or [`Error::SendFailed`] on a
    /// write error. A failed send does not tear the session down; the
    /// receive loop observes the broken stream on its own.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let payload = protocol::serialize(message)?;

        let mut writer = self.inner.writer.lock().await;
        let stream = writer.as_mut().ok_or(Error::NotConnected)?;
        protocol::write_frame(stream, &payload)
            .await
            .map_err(|e| match e {
                oversized @ Error::FrameTooLarge(_) => oversized,
                other => Error::SendFailed(other.to_string()),
            })?;

        tracing::trace!("sent {} message ({} bytes)", message.kind(), payload.len());
        Ok(())
    }

    /// Read a file and send it to the peer as a single message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileUnreadable`] if the file cannot be read, or
    /// the send error otherwise.
    pub async fn send_file(&self, path: &Path) -> Result<()> {
        let label = display_name(path);
        self.emit(EngineEvent::TransferProgress(format!("Sending {label}...")));

        let message = transfer::file_message(path).await?;
        self.send(&message).await?;

        self.emit(EngineEvent::TransferProgress(format!("Sent {label}")));
        Ok(())
    }

    /// Archive a folder and send the archive to the peer.
    ///
    /// The temporary archive is removed on every exit path, success or
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if archiving fails, or the send error
    /// otherwise.
    pub async fn send_folder(&self, path: &Path) -> Result<()> {
        let label = display_name(path);
        self.emit(EngineEvent::TransferProgress(format!("Archiving {label}...")));

        let message = transfer::folder_message(path).await?;
        self.send(&message).await?;

        self.emit(EngineEvent::TransferProgress(format!("Sent {label}")));
        Ok(())
    }

    /// One-shot send of the current clipboard text, independent of the
    /// poll cadence. No-op (Ok) when the clipboard is empty.
    ///
    /// # Errors
    ///
    /// Returns the clipboard or send error.
    pub async fn send_clipboard(&self) -> Result<()> {
        let captured = {
            let mut dev = lock(&self.inner.clipboard_dev);
            self.inner.clipboard.capture(dev.as_mut())?
        };

        match captured {
            Some(data) => self.send(&Message::Clipboard { data }).await,
            None => {
                tracing::debug!("clipboard empty, nothing to send");
                Ok(())
            }
        }
    }

    /// Ask the peer for its current clipboard content.
    ///
    /// # Errors
    ///
    /// Returns the send error.
    pub async fn request_clipboard(&self) -> Result<()> {
        self.send(&Message::ClipboardRequest).await
    }

    /// Enable or disable clipboard synchronization.
    pub fn set_clipboard_sync(&self, enabled: bool) {
        self.inner.clipboard.set_enabled(enabled);
        tracing::info!(
            "clipboard sync {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Whether clipboard synchronization is enabled.
    #[must_use]
    pub fn clipboard_sync_enabled(&self) -> bool {
        self.inner.clipboard.is_enabled()
    }

    async fn run_accept(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        let accepted = tokio::select! {
            _ = shutdown.recv() => None,
            result = listener.accept() => match result {
                Ok(connection) => Some(connection),
                Err(e) => {
                    tracing::warn!("accept failed: {e}");
                    self.emit(EngineEvent::Error {
                        kind: "io",
                        message: format!("accept failed: {e}"),
                    });
                    None
                }
            },
        };

        let Some((stream, peer_addr)) = accepted else {
            // stop() has already (or will) put the state back to Idle.
            return;
        };

        // Single-peer protocol: the listener is dropped here, so no
        // second accept can happen while this connection lives.
        drop(listener);

        tracing::info!("peer connected from {peer_addr}");
        self.run_connection(stream, shutdown).await;
    }

    async fn run_connection(&self, mut stream: TcpStream, mut shutdown: broadcast::Receiver<()>) {
        // Best-effort handshake: the first frame should carry the peer's
        // device name. Malformed or missing data leaves the name unset
        // without aborting the connection.
        let handshake = tokio::select! {
            _ = shutdown.recv() => return,
            result = protocol::read_frame_capped(&mut stream, MAX_FRAME_BYTES) => result,
        };
        match handshake {
            Ok(payload) => match protocol::handshake_device_name(&payload) {
                Some(name) => {
                    tracing::info!("peer identified as '{name}'");
                    lock(&self.inner.peer_name).replace(name);
                }
                None => tracing::warn!("handshake carried no device name"),
            },
            Err(e) => tracing::warn!("handshake read failed: {e}"),
        }

        let (reader, writer) = stream.into_split();
        *self.inner.writer.lock().await = Some(writer);
        *lock(&self.inner.state) = SessionState::Connected;
        self.emit(EngineEvent::StatusChanged {
            state: SessionState::Connected,
            peer: self.peer_name(),
        });

        let poll_shutdown = self.inner.shutdown.subscribe();
        let poller = self.clone();
        tokio::spawn(async move {
            poller.run_poll_loop(poll_shutdown).await;
        });

        self.run_receive_loop(reader, shutdown).await;

        // Fatal read error or peer disconnect; stop() is idempotent and
        // doubles as the teardown path.
        self.stop().await;
    }

    async fn run_receive_loop(
        &self,
        mut reader: OwnedReadHalf,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            let frame = tokio::select! {
                _ = shutdown.recv() => return,
                result = protocol::read_frame_capped(&mut reader, MAX_FRAME_BYTES) => result,
            };

            match frame {
                Ok(payload) => {
                    // Per-message failures abort only this message; the
                    // frame boundary is still intact.
                    if let Err(e) = self.dispatch(&payload).await {
                        tracing::warn!("failed to process message: {e}");
                        self.emit(EngineEvent::Error {
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
                Err(Error::ShortRead) => {
                    // Clean EOF between frames: the peer hung up.
                    tracing::info!("peer disconnected");
                    return;
                }
                Err(e) => {
                    // A torn frame boundary cannot be resynchronized.
                    tracing::warn!("connection lost: {e}");
                    self.emit(EngineEvent::Error {
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    async fn dispatch(&self, payload: &[u8]) -> Result<()> {
        let message = protocol::parse(payload)?;
        tracing::debug!("dispatching {} message", message.kind());

        match message {
            Message::Clipboard { data } => {
                let mut dev = lock(&self.inner.clipboard_dev);
                self.inner.clipboard.apply(dev.as_mut(), &data)
            }
            Message::ClipboardRequest => self.send_clipboard().await,
            Message::File { name, size, data } => {
                self.emit(EngineEvent::TransferProgress(format!("Receiving {name}...")));
                tracing::debug!("incoming file '{name}' ({size} bytes declared)");
                let resolved = transfer::receive_file(&self.inner.sync_folder, &name, &data).await?;
                self.emit(EngineEvent::FileReceived(resolved));
                Ok(())
            }
            Message::Unknown => {
                tracing::debug!("ignoring message of unknown kind");
                Ok(())
            }
        }
    }

    async fn run_poll_loop(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(DEFAULT_POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = interval.tick() => {}
            }

            if self.state() != SessionState::Connected {
                return;
            }
            if !self.inner.clipboard.is_enabled() {
                continue;
            }

            // Clipboard access is best effort: failures are swallowed and
            // the next tick tries again.
            let outgoing = {
                let mut dev = lock(&self.inner.clipboard_dev);
                match dev.read_text() {
                    Ok(Some(text)) if self.inner.clipboard.observe(&text) => Some(text),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::trace!("clipboard poll failed: {e}");
                        None
                    }
                }
            };

            if let Some(data) = outgoing {
                if let Err(e) = self.send(&Message::Clipboard { data }).await {
                    tracing::warn!("failed to push clipboard change: {e}");
                }
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        use tokio::sync::mpsc::error::TrySendError;

        match self.inner.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "host is not draining events, dropping a {} event",
                    event.kind()
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!("event channel closed, dropping a {} event", event.kind());
            }
        }
    }
}

/// Lock a std mutex, recovering from poisoning.
fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string()
}
