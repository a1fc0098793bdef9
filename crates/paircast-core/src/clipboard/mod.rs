//! Clipboard synchronization for Paircast.
//!
//! This module provides polling-based clipboard change detection since
//! there's no universal cross-platform clipboard change notification API,
//! plus the bookkeeping that keeps two peers from echoing the same text
//! back and forth.
//!
//! Only plain text is synchronized. Non-text clipboard content reads as
//! absent and is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use arboard::Clipboard;

use crate::error::{Error, Result};

/// Default polling interval for clipboard changes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(crate::CLIPBOARD_POLL_INTERVAL_MS);

/// Platform-agnostic clipboard access.
pub trait ClipboardAccess: Send {
    /// Read the current clipboard text, `None` if empty or non-text.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    fn read_text(&mut self) -> Result<Option<String>>;

    /// Replace the clipboard content with the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Native clipboard implementation using arboard.
pub struct NativeClipboard {
    clipboard: Clipboard,
}

impl NativeClipboard {
    /// Create a new native clipboard accessor.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be accessed.
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new()
            .map_err(|e| Error::Clipboard(format!("failed to access clipboard: {e}")))?;
        Ok(Self { clipboard })
    }
}

impl ClipboardAccess for NativeClipboard {
    fn read_text(&mut self) -> Result<Option<String>> {
        match self.clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(Error::Clipboard(format!("failed to read text: {e}"))),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| Error::Clipboard(format!("failed to set text: {e}")))
    }
}

/// State machine for bidirectional clipboard sync.
///
/// Tracks the last text known to have been sent or applied, so the poll
/// loop neither re-sends unchanged content nor echoes text that just
/// arrived from the peer. Lifecycle is tied to the engine, not to any
/// individual connection.
pub struct ClipboardSync {
    /// Last text sent to or applied from the peer
    last_text: Mutex<Option<String>>,
    /// Whether sync is enabled
    enabled: AtomicBool,
}

impl ClipboardSync {
    /// Create the sync state with the given initial enabled flag.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            last_text: Mutex::new(None),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Enable or disable clipboard sync.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether clipboard sync is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Decide whether locally observed text should be sent to the peer.
    ///
    /// Returns `true` and records the text iff sync is enabled, the text
    /// is not blank, and it differs from the last known value. Called by
    /// the poll loop on every tick.
    pub fn observe(&self, text: &str) -> bool {
        if !self.is_enabled() || text.trim().is_empty() {
            return false;
        }

        let mut last = self.last_text.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if last.as_deref() == Some(text) {
            return false;
        }
        *last = Some(text.to_string());
        true
    }

    /// Apply text received from the peer to the local clipboard.
    ///
    /// Records the applied text as last known, so the next poll tick does
    /// not echo it back to the sender. No-op while sync is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard write fails; the recorded state
    /// is only updated on success.
    pub fn apply(&self, access: &mut dyn ClipboardAccess, text: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("clipboard sync disabled, dropping remote update");
            return Ok(());
        }

        access.write_text(text)?;
        let mut last = self.last_text.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = Some(text.to_string());
        tracing::debug!("applied {} bytes of clipboard text from peer", text.len());
        Ok(())
    }

    /// Capture the current clipboard text for a one-shot send.
    ///
    /// Used by the manual "send clipboard" command and by the response to
    /// a `clipboard_request`. Returns `None` if the clipboard is empty;
    /// records the text as last known otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard read fails.
    pub fn capture(&self, access: &mut dyn ClipboardAccess) -> Result<Option<String>> {
        let Some(text) = access.read_text()? else {
            return Ok(None);
        };

        let mut last = self.last_text.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = Some(text.clone());
        Ok(Some(text))
    }
}
