//! # Paircast Core Library
//!
//! `paircast-core` pairs a desktop with a mobile peer on the local network
//! to synchronize clipboard text and transfer files or folders over a
//! direct TCP connection.
//!
//! ## Modules
//!
//! - [`clipboard`] - Clipboard change detection and feedback-loop suppression
//! - [`config`] - Configuration management
//! - [`invite`] - Connection credentials and QR rendering for the pairing flow
//! - [`protocol`] - Length-prefixed JSON wire protocol
//! - [`session`] - Session lifecycle, receive loop, and dispatch
//! - [`transfer`] - File/folder transfer pipeline
//!
//! ## Example
//!
//! ```rust,ignore
//! use paircast_core::config::Config;
//! use paircast_core::session::SessionManager;
//!
//! let config = Config::load()?;
//! let (session, mut events) = SessionManager::new(&config)?;
//! let addr = session.start(config.port).await?;
//! println!("listening on {addr}");
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]

pub mod clipboard;
pub mod config;
pub mod error;
pub mod invite;
pub mod protocol;
pub mod session;
pub mod transfer;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listening port
pub const DEFAULT_PORT: u16 = 8888;

/// Clipboard poll interval in milliseconds
pub const CLIPBOARD_POLL_INTERVAL_MS: u64 = 1000;

/// Maximum frame size accepted by the session's receive loop (256 MiB).
///
/// The framing codec itself imposes no limit; this is the session-level
/// cap on whole-in-memory transfers.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;
