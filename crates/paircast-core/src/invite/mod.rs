//! Connection credentials for the pairing flow.
//!
//! When a session starts listening, the host side produces a small JSON
//! payload with everything the mobile peer needs to join: local IP,
//! port, device name, and an issue timestamp. The payload is what gets
//! rendered into a QR code; this module also renders the terminal
//! (Unicode) form of that QR for headless hosts.
//!
//! No authenticity or freshness check is performed on these fields.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The credential payload encoded into the pairing QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInvite {
    /// Local address the session listens on (dotted-quad or hostname)
    pub ip: String,
    /// Listening port
    pub port: u16,
    /// Host device name
    pub device_name: String,
    /// Issue time, seconds since epoch
    pub timestamp: i64,
}

impl ConnectionInvite {
    /// Build an invite for the given listening address.
    ///
    /// Device name comes from the hostname; timestamp is now.
    #[must_use]
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip: ip.to_string(),
            port,
            device_name: local_device_name(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Serialize the invite to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Parse an invite from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the payload is not a valid
    /// invite.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Render the invite as a Unicode QR code for terminal display.
    ///
    /// # Errors
    ///
    /// Returns an error if QR code generation fails.
    pub fn to_qr_string(&self) -> Result<String> {
        let json = self.to_json()?;

        let qr_code = QrCode::with_error_correction_level(&json, EcLevel::M)
            .map_err(|e| Error::Internal(format!("failed to generate QR code: {e}")))?;

        let rendered = qr_code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build();

        Ok(rendered)
    }
}

/// Determine the local LAN address by opening a UDP socket towards a
/// public address. No packet is sent; the OS just picks the outbound
/// interface. Falls back to loopback when the host is offline.
#[must_use]
pub fn local_ip() -> IpAddr {
    let fallback = IpAddr::V4(Ipv4Addr::LOCALHOST);

    let Ok(socket) = UdpSocket::bind("0.0.0.0:0") else {
        return fallback;
    };
    if socket.connect("8.8.8.8:80").is_err() {
        return fallback;
    }
    socket.local_addr().map_or(fallback, |addr| addr.ip())
}

/// The host's device name, from the hostname.
#[must_use]
pub fn local_device_name() -> String {
    hostname::get().map_or_else(
        |_| "Paircast Device".to_string(),
        |h| h.to_string_lossy().to_string(),
    )
}
