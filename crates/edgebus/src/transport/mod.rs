// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message transport seam.
//!
//! Publishers bind a local port and send `(topic, bytes)` frames; subscribers
//! connect to endpoints and receive frames for the topics they subscribed to.
//! Secured sockets use 40-character Z85 keys.
//!
//! [`LoopbackTransport`] is the in-process implementation used by default.

mod loopback;

pub use loopback::LoopbackTransport;

use std::fmt;
use std::sync::Arc;

use crate::config::KEY_LENGTH;
use crate::endpoint::Endpoint;

/// Callback invoked for every received frame with `(topic, payload)`.
pub type MessageCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

// ============================================================================
// Errors
// ============================================================================

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transport runtime is not initialized.
    NotInitialized,
    /// Socket used before `start`.
    NotStarted,
    /// Key is not a 40-character Z85 string.
    InvalidKey,
    /// Port already bound by another publisher.
    AddressInUse(u16),
    /// Endpoint cannot be used for a connection.
    InvalidEndpoint(String),
    /// Socket was stopped.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "transport not initialized"),
            Self::NotStarted => write!(f, "socket not started"),
            Self::InvalidKey => write!(f, "invalid Z85 key"),
            Self::AddressInUse(port) => write!(f, "port {} already in use", port),
            Self::InvalidEndpoint(ep) => write!(f, "invalid endpoint: {}", ep),
            Self::Closed => write!(f, "socket closed"),
        }
    }
}

impl std::error::Error for TransportError {}

// ============================================================================
// Traits
// ============================================================================

/// Transport runtime and socket factory.
pub trait Transport: Send + Sync {
    /// Start the runtime. Calling it on a running transport is a no-op.
    fn initialize(&self) -> Result<(), TransportError>;

    /// Stop the runtime.
    fn terminate(&self) -> Result<(), TransportError>;

    fn create_publisher(&self, port: u16) -> Result<Box<dyn TransportPublisher>, TransportError>;

    /// Create a subscriber whose default connection is `endpoint`.
    fn create_subscriber(
        &self,
        endpoint: &Endpoint,
        on_message: MessageCallback,
    ) -> Result<Box<dyn TransportSubscriber>, TransportError>;
}

/// Publishing socket bound to a local port.
pub trait TransportPublisher: Send + Sync {
    /// Enable security with the server secret key (before `start`).
    fn set_server_private_key(&self, key: &str) -> Result<(), TransportError>;

    fn start(&self) -> Result<(), TransportError>;

    fn publish_on_topic(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    fn stop(&self) -> Result<(), TransportError>;
}

/// Subscribing socket.
pub trait TransportSubscriber: Send + Sync {
    /// Server public key for the next connection.
    fn set_server_public_key(&self, key: &str) -> Result<(), TransportError>;

    fn set_client_keys(&self, secret_key: &str, public_key: &str) -> Result<(), TransportError>;

    fn start(&self) -> Result<(), TransportError>;

    /// Connect to `endpoint` and subscribe to `topic` there.
    fn subscribe_with_endpoint(&self, endpoint: &Endpoint, topic: &str)
        -> Result<(), TransportError>;

    /// Subscribe to `topic` on the default connection.
    fn subscribe_for_topic(&self, topic: &str) -> Result<(), TransportError>;

    fn stop(&self) -> Result<(), TransportError>;
}

/// Z85 alphabet.
const Z85_CHARS: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

/// Check that `key` is a Z85-encoded 32-byte key.
pub fn is_valid_key(key: &str) -> bool {
    key.len() == KEY_LENGTH && key.bytes().all(|b| Z85_CHARS.contains(&b))
}

/// Topic filter match: exact name or any `/`-separated descendant.
pub(crate) fn topic_matches(filter: &str, topic: &str) -> bool {
    match topic.strip_prefix(filter) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
