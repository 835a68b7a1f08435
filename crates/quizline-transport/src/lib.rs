//! Transport layer for Quizline.
//!
//! Two roles, one per instance:
//!
//! - [`HostTransport`] listens, accepts any number of participants and
//!   broadcasts to all of them.
//! - [`ParticipantTransport`] holds a single outbound connection to the
//!   host.
//!
//! Both split the incoming byte stream into newline-terminated frames
//! with a [`FrameReader`] and surface everything that happens, frames
//! included, as [`TransportEvent`]s pulled by the owner through
//! [`Transport::next_event`]. Reader and accept tasks only forward into a
//! channel; the connection registry is touched only by the owner.

mod error;
mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::FrameReader;
pub use tcp::{HostTransport, ParticipantTransport, DEFAULT_CONNECT_TIMEOUT};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Port used when the caller doesn't pick one.
pub const DEFAULT_PORT: u16 = 12345;

/// Endpoint settings shared by both roles.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port the host listens on and the participant connects to.
    /// Default: [`DEFAULT_PORT`].
    pub port: u16,
    /// How long a participant waits for its connection. Default: 5s.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Opaque, host-generated identifier for a connection.
///
/// Ids come from a per-transport counter and are never reused, not even
/// when the same peer connects again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Which side of a game an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Owns the listening endpoint and the authoritative session.
    Host,
    /// Mirrors the host over one outbound connection.
    Participant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Participant => write!(f, "participant"),
        }
    }
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The host endpoint is accepting connections on `addr`.
    Listening { addr: SocketAddr },

    /// A connection was established: accepted by the host, or the
    /// participant's outbound connection completed.
    Connected { id: ConnectionId, peer: SocketAddr },

    /// One complete frame (terminator removed) arrived on `id`.
    Frame { id: ConnectionId, frame: Vec<u8> },

    /// The connection closed, from either side. Its registry entry is
    /// already gone when this is observed.
    Disconnected { id: ConnectionId },

    /// A non-fatal transport failure (e.g. a failed accept).
    Error { message: String },
}

/// An endpoint that produces [`TransportEvent`]s and sends frames.
pub trait Transport: Send + 'static {
    /// The role this transport implements.
    const ROLE: Role;

    /// Waits for the next event. Returns `None` once the transport is shut
    /// down and every event has been drained.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing,
    /// so it can sit in a `tokio::select!` loop.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Sends one encoded frame: to every connection on the host, to the
    /// host on a participant. Best-effort, no acknowledgment.
    fn send(
        &mut self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends one encoded frame to a single connection.
    ///
    /// # Errors
    /// [`TransportError::ConnectionClosed`] if `id` isn't a live
    /// connection of this transport.
    fn send_to(
        &mut self,
        id: ConnectionId,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stops accepting and reading, and drops every connection.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;

    /// The local address of the endpoint, if it has one.
    fn local_addr(&self) -> Option<SocketAddr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Host.to_string(), "host");
        assert_eq!(Role::Participant.to_string(), "participant");
    }
}
