use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// `Bind`, `Connect` and `ConnectTimeout` are setup errors: the role was
/// never started and the caller may retry with other parameters.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening endpoint failed, including the fallback to
    /// an ephemeral port.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Opening the outbound connection failed.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The outbound connection attempt was abandoned.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// There is no live connection to send on.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
