//! Unified error type for the Quizline runtime.

use quizline_protocol::ProtocolError;
use quizline_session::SessionError;
use quizline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// Binding, connecting or writing failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Bad session input, such as an unknown theme name.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The node behind this handle has stopped.
    #[error("quiz node stopped")]
    Stopped,
}
