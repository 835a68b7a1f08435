//! Error types for the session layer.

/// Errors surfaced by the session crate.
///
/// Game operations themselves never fail: requests that don't apply in
/// the current state are ignored. Only input parsing can go wrong.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The theme name doesn't match any known question set.
    #[error("unknown theme: {0:?}")]
    UnknownTheme(String),
}
