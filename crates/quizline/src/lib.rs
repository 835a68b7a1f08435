//! # Quizline
//!
//! Host-authoritative multiplayer quiz over a local network.
//!
//! One node hosts: it owns the authoritative session, scores every answer
//! and announces the game's progress. Any number of participant nodes
//! connect to it over TCP, send their answers and mirror what the host
//! announces. Messages are single-line JSON envelopes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizline::prelude::*;
//!
//! # async fn demo() -> Result<(), QuizError> {
//! let mut host = QuizBuilder::new()
//!     .theme(Theme::Science)
//!     .port(DEFAULT_PORT)
//!     .host()
//!     .await?;
//!
//! while let Some(event) = host.next_event().await {
//!     if let QuizEvent::Session(SessionEvent::PlayerJoined { .. }) = event {
//!         host.start_game()?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod dispatch;
mod error;
mod node;

pub use builder::QuizBuilder;
pub use error::QuizError;
pub use node::{QuizEvent, QuizHandle, Snapshot};

pub mod prelude {
    pub use crate::{QuizBuilder, QuizError, QuizEvent, QuizHandle, Snapshot};
    pub use quizline_protocol::{Codec, Envelope, JsonLineCodec, MessageType};
    pub use quizline_session::{
        FixedCodes, GameState, Question, RandomCodes, SessionEvent, Theme, Winner,
    };
    pub use quizline_transport::{ConnectionId, Role, TransportEvent, DEFAULT_PORT};
}
