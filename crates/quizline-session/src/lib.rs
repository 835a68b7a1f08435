//! Quiz session state machine for Quizline.
//!
//! This crate holds the game itself, with no I/O:
//!
//! 1. **Questions**: the fixed per-theme question bank ([`Theme`], [`Question`])
//! 2. **Game flow**: players, answers, scoring and results ([`Session`])
//! 3. **Codes**: the six-digit code a host shares ([`CodeGenerator`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Node runtime (above)  ← feeds commands, network messages and ticks in
//!     ↕
//! Session layer (this crate)  ← decides what happens, emits SessionEvents
//! ```
//!
//! Time is an input, not something the session owns: the runtime calls
//! [`Session::countdown_tick`] with the epoch from
//! [`Session::countdown_epoch`], so late ticks for a question that has
//! already closed are recognized and dropped.

mod codes;
mod error;
mod event;
mod question;
mod session;

pub use codes::{CodeGenerator, FixedCodes, RandomCodes, is_valid_code};
pub use error::SessionError;
pub use event::{EventSink, SessionEvent, Winner};
pub use question::{Question, Theme};
pub use session::{GameState, Participant, Session, SessionConfig};
