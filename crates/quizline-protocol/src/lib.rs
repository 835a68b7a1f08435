//! Wire protocol for Quizline.
//!
//! - **Types** ([`Envelope`], [`MessageType`], [`Message`] and the payload
//!   structs): what travels between host and participants.
//! - **Codec** ([`Codec`] trait, [`JsonLineCodec`]): one envelope per
//!   newline-terminated JSON frame.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding. None of it is fatal to a connection.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Dispatcher → Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonLineCodec, FRAME_TERMINATOR};
pub use error::ProtocolError;
pub use types::{
    Answer, Envelope, JoinGame, Message, MessageType, ShowResults, StartGame,
};
