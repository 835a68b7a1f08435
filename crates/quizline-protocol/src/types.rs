//! Wire types: the envelope every frame carries and the typed payloads
//! inside it.
//!
//! On the wire an envelope looks like:
//!
//! ```text
//! {"type":"answer","data":{"playerName":"Alice","answer":2},"sender":"Alice"}
//! ```
//!
//! `data` is kept as a loose JSON object so an envelope can be relayed or
//! logged without knowing its payload. [`Envelope::message`] turns it into
//! the typed [`Message`] when a receiver actually acts on it.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The `type` tag of an envelope.
///
/// Serialized in `snake_case`: `JoinGame` travels as `"join_game"`.
/// An unknown tag fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Participant → host: "add me to the game".
    JoinGame,
    /// Host → participants: the game has started.
    StartGame,
    /// Participant → host: a choice for the current question.
    Answer,
    /// Host → participants: the host advanced to the next question.
    NextQuestion,
    /// Host → participants: correctness and scores for the question just
    /// closed.
    ShowResults,
}

impl MessageType {
    /// The tag exactly as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinGame => "join_game",
            Self::StartGame => "start_game",
            Self::Answer => "answer",
            Self::NextQuestion => "next_question",
            Self::ShowResults => "show_results",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `join_game` data: `{ "playerName": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGame {
    pub player_name: String,
}

/// `start_game` data: `{}` or `{ "theme": "Science" }`.
///
/// The theme is optional so a bare `{}` stays valid; a participant that
/// receives no theme keeps the one it was configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

/// `answer` data: `{ "playerName": "...", "answer": 2 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub player_name: String,
    pub answer: usize,
}

/// `show_results` data.
///
/// `scores` is a list of `[name, score]` pairs rather than an object so
/// the host's join order survives the trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowResults {
    pub results: BTreeMap<String, bool>,
    pub scores: Vec<(String, u32)>,
}

/// A decoded envelope with its payload checked against its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    JoinGame(JoinGame),
    StartGame(StartGame),
    Answer(Answer),
    NextQuestion,
    ShowResults(ShowResults),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit exchanged on the wire. One envelope per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// What kind of message this is.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Type-specific key/value payload. Missing `data` decodes as `{}`.
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Self-reported identity of whoever built the envelope.
    #[serde(default)]
    pub sender: String,
}

impl Envelope {
    /// Builds an envelope whose `data` is `payload` serialized as a JSON
    /// object.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if the payload fails to serialize, or
    /// [`ProtocolError::InvalidMessage`] if it is not an object.
    pub fn new<T: Serialize>(
        kind: MessageType,
        sender: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let data = match serde_json::to_value(payload)
            .map_err(ProtocolError::Encode)?
        {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "{kind} payload must be an object, got {other}"
                )));
            }
        };
        Ok(Self {
            kind,
            data,
            sender: sender.into(),
        })
    }

    /// Builds an envelope with an empty `data` map.
    pub fn bare(kind: MessageType, sender: impl Into<String>) -> Self {
        Self {
            kind,
            data: Map::new(),
            sender: sender.into(),
        }
    }

    /// `join_game` sent by `player_name`.
    pub fn join_game(player_name: &str) -> Self {
        let mut data = Map::new();
        data.insert("playerName".into(), Value::from(player_name));
        Self {
            kind: MessageType::JoinGame,
            data,
            sender: player_name.to_string(),
        }
    }

    /// `start_game`, optionally naming the theme the host picked.
    pub fn start_game(sender: &str, theme: Option<&str>) -> Self {
        let mut envelope = Self::bare(MessageType::StartGame, sender);
        if let Some(theme) = theme {
            envelope.data.insert("theme".into(), Value::from(theme));
        }
        envelope
    }

    /// `answer` carrying `choice` for `player_name`.
    pub fn answer(player_name: &str, choice: usize) -> Self {
        let mut data = Map::new();
        data.insert("playerName".into(), Value::from(player_name));
        data.insert("answer".into(), Value::from(choice));
        Self {
            kind: MessageType::Answer,
            data,
            sender: player_name.to_string(),
        }
    }

    /// `next_question`.
    pub fn next_question(sender: &str) -> Self {
        Self::bare(MessageType::NextQuestion, sender)
    }

    /// `show_results` revealing the host's evaluation of a question.
    pub fn show_results(
        sender: &str,
        results: &ShowResults,
    ) -> Result<Self, ProtocolError> {
        Self::new(MessageType::ShowResults, sender, results)
    }

    /// Deserializes `data` into a payload struct.
    ///
    /// # Errors
    /// [`ProtocolError::Payload`] if `data` doesn't have the shape of `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(
            |source| ProtocolError::Payload {
                kind: self.kind,
                source,
            },
        )
    }

    /// Interprets the envelope according to its `type`.
    pub fn message(&self) -> Result<Message, ProtocolError> {
        Ok(match self.kind {
            MessageType::JoinGame => Message::JoinGame(self.payload()?),
            MessageType::StartGame => Message::StartGame(self.payload()?),
            MessageType::Answer => Message::Answer(self.payload()?),
            MessageType::NextQuestion => Message::NextQuestion,
            MessageType::ShowResults => {
                Message::ShowResults(self.payload()?)
            }
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
