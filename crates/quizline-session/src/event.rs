//! Observable session events and where they go.

use crate::Question;

/// Something the session wants the outside world to know about.
///
/// Events are emitted synchronously from inside the operation that
/// caused them, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A host created a game with this code.
    Created { code: String },
    PlayerJoined { player: String },
    PlayerLeft { player: String },
    GameStarted,
    /// A new question is active. `index` is zero-based.
    QuestionChanged {
        question: Question,
        index: usize,
        total: usize,
    },
    AnswerSubmitted { player: String, choice: usize },
    /// Every active participant answered before the countdown ran out.
    AllAnswersReceived,
    /// Per-participant correctness for the question just closed, in join
    /// order.
    ResultsReady { results: Vec<(String, bool)> },
    GameEnded { winner: Winner },
    /// Seconds left on the current question.
    CountdownTick { seconds_left: u32 },
}

/// The outcome of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    /// Nobody ever joined.
    NoWinner,
    Player { name: String, score: u32 },
}

impl Winner {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::NoWinner => None,
            Self::Player { name, .. } => Some(name),
        }
    }
}

/// Receives [`SessionEvent`]s as the session emits them.
pub trait EventSink {
    fn emit(&mut self, event: SessionEvent);
}

/// Collects events for the caller to drain.
impl EventSink for Vec<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// Discards every event.
impl EventSink for () {
    fn emit(&mut self, _event: SessionEvent) {}
}
