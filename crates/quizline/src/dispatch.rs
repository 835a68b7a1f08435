//! Role-based routing of inbound envelopes, and the host's outbound
//! announcements.
//!
//! | type            | host                   | participant            |
//! |-----------------|------------------------|------------------------|
//! | `join_game`     | add player             | ignored                |
//! | `start_game`    | ignored                | mirror start           |
//! | `answer`        | submit sender's answer | ignored                |
//! | `next_question` | ignored                | mirror next question   |
//! | `show_results`  | ignored                | adopt results & scores |

use quizline_protocol::{Envelope, MessageType, ProtocolError, ShowResults};
use quizline_session::{SessionEvent, Theme};
use quizline_transport::Role;

/// What the node should do with an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    AddPlayer { name: String },
    SubmitAnswer { name: String, choice: usize },
    /// `theme` is `None` when the host didn't name one or named one this
    /// build doesn't know.
    StartGame { theme: Option<Theme> },
    NextQuestion,
    ApplyResults(ShowResults),
    /// The envelope doesn't apply to this role.
    Ignore,
}

/// Looks up what `envelope` means for a node playing `role`.
///
/// Payloads are only parsed for messages the role acts on, so a
/// malformed message of an ignored type is still just ignored.
///
/// # Errors
/// [`ProtocolError::Payload`] if an envelope this role acts on has a
/// `data` map of the wrong shape.
pub(crate) fn route(role: Role, envelope: &Envelope) -> Result<Action, ProtocolError> {
    let action = match (role, envelope.kind) {
        (Role::Host, MessageType::JoinGame) => {
            let join: quizline_protocol::JoinGame = envelope.payload()?;
            if join.player_name.is_empty() {
                Action::Ignore
            } else {
                Action::AddPlayer {
                    name: join.player_name,
                }
            }
        }
        (Role::Host, MessageType::Answer) => {
            let answer: quizline_protocol::Answer = envelope.payload()?;
            if envelope.sender.is_empty() || envelope.sender != answer.player_name {
                tracing::debug!(
                    sender = %envelope.sender,
                    player = %answer.player_name,
                    "answer names a player other than its sender"
                );
                Action::Ignore
            } else {
                Action::SubmitAnswer {
                    name: envelope.sender.clone(),
                    choice: answer.answer,
                }
            }
        }
        (Role::Participant, MessageType::StartGame) => {
            let start: quizline_protocol::StartGame = envelope.payload()?;
            let theme = start.theme.and_then(|name| match name.parse() {
                Ok(theme) => Some(theme),
                Err(e) => {
                    tracing::debug!(error = %e, "start_game names an unknown theme");
                    None
                }
            });
            Action::StartGame { theme }
        }
        (Role::Participant, MessageType::NextQuestion) => Action::NextQuestion,
        (Role::Participant, MessageType::ShowResults) => {
            Action::ApplyResults(envelope.payload()?)
        }
        (
            Role::Host,
            MessageType::StartGame | MessageType::NextQuestion | MessageType::ShowResults,
        )
        | (Role::Participant, MessageType::JoinGame | MessageType::Answer) => Action::Ignore,
    };
    Ok(action)
}

/// The broadcast a host owes its participants for one of its own
/// session events, if any.
///
/// `scores` is the host's score table at the time of the event; only
/// `ResultsReady` uses it.
pub(crate) fn announce(
    sender: &str,
    event: &SessionEvent,
    theme: Theme,
    scores: &[(String, u32)],
) -> Option<Envelope> {
    match event {
        SessionEvent::GameStarted => Some(Envelope::start_game(sender, Some(theme.as_str()))),
        SessionEvent::QuestionChanged { index, .. } if *index > 0 => {
            Some(Envelope::next_question(sender))
        }
        SessionEvent::GameEnded { .. } => Some(Envelope::next_question(sender)),
        SessionEvent::ResultsReady { results } => {
            let reveal = ShowResults {
                results: results.iter().cloned().collect(),
                scores: scores.to_vec(),
            };
            match Envelope::show_results(sender, &reveal) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build show_results");
                    None
                }
            }
        }
        _ => None,
    }
}
