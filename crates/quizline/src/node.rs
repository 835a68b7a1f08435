//! The node actor: one task that owns the session, the transport and the
//! countdown, and the handle used to talk to it.
//!
//! Everything that changes game state happens inside [`Node::run`], one
//! input at a time:
//!
//! ```text
//!   QuizHandle ──Command──┐
//!   Transport ──event─────┼──→ select! ──→ Session ──SessionEvent──→ QuizEvent channel
//!   Countdown ──tick──────┘                   │
//!                                             └──(host) announcement──→ Transport
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;

use quizline_protocol::{Codec, Envelope, JsonLineCodec};
use quizline_session::{
    GameState, Question, Session, SessionEvent, Theme, Winner,
};
use quizline_tick::Countdown;
use quizline_transport::{ConnectionId, Role, Transport, TransportEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{self, Action};
use crate::QuizError;

/// Sender name the host uses when it has no player name of its own.
pub(crate) const HOST_SENDER: &str = "host";

/// Everything a node reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    Session(SessionEvent),
    Transport(TransportEvent),
}

/// A point-in-time copy of a node's game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub role: Role,
    pub code: String,
    pub theme: Theme,
    pub state: GameState,
    /// Players still in the game, in join order.
    pub players: Vec<String>,
    /// Every player ever seen, in join order, with their score.
    pub scores: Vec<(String, u32)>,
    pub question: Question,
    pub question_index: usize,
    pub total_questions: usize,
    pub seconds_left: u32,
    /// Set once the game has finished.
    pub winner: Option<Winner>,
}

pub(crate) enum Command {
    StartGame,
    SubmitAnswer(usize),
    NextQuestion,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

pub(crate) struct Node<T: Transport> {
    transport: T,
    transport_open: bool,
    session: Session,
    countdown: Countdown,
    codec: JsonLineCodec,
    /// This node's own player name, if it plays.
    name: Option<String>,
    /// Which player each host connection announced itself as.
    players_by_conn: HashMap<ConnectionId, String>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<QuizEvent>,
}

impl<T: Transport> Node<T> {
    pub(crate) fn new(
        transport: T,
        session: Session,
        countdown: Countdown,
        name: Option<String>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<QuizEvent>,
    ) -> Self {
        Self {
            transport,
            transport_open: true,
            session,
            countdown,
            codec: JsonLineCodec,
            name,
            players_by_conn: HashMap::new(),
            commands,
            events,
        }
    }

    fn sender(&self) -> &str {
        self.name.as_deref().unwrap_or(HOST_SENDER)
    }

    /// Runs until shut down or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(role = %T::ROLE, code = %self.session.code(), "quiz node running");
        // Setup may already have produced events (Created, own PlayerJoined).
        self.flush().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = self.transport.next_event(), if self.transport_open => match event {
                    Some(event) => self.handle_transport(event).await,
                    None => {
                        debug!("transport closed");
                        self.transport_open = false;
                    }
                },
                tick = self.countdown.wait_for_tick() => {
                    trace!(
                        epoch = tick.epoch,
                        tick = tick.tick,
                        skipped = tick.skipped,
                        "countdown tick"
                    );
                    self.session.countdown_elapsed(tick.epoch, tick.skipped + 1);
                }
            }

            self.flush().await;
            self.countdown.sync(self.session.countdown_epoch());
        }

        self.countdown.disarm();
        self.transport.shutdown().await;
        info!(role = %T::ROLE, "quiz node stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match (T::ROLE, command) {
            (Role::Host, Command::StartGame) => self.session.start_game(),
            (Role::Host, Command::NextQuestion) => self.session.next_question(),
            (Role::Host, Command::SubmitAnswer(choice)) => match self.name.clone() {
                Some(name) => self.session.submit_answer(&name, choice),
                None => debug!("host has no player name, answer ignored"),
            },
            (Role::Participant, Command::SubmitAnswer(choice)) => {
                self.send_answer(choice).await;
            }
            (Role::Participant, Command::StartGame | Command::NextQuestion) => {
                trace!("participant cannot drive the game, command ignored");
            }
            (_, Command::Snapshot(reply)) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            (_, Command::Shutdown) => {}
        }
    }

    async fn send_answer(&mut self, choice: usize) {
        let Some(name) = self.name.clone() else {
            return;
        };
        if self.session.state() != GameState::QuestionActive
            || self.session.pending_answer(&name).is_some()
        {
            trace!(player = %name, choice, "answer not sent");
            return;
        }
        // Mirrors the pending answer locally; scoring stays with the host.
        self.session.submit_answer(&name, choice);
        self.send(&Envelope::answer(&name, choice)).await;
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match &event {
            TransportEvent::Frame { id, frame } => {
                self.handle_frame(*id, frame).await;
                return;
            }
            TransportEvent::Disconnected { id } => self.handle_disconnect(*id),
            TransportEvent::Listening { .. }
            | TransportEvent::Connected { .. }
            | TransportEvent::Error { .. } => {}
        }
        let _ = self.events.send(QuizEvent::Transport(event));
    }

    async fn handle_frame(&mut self, id: ConnectionId, frame: &[u8]) {
        let envelope: Envelope = match self.codec.decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%id, error = %e, "discarding undecodable frame");
                return;
            }
        };
        let action = match dispatch::route(T::ROLE, &envelope) {
            Ok(action) => action,
            Err(e) => {
                debug!(%id, kind = %envelope.kind, error = %e, "discarding malformed message");
                return;
            }
        };

        match action {
            Action::AddPlayer { name } => {
                if let Some(bound) = self.players_by_conn.get(&id) {
                    debug!(
                        %id,
                        player = %bound,
                        requested = %name,
                        "connection already joined, join ignored"
                    );
                    return;
                }
                if self.name.as_deref() == Some(name.as_str()) {
                    debug!(%id, player = %name, "join under the host's own name ignored");
                    return;
                }
                let known = self.session.participant(&name).is_some();
                self.players_by_conn.insert(id, name.clone());
                self.session.add_player(&name);
                if !known {
                    self.catch_up(id).await;
                }
            }
            Action::SubmitAnswer { name, choice } => {
                self.session.submit_answer(&name, choice);
            }
            Action::StartGame { theme } => {
                if let Some(theme) = theme {
                    self.session.set_theme(theme);
                }
                self.session.start_game();
            }
            Action::NextQuestion => self.session.next_question(),
            Action::ApplyResults(reveal) => {
                let results: Vec<(String, bool)> = reveal.results.into_iter().collect();
                self.session.apply_results(&results, &reveal.scores);
            }
            Action::Ignore => {
                trace!(%id, kind = %envelope.kind, role = %T::ROLE, "message ignored");
            }
        }
    }

    /// Brings a player who joined mid-game to the open question.
    async fn catch_up(&mut self, id: ConnectionId) {
        if !matches!(
            self.session.state(),
            GameState::QuestionActive | GameState::ShowingResults
        ) {
            return;
        }
        let sender = self.sender().to_string();
        let mut backlog = vec![Envelope::start_game(&sender, Some(self.session.theme().as_str()))];
        backlog.extend(
            (0..self.session.current_index()).map(|_| Envelope::next_question(&sender)),
        );
        debug!(%id, question = self.session.current_index(), "catching up late joiner");

        for envelope in backlog {
            let frame = match self.codec.encode(&envelope) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "failed to encode catch-up message");
                    return;
                }
            };
            if let Err(e) = self.transport.send_to(id, &frame).await {
                debug!(%id, error = %e, "catch-up send failed");
                return;
            }
        }
    }

    fn handle_disconnect(&mut self, id: ConnectionId) {
        let Some(name) = self.players_by_conn.remove(&id) else {
            return;
        };
        // Another connection, or the host itself, may hold the same name.
        if self.name.as_deref() == Some(name.as_str())
            || self.players_by_conn.values().any(|other| *other == name)
        {
            return;
        }
        self.session.remove_player(&name);
    }

    /// Forwards pending session events to the owner and, on the host,
    /// broadcasts the matching announcements.
    async fn flush(&mut self) {
        for event in self.session.take_events() {
            if T::ROLE == Role::Host {
                let scores = self.session.scores();
                let announcement =
                    dispatch::announce(self.sender(), &event, self.session.theme(), &scores);
                if let Some(envelope) = announcement {
                    self.send(&envelope).await;
                }
            }
            let _ = self.events.send(QuizEvent::Session(event));
        }
    }

    async fn send(&mut self, envelope: &Envelope) {
        if !self.transport_open {
            return;
        }
        let frame = match self.codec.encode(envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "failed to encode message");
                return;
            }
        };
        if let Err(e) = self.transport.send(&frame).await {
            warn!(kind = %envelope.kind, error = %e, "send failed");
        }
    }

    fn snapshot(&self) -> Snapshot {
        let session = &self.session;
        Snapshot {
            role: T::ROLE,
            code: session.code().to_string(),
            theme: session.theme(),
            state: session.state(),
            players: session.players().into_iter().map(String::from).collect(),
            scores: session.scores(),
            question: session.current_question().clone(),
            question_index: session.current_index(),
            total_questions: session.total_questions(),
            seconds_left: session.seconds_left(),
            winner: (session.state() == GameState::Finished).then(|| session.winner()),
        }
    }
}

// ---------------------------------------------------------------------------
// QuizHandle
// ---------------------------------------------------------------------------

/// The owner's side of a running node.
///
/// Commands are fire-and-forget; their effects show up as
/// [`QuizEvent`]s. Dropping the handle stops the node.
pub struct QuizHandle {
    role: Role,
    player_name: Option<String>,
    local_addr: Option<SocketAddr>,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<QuizEvent>,
    task: Option<JoinHandle<()>>,
}

impl QuizHandle {
    /// Spawns `node` and returns its handle.
    pub(crate) fn spawn<T: Transport>(
        transport: T,
        session: Session,
        countdown: Countdown,
        player_name: Option<String>,
    ) -> Self {
        let local_addr = transport.local_addr();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let node = Node::new(
            transport,
            session,
            countdown,
            player_name.clone(),
            command_rx,
            event_tx,
        );
        let task = tokio::spawn(node.run());

        Self {
            role: T::ROLE,
            player_name,
            local_addr,
            commands: command_tx,
            events: event_rx,
            task: Some(task),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    /// The local address of the node's transport. For a host, the
    /// address participants connect to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Start the game. Host only; a participant ignores it.
    pub fn start_game(&self) -> Result<(), QuizError> {
        self.command(Command::StartGame)
    }

    /// Answer the open question as this node's player.
    pub fn submit_answer(&self, choice: usize) -> Result<(), QuizError> {
        self.command(Command::SubmitAnswer(choice))
    }

    /// Move on from the results. Host only; a participant ignores it.
    pub fn next_question(&self) -> Result<(), QuizError> {
        self.command(Command::NextQuestion)
    }

    /// A copy of the node's current game state.
    pub async fn snapshot(&self) -> Result<Snapshot, QuizError> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Snapshot(tx))?;
        rx.await.map_err(|_| QuizError::Stopped)
    }

    /// Waits for the next event. `None` once the node has stopped and
    /// every event has been received.
    pub async fn next_event(&mut self) -> Option<QuizEvent> {
        self.events.recv().await
    }

    /// Stops the node and waits for it to close its connections.
    /// Later commands fail with [`QuizError::Stopped`].
    pub async fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "quiz node task failed");
            }
        }
    }

    fn command(&self, command: Command) -> Result<(), QuizError> {
        self.commands.send(command).map_err(|_| QuizError::Stopped)
    }
}
