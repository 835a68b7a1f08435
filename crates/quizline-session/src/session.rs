//! The quiz session state machine.
//!
//! ```text
//!            start_game                 all answered / countdown hits 0
//!   Waiting ───────────→ QuestionActive ──────────────────────────────→ ShowingResults
//!                             ↑                                               │
//!                             └──────────── next_question (more left) ───────┘
//!                                                                             │
//!                                   Finished ←── next_question (none left) ──┘
//! ```
//!
//! A session runs in one of two roles. The *host* is authoritative: it
//! scores answers, decides when a question closes and picks the winner.
//! A *participant* session mirrors the host. It follows the host's
//! start / next / results announcements and never scores locally.

use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::question::EMPTY_QUESTION;
use crate::{CodeGenerator, EventSink, Question, RandomCodes, SessionEvent, Theme, Winner};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Seconds a question stays open. Default: 10.
    pub countdown_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { countdown_secs: 10 }
    }
}

impl SessionConfig {
    /// Clamp out-of-range values. A zero-second countdown becomes one.
    pub fn validated(mut self) -> Self {
        if self.countdown_secs == 0 {
            self.countdown_secs = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Where the game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    /// Created or joined, not started yet.
    #[default]
    Waiting,
    /// A question is open and answers are accepted.
    QuestionActive,
    /// The last question is closed and its results are out.
    ShowingResults,
    /// Every question has been played.
    Finished,
}

/// A player as the session tracks them.
///
/// Players who leave stay in the table, marked inactive, so their
/// score still counts toward the winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub score: u32,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One quiz game, from creation to the final winner.
///
/// All operations are synchronous and never fail. Anything that doesn't
/// apply in the current state is ignored. Observable changes go to the
/// session's [`EventSink`].
pub struct Session<S = Vec<SessionEvent>> {
    config: SessionConfig,
    codes: Box<dyn CodeGenerator>,
    sink: S,

    code: String,
    theme: Theme,
    is_host: bool,
    state: GameState,

    questions: Vec<Question>,
    current: usize,
    /// Join order. Names are unique.
    participants: Vec<Participant>,
    pending: HashMap<String, usize>,

    seconds_left: u32,
    /// Bumped every time a question opens; ticks tagged with an older
    /// epoch are ignored.
    epoch: u64,
}

impl Session<Vec<SessionEvent>> {
    /// A session that collects its events in a `Vec`.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_sink(config, Vec::new())
    }

    /// Take every event emitted since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.sink)
    }
}

impl Default for Session<Vec<SessionEvent>> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<S: EventSink> Session<S> {
    /// A session that sends its events to `sink`.
    pub fn with_sink(config: SessionConfig, sink: S) -> Self {
        Self {
            config: config.validated(),
            codes: Box::new(RandomCodes),
            sink,
            code: String::new(),
            theme: Theme::default(),
            is_host: false,
            state: GameState::Waiting,
            questions: Vec::new(),
            current: 0,
            participants: Vec::new(),
            pending: HashMap::new(),
            seconds_left: 0,
            epoch: 0,
        }
    }

    /// Replace the code generator used by [`create_game`](Self::create_game).
    pub fn with_code_generator(mut self, codes: impl CodeGenerator + 'static) -> Self {
        self.codes = Box::new(codes);
        self
    }

    // -- Setup -------------------------------------------------------------

    /// Start a fresh game as host with a new code.
    pub fn create_game(&mut self, theme: Theme) {
        let code = self.codes.next_code();
        self.reset(code.clone(), theme, true);
        info!(code = %code, %theme, "game created");
        self.sink.emit(SessionEvent::Created { code });
    }

    /// Start a fresh game as participant, mirroring the host's `code`.
    ///
    /// The theme is a best guess until the host's `start_game`
    /// announcement names the real one.
    pub fn join_game(&mut self, code: &str, theme: Theme) {
        self.reset(code.to_string(), theme, false);
        info!(code, %theme, "joined game");
    }

    fn reset(&mut self, code: String, theme: Theme, is_host: bool) {
        self.code = code;
        self.theme = theme;
        self.is_host = is_host;
        self.state = GameState::Waiting;
        self.questions = theme.questions();
        self.current = 0;
        self.participants.clear();
        self.pending.clear();
        self.seconds_left = 0;
        // `epoch` keeps counting so ticks from a previous game stay stale.
    }

    /// Switch to another question set. Only before the game starts.
    pub fn set_theme(&mut self, theme: Theme) {
        if self.state != GameState::Waiting {
            trace!(%theme, state = ?self.state, "theme change ignored");
            return;
        }
        if theme != self.theme {
            debug!(from = %self.theme, to = %theme, "theme changed");
        }
        self.theme = theme;
        self.questions = theme.questions();
    }

    // -- Players -----------------------------------------------------------

    /// Register a player with a zero score. Adding a known name, active
    /// or not, does nothing.
    pub fn add_player(&mut self, name: &str) {
        if self.participant(name).is_some() {
            trace!(player = name, "player already known");
            return;
        }
        self.participants.push(Participant {
            name: name.to_string(),
            score: 0,
            active: true,
        });
        info!(player = name, players = self.participants.len(), "player joined");
        self.sink.emit(SessionEvent::PlayerJoined {
            player: name.to_string(),
        });
    }

    /// Mark a player as gone. Their score is kept; their pending answer
    /// is dropped and they no longer hold up the current question.
    pub fn remove_player(&mut self, name: &str) {
        let Some(participant) = self
            .participants
            .iter_mut()
            .find(|p| p.name == name && p.active)
        else {
            trace!(player = name, "remove ignored, not an active player");
            return;
        };
        participant.active = false;
        self.pending.remove(name);
        info!(player = name, "player left");
        self.sink.emit(SessionEvent::PlayerLeft {
            player: name.to_string(),
        });

        if self.state == GameState::QuestionActive {
            self.close_if_all_answered();
        }
    }

    // -- Game flow ---------------------------------------------------------

    /// Open the first question.
    ///
    /// The host needs at least one active player. A participant mirror
    /// starts whenever the host says so.
    pub fn start_game(&mut self) {
        if self.state != GameState::Waiting {
            trace!(state = ?self.state, "start ignored");
            return;
        }
        if self.is_host && self.active_count() == 0 {
            debug!("start ignored, no players");
            return;
        }
        if self.questions.is_empty() {
            debug!("start ignored, no questions");
            return;
        }
        info!(
            code = %self.code,
            theme = %self.theme,
            players = self.active_count(),
            "game started"
        );
        self.current = 0;
        self.sink.emit(SessionEvent::GameStarted);
        self.open_question();
    }

    /// Record `name`'s answer to the open question.
    ///
    /// First answer wins; later ones from the same player are ignored,
    /// as are answers from unknown or departed players.
    pub fn submit_answer(&mut self, name: &str, choice: usize) {
        if self.state != GameState::QuestionActive {
            trace!(player = name, state = ?self.state, "answer ignored");
            return;
        }
        if !self.participant(name).is_some_and(|p| p.active) {
            debug!(player = name, "answer ignored, not an active player");
            return;
        }
        if self.pending.contains_key(name) {
            trace!(player = name, "answer ignored, already answered");
            return;
        }
        self.pending.insert(name.to_string(), choice);
        debug!(player = name, choice, "answer recorded");
        self.sink.emit(SessionEvent::AnswerSubmitted {
            player: name.to_string(),
            choice,
        });

        self.close_if_all_answered();
    }

    /// Move past the results to the next question, or finish the game.
    ///
    /// The host advances only from `ShowingResults`. A participant also
    /// accepts it during `QuestionActive`, in case it never saw results.
    pub fn next_question(&mut self) {
        let allowed = match self.state {
            GameState::ShowingResults => true,
            GameState::QuestionActive => !self.is_host,
            _ => false,
        };
        if !allowed {
            trace!(state = ?self.state, "next question ignored");
            return;
        }

        self.current += 1;
        if self.current >= self.questions.len() {
            self.current = self.questions.len();
            self.state = GameState::Finished;
            self.seconds_left = 0;
            let winner = self.winner();
            info!(code = %self.code, ?winner, "game ended");
            self.sink.emit(SessionEvent::GameEnded { winner });
        } else {
            self.open_question();
        }
    }

    /// One countdown second elapsed for the question opened at `epoch`.
    ///
    /// Ticks for anything but the open question are ignored. When the
    /// count reaches zero the host closes the question; a participant
    /// holds at zero until the host's results arrive.
    pub fn countdown_tick(&mut self, epoch: u64) {
        if self.state != GameState::QuestionActive || epoch != self.epoch {
            trace!(epoch, current = self.epoch, "stale tick ignored");
            return;
        }
        if self.seconds_left == 0 {
            return;
        }
        self.seconds_left -= 1;
        self.sink.emit(SessionEvent::CountdownTick {
            seconds_left: self.seconds_left,
        });

        if self.seconds_left == 0 && self.is_host {
            debug!(question = self.current, "time up");
            self.show_results();
        }
    }

    /// `seconds` countdown seconds elapsed at once, as when ticks were
    /// delivered late. Applies [`countdown_tick`](Self::countdown_tick)
    /// once per second and stops as soon as the question closes.
    pub fn countdown_elapsed(&mut self, epoch: u64, seconds: u64) {
        for _ in 0..seconds {
            if self.countdown_epoch() != Some(epoch) {
                break;
            }
            self.countdown_tick(epoch);
        }
    }

    /// Adopt the host's verdict for the open question.
    ///
    /// `results` is per-player correctness, `scores` the host's running
    /// totals. Local scores only ever move up. Host sessions ignore this.
    pub fn apply_results(&mut self, results: &[(String, bool)], scores: &[(String, u32)]) {
        if self.is_host {
            trace!("apply results ignored on host");
            return;
        }
        if !matches!(
            self.state,
            GameState::QuestionActive | GameState::ShowingResults
        ) {
            trace!(state = ?self.state, "apply results ignored");
            return;
        }

        for (name, score) in scores {
            match self.participants.iter_mut().find(|p| &p.name == name) {
                Some(p) => p.score = p.score.max(*score),
                None => self.participants.push(Participant {
                    name: name.clone(),
                    score: *score,
                    active: true,
                }),
            }
        }

        self.state = GameState::ShowingResults;
        self.pending.clear();
        let ordered = self
            .participants
            .iter()
            .filter_map(|p| {
                results
                    .iter()
                    .find(|(name, _)| *name == p.name)
                    .map(|(name, correct)| (name.clone(), *correct))
            })
            .collect();
        self.sink.emit(SessionEvent::ResultsReady { results: ordered });
    }

    fn open_question(&mut self) {
        self.pending.clear();
        self.state = GameState::QuestionActive;
        self.epoch += 1;
        self.seconds_left = self.config.countdown_secs;
        info!(
            index = self.current,
            total = self.questions.len(),
            "question opened"
        );
        self.sink.emit(SessionEvent::QuestionChanged {
            question: self.questions[self.current].clone(),
            index: self.current,
            total: self.questions.len(),
        });
        self.sink.emit(SessionEvent::CountdownTick {
            seconds_left: self.seconds_left,
        });
    }

    fn close_if_all_answered(&mut self) {
        if !self.is_host {
            return;
        }
        let all_answered = self
            .participants
            .iter()
            .filter(|p| p.active)
            .all(|p| self.pending.contains_key(&p.name));
        if all_answered {
            debug!(question = self.current, "all answers in");
            self.sink.emit(SessionEvent::AllAnswersReceived);
            self.show_results();
        }
    }

    fn show_results(&mut self) {
        if self.state != GameState::QuestionActive {
            return;
        }
        self.state = GameState::ShowingResults;
        let correct_index = self.questions[self.current].correct_index;

        let mut results = Vec::with_capacity(self.participants.len());
        for p in &mut self.participants {
            let correct = self.pending.get(&p.name) == Some(&correct_index);
            if correct {
                p.score += 1;
            }
            results.push((p.name.clone(), correct));
        }
        info!(
            question = self.current,
            correct = results.iter().filter(|(_, c)| *c).count(),
            answered = self.pending.len(),
            "results ready"
        );
        self.sink.emit(SessionEvent::ResultsReady { results });
    }

    // -- Queries -----------------------------------------------------------

    /// The open question, or an empty one when the cursor is past the end.
    pub fn current_question(&self) -> &Question {
        self.questions.get(self.current).unwrap_or(&EMPTY_QUESTION)
    }

    /// The player with the strictly highest score; ties go to whoever
    /// joined first.
    pub fn winner(&self) -> Winner {
        let mut best: Option<&Participant> = None;
        for p in &self.participants {
            if best.is_none_or(|b| p.score > b.score) {
                best = Some(p);
            }
        }
        match best {
            Some(p) => Winner::Player {
                name: p.name.clone(),
                score: p.score,
            },
            None => Winner::NoWinner,
        }
    }

    /// The epoch the countdown should be armed with, or `None` when it
    /// should be stopped.
    pub fn countdown_epoch(&self) -> Option<u64> {
        (self.state == GameState::QuestionActive && self.seconds_left > 0).then_some(self.epoch)
    }

    /// Current scores in join order, departed players included.
    pub fn scores(&self) -> Vec<(String, u32)> {
        self.participants
            .iter()
            .map(|p| (p.name.clone(), p.score))
            .collect()
    }

    pub fn score(&self, name: &str) -> Option<u32> {
        self.participant(name).map(|p| p.score)
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Names of players still in the game, in join order.
    pub fn players(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.active)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.active).count()
    }

    /// The answer `name` gave to the open question, if any.
    pub fn pending_answer(&self, name: &str) -> Option<usize> {
        self.pending.get(name).copied()
    }

    /// Every answer recorded for the open question.
    pub fn pending_answers(&self) -> &HashMap<String, usize> {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Zero-based index of the open question. Equals
    /// [`total_questions`](Self::total_questions) once finished.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedCodes;

    fn host() -> Session {
        let mut session =
            Session::new(SessionConfig::default()).with_code_generator(FixedCodes::new(["424242"]));
        session.create_game(Theme::Science);
        session.take_events();
        session
    }

    #[test]
    fn test_new_session_is_waiting_with_no_questions() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), GameState::Waiting);
        assert_eq!(session.total_questions(), 0);
        assert!(session.current_question().is_empty());
        assert_eq!(session.countdown_epoch(), None);
    }

    #[test]
    fn test_create_game_emits_created_with_code() {
        let mut session =
            Session::new(SessionConfig::default()).with_code_generator(FixedCodes::new(["424242"]));
        session.create_game(Theme::Sport);

        assert_eq!(
            session.take_events(),
            vec![SessionEvent::Created {
                code: "424242".into()
            }]
        );
        assert!(session.is_host());
        assert_eq!(session.theme(), Theme::Sport);
        assert_eq!(session.total_questions(), 5);
    }

    #[test]
    fn test_create_game_resets_previous_game() {
        let mut session = host();
        session.add_player("alice");
        session.start_game();

        session.create_game(Theme::Culture);

        assert_eq!(session.state(), GameState::Waiting);
        assert!(session.participants().is_empty());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn test_join_game_is_participant_and_silent() {
        let mut session = Session::new(SessionConfig::default());
        session.join_game("123456", Theme::Culture);

        assert!(!session.is_host());
        assert_eq!(session.code(), "123456");
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_zero_countdown_is_clamped_to_one() {
        let session = Session::new(SessionConfig { countdown_secs: 0 });
        assert_eq!(session.config().countdown_secs, 1);
    }

    #[test]
    fn test_set_theme_only_while_waiting() {
        let mut session = host();
        session.set_theme(Theme::Sport);
        assert_eq!(session.theme(), Theme::Sport);

        session.add_player("alice");
        session.start_game();
        session.set_theme(Theme::Culture);
        assert_eq!(session.theme(), Theme::Sport);
    }

    #[test]
    fn test_open_question_bumps_epoch() {
        let mut session = host();
        session.add_player("alice");
        session.start_game();
        let first = session.countdown_epoch().unwrap();

        session.submit_answer("alice", 0);
        assert_eq!(session.countdown_epoch(), None);
        session.next_question();

        assert!(session.countdown_epoch().unwrap() > first);
    }

    #[test]
    fn test_remove_unknown_player_is_silent() {
        let mut session = host();
        session.remove_player("ghost");
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_unit_sink_discards_events() {
        let mut session = Session::with_sink(SessionConfig::default(), ());
        session.create_game(Theme::Science);
        session.add_player("alice");
        assert_eq!(session.players(), vec!["alice"]);
    }
}
