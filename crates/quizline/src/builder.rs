//! `QuizBuilder`: configures and starts a host or participant node.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use quizline_protocol::{Codec, Envelope, JsonLineCodec};
use quizline_session::{CodeGenerator, RandomCodes, Session, SessionConfig, Theme};
use quizline_tick::{Countdown, CountdownConfig};
use quizline_transport::{HostTransport, ParticipantTransport, Transport, TransportConfig};
use rand::Rng;

use crate::{QuizError, QuizHandle};

/// Builder for a quiz node.
///
/// # Example
///
/// ```rust,no_run
/// use quizline::prelude::*;
///
/// # async fn demo() -> Result<(), QuizError> {
/// let host = QuizBuilder::new().theme(Theme::Sport).host().await?;
/// let port = host.local_addr().map(|a| a.port()).unwrap_or(DEFAULT_PORT);
///
/// let _player = QuizBuilder::new()
///     .player_name("Alice")
///     .port(port)
///     .join("127.0.0.1")
///     .await?;
/// host.start_game()?;
/// # Ok(())
/// # }
/// ```
pub struct QuizBuilder {
    transport: TransportConfig,
    session: SessionConfig,
    countdown: CountdownConfig,
    theme: Theme,
    player_name: Option<String>,
    code: Option<String>,
    codes: Box<dyn CodeGenerator>,
}

impl QuizBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            countdown: CountdownConfig::default(),
            theme: Theme::default(),
            player_name: None,
            code: None,
            codes: Box::new(RandomCodes),
        }
    }

    /// Port to listen on (host) or connect to (participant).
    pub fn port(mut self, port: u16) -> Self {
        self.transport.port = port;
        self
    }

    /// Question set. The host announces it when the game starts, so for a
    /// participant this is only the starting guess.
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// The name this node plays under. A host with a name takes part in
    /// its own game; a participant without one gets a random name.
    pub fn player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    /// Game code a participant was given. Only shown back in snapshots.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Seconds each question stays open.
    pub fn countdown_secs(mut self, secs: u32) -> Self {
        self.session.countdown_secs = secs;
        self
    }

    /// Length of one countdown second. Shortened in tests.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.countdown.interval = interval;
        self
    }

    /// How long a participant waits to connect.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    /// Source of game codes for a host.
    pub fn codes(mut self, codes: impl CodeGenerator + 'static) -> Self {
        self.codes = Box::new(codes);
        self
    }

    /// Replaces the whole transport configuration.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Hosts a game on every interface at the configured port.
    ///
    /// # Errors
    /// [`QuizError::Transport`] if no port could be bound.
    pub async fn host(self) -> Result<QuizHandle, QuizError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.transport.port));
        self.host_on(addr).await
    }

    /// Hosts a game on a specific address, e.g. `127.0.0.1:0`.
    ///
    /// # Errors
    /// [`QuizError::Transport`] if no port could be bound.
    pub async fn host_on(self, addr: SocketAddr) -> Result<QuizHandle, QuizError> {
        let transport = HostTransport::bind_addr(addr).await?;

        let mut session = Session::new(self.session).with_code_generator(self.codes);
        session.create_game(self.theme);
        if let Some(name) = &self.player_name {
            session.add_player(name);
        }
        tracing::info!(
            code = %session.code(),
            addr = ?transport.local_addr(),
            "hosting game"
        );

        Ok(QuizHandle::spawn(
            transport,
            session,
            Countdown::new(self.countdown),
            self.player_name,
        ))
    }

    /// Joins the game hosted at `host` on the configured port.
    ///
    /// # Errors
    /// [`QuizError::Transport`] if the connection is refused or times out.
    pub async fn join(self, host: &str) -> Result<QuizHandle, QuizError> {
        let mut transport =
            ParticipantTransport::connect(host, self.transport.port, self.transport.connect_timeout)
                .await?;

        let name = self.player_name.unwrap_or_else(random_player_name);
        let mut session = Session::new(self.session);
        session.join_game(self.code.as_deref().unwrap_or_default(), self.theme);
        session.add_player(&name);

        let hello = JsonLineCodec.encode(&Envelope::join_game(&name))?;
        transport.send(&hello).await?;
        tracing::info!(player = %name, host, port = self.transport.port, "joined game");

        Ok(QuizHandle::spawn(
            transport,
            session,
            Countdown::new(self.countdown),
            Some(name),
        ))
    }
}

impl Default for QuizBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `player_XXXX` with four random digits.
fn random_player_name() -> String {
    format!("player_{:04}", rand::rng().random_range(0..10_000u32))
}
