//! TCP implementations of both transport roles.
//!
//! Socket reads happen in background tasks that push [`Inbound`] items
//! into an unbounded channel. The owning [`HostTransport`] or
//! [`ParticipantTransport`] turns those into [`TransportEvent`]s inside
//! `next_event`, which is also the only place the connection registry
//! changes. On the host every connection gets its own writer task fed
//! by a queue, so a peer that stops reading only delays itself. The
//! participant writes directly to its single connection.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::{
    ConnectionId, FrameReader, Role, Transport, TransportError,
    TransportEvent,
};

/// How long a participant waits for its connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long one write may stall before the writer gives up on its peer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 4096;

/// What background tasks report to the owning transport.
enum Inbound {
    Accepted {
        id: ConnectionId,
        peer: SocketAddr,
        writer: OwnedWriteHalf,
    },
    Frame {
        id: ConnectionId,
        frame: Vec<u8>,
    },
    Closed {
        id: ConnectionId,
    },
    AcceptFailed(std::io::Error),
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Queue into one connection's writer task. Dropping it lets the task
/// finish what is queued and close the write half.
type Outbox = mpsc::UnboundedSender<Arc<[u8]>>;

/// The listening side. Accepts participants and broadcasts to them.
pub struct HostTransport {
    local_addr: SocketAddr,
    registry: HashMap<ConnectionId, Outbox>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    accept_task: Option<JoinHandle<()>>,
    pending: VecDeque<TransportEvent>,
}

impl HostTransport {
    /// Binds all interfaces on `port`.
    ///
    /// See [`bind_addr`](Self::bind_addr) for the fallback behavior.
    pub async fn bind(port: u16) -> Result<Self, TransportError> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
    }

    /// Binds `addr`. If that port is unavailable, retries the same IP on
    /// an ephemeral port; [`local_addr`](Transport::local_addr) and the
    /// first [`TransportEvent::Listening`] report where it ended up.
    ///
    /// # Errors
    /// [`TransportError::Bind`] if the fallback fails too.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) if addr.port() != 0 => {
                tracing::warn!(
                    %addr,
                    error = %e,
                    "requested port unavailable, falling back to an ephemeral port"
                );
                TcpListener::bind(SocketAddr::new(addr.ip(), 0))
                    .await
                    .map_err(TransportError::Bind)?
            }
            Err(e) => return Err(TransportError::Bind(e)),
        };
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;
        tracing::info!(addr = %local_addr, "host transport listening");

        let (tx, rx) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(listener, tx));

        Ok(Self {
            local_addr,
            registry: HashMap::new(),
            inbound: rx,
            accept_task: Some(accept_task),
            pending: VecDeque::from([TransportEvent::Listening {
                addr: local_addr,
            }]),
        })
    }

    /// Ids of every live connection, in ascending order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.registry.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    fn is_shut_down(&self) -> bool {
        self.accept_task.is_none()
    }
}

impl Transport for HostTransport {
    const ROLE: Role = Role::Host;

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            match self.inbound.recv().await? {
                Inbound::Accepted { id, peer, writer } => {
                    let (outbox, queue) = mpsc::unbounded_channel();
                    tokio::spawn(write_frames(id, writer, queue));
                    self.registry.insert(id, outbox);
                    tracing::info!(
                        %id,
                        %peer,
                        connections = self.registry.len(),
                        "accepted connection"
                    );
                    return Some(TransportEvent::Connected { id, peer });
                }
                Inbound::Frame { id, frame } => {
                    // Frames read just before a shutdown are dropped.
                    if self.registry.contains_key(&id) {
                        return Some(TransportEvent::Frame { id, frame });
                    }
                }
                Inbound::Closed { id } => {
                    if self.registry.remove(&id).is_some() {
                        tracing::info!(
                            %id,
                            connections = self.registry.len(),
                            "connection closed"
                        );
                        return Some(TransportEvent::Disconnected { id });
                    }
                }
                Inbound::AcceptFailed(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Some(TransportEvent::Error {
                        message: format!("accept failed: {e}"),
                    });
                }
            }
        }
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::Shutdown);
        }
        let frame: Arc<[u8]> = Arc::from(frame);
        for (id, outbox) in &self.registry {
            if outbox.send(Arc::clone(&frame)).is_err() {
                tracing::warn!(%id, "broadcast skipped a peer whose writer stopped");
            }
        }
        Ok(())
    }

    async fn send_to(
        &mut self,
        id: ConnectionId,
        frame: &[u8],
    ) -> Result<(), TransportError> {
        let closed = || TransportError::ConnectionClosed(id.to_string());
        let outbox = self.registry.get(&id).ok_or_else(closed)?;
        outbox.send(Arc::from(frame)).map_err(|_| closed())
    }

    async fn shutdown(&mut self) {
        if let Some(task) = self.accept_task.take() {
            // Aborting the accept loop drops its JoinSet, which aborts
            // every reader task with it. Clearing the registry ends the
            // writer tasks once their queues drain.
            task.abort();
            self.registry.clear();
            self.inbound.close();
            tracing::info!(addr = %self.local_addr, "host transport shut down");
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

impl Drop for HostTransport {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let mut readers = JoinSet::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = ConnectionId::new(next_id);
                    next_id += 1;
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%id, error = %e, "set_nodelay failed");
                    }
                    let (reader, writer) = stream.into_split();
                    // Announce before reading so no frame can overtake
                    // its own connection.
                    if tx.send(Inbound::Accepted { id, peer, writer }).is_err() {
                        break;
                    }
                    readers.spawn(read_frames(id, reader, tx.clone()));
                }
                Err(e) => {
                    if tx.send(Inbound::AcceptFailed(e)).is_err() {
                        break;
                    }
                    // Typically fd exhaustion; don't spin.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = readers.join_next() => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// The connecting side: exactly one connection, to the host.
pub struct ParticipantTransport {
    id: ConnectionId,
    local_addr: SocketAddr,
    writer: Option<OwnedWriteHalf>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    reader_task: JoinHandle<()>,
    pending: VecDeque<TransportEvent>,
}

impl ParticipantTransport {
    /// Connects to `host:port`, giving up after `timeout`.
    ///
    /// # Errors
    /// [`TransportError::Connect`] if the connection is refused or the
    /// address doesn't resolve, [`TransportError::ConnectTimeout`] if the
    /// attempt is abandoned.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream =
            connect_within(timeout, TcpStream::connect((host, port))).await?;
        let peer = stream.peer_addr().map_err(TransportError::Connect)?;
        let local_addr = stream.local_addr().map_err(TransportError::Connect)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "set_nodelay failed");
        }

        let id = ConnectionId::new(1);
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_frames(id, reader, tx));
        tracing::info!(%peer, "connected to host");

        Ok(Self {
            id,
            local_addr,
            writer: Some(writer),
            inbound: rx,
            reader_task,
            pending: VecDeque::from([TransportEvent::Connected { id, peer }]),
        })
    }

    /// Whether the connection to the host is still open.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

impl Transport for ParticipantTransport {
    const ROLE: Role = Role::Participant;

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            match self.inbound.recv().await? {
                Inbound::Frame { id, frame } => {
                    if self.writer.is_some() {
                        return Some(TransportEvent::Frame { id, frame });
                    }
                }
                Inbound::Closed { id } => {
                    if self.writer.take().is_some() {
                        tracing::info!(%id, "connection to host closed");
                        return Some(TransportEvent::Disconnected { id });
                    }
                }
                // Only the host's accept loop produces these.
                Inbound::Accepted { .. } | Inbound::AcceptFailed(_) => {}
            }
        }
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let id = self.id;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionClosed(id.to_string()))?;
        write_frame(writer, frame).await
    }

    /// The participant has one connection; any other id is closed.
    async fn send_to(
        &mut self,
        id: ConnectionId,
        frame: &[u8],
    ) -> Result<(), TransportError> {
        if id != self.id {
            return Err(TransportError::ConnectionClosed(id.to_string()));
        }
        self.send(frame).await
    }

    async fn shutdown(&mut self) {
        self.reader_task.abort();
        if self.writer.take().is_some() {
            tracing::info!("participant transport shut down");
        }
        self.inbound.close();
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

impl Drop for ParticipantTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Runs a connection attempt under a deadline.
pub(crate) async fn connect_within<F, T>(
    timeout: Duration,
    connect: F,
) -> Result<T, TransportError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TransportError::Connect(e)),
        Err(_) => Err(TransportError::ConnectTimeout(timeout)),
    }
}

async fn write_frame(
    writer: &mut OwnedWriteHalf,
    frame: &[u8],
) -> Result<(), TransportError> {
    match tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(frame)).await {
        Ok(result) => result.map_err(TransportError::SendFailed),
        Err(_) => Err(TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write stalled",
        ))),
    }
}

/// Writes queued frames to one peer until the queue closes or a write
/// fails.
async fn write_frames(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Arc<[u8]>>,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            tracing::warn!(%id, error = %e, "write failed, dropping peer's queue");
            return;
        }
    }
    tracing::trace!(%id, "writer finished");
}

/// Reads until EOF or error, forwarding every complete frame.
async fn read_frames(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let mut frames = FrameReader::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                frames.extend(&chunk[..n]);
                for frame in frames.frames() {
                    if tx.send(Inbound::Frame { id, frame }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "read failed");
                break;
            }
        }
    }

    if frames.buffered() > 0 {
        tracing::debug!(
            %id,
            bytes = frames.buffered(),
            "discarding unterminated frame at close"
        );
    }
    let _ = tx.send(Inbound::Closed { id });
}
