//! Connection lifecycle for the K4 remote protocol.
//!
//! [`ConnectionManager`] owns the socket and walks it through
//! `Disconnected -> Connecting -> Authenticating -> Connected`. A single
//! background task owns the read half, the [`PacketFramer`], the
//! authentication deadline and the keep-alive timer, multiplexed with
//! `tokio::select!`, so packets are decoded strictly in arrival order and
//! the two timers can never run at the same time.
//!
//! Each connection gets its own unbounded, ordered packet channel (see
//! [`ConnectionManager::take_packets`]), so nothing decoded on one
//! connection can reach a consumer of the next. Lifecycle changes are
//! broadcast as [`ConnectionEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use k4link_core::{ConnectionEvent, ConnectionState, Error, Result};
use k4link_protocol::{Packet, PacketFramer, build_audio_packet, build_cat_packet};

use crate::auth::password_hash;
use crate::options::{ConnectionOptions, Security};

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Socket read size.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Byte stream to the radio: plain TCP or TLS over TCP.
pub(crate) trait RadioStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RadioStream for T {}

type StreamReader = ReadHalf<Box<dyn RadioStream>>;
type StreamWriteHalf = WriteHalf<Box<dyn RadioStream>>;
type StreamWriter = Arc<Mutex<Option<StreamWriteHalf>>>;

/// Manages one connection to a K4 at a time.
///
/// All methods take `&self`; the manager can be shared across tasks in an
/// `Arc`.
pub struct ConnectionManager {
    options: ConnectionOptions,

    /// Current lifecycle state, shared with the read task.
    state: Arc<Mutex<ConnectionState>>,

    /// Write half of the socket.
    writer: StreamWriter,

    /// Background read task of the live connection.
    read_handle: Mutex<Option<JoinHandle<()>>>,

    event_tx: broadcast::Sender<ConnectionEvent>,

    /// Packets of the current connection, until taken.
    packet_rx: Mutex<Option<mpsc::UnboundedReceiver<Packet>>>,

    /// Rolling sequence number for outgoing audio.
    audio_seq: AtomicU8,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        options.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(ConnectionManager {
            options,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            read_handle: Mutex::new(None),
            event_tx,
            packet_rx: Mutex::new(None),
            audio_seq: AtomicU8::new(0),
        })
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Take the receiver of packets decoded on the current connection.
    ///
    /// A fresh channel is created by every successful [`connect`](Self::connect);
    /// returns `None` before that or once the receiver has been taken. The
    /// channel closes when its connection ends.
    pub async fn take_packets(&self) -> Option<mpsc::UnboundedReceiver<Packet>> {
        self.packet_rx.lock().await.take()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Open the socket and send credentials.
    ///
    /// Returns once the manager is `Authenticating`. The transition to
    /// `Connected` happens when the first packet is decoded; watch
    /// [`subscribe`](Self::subscribe) for it or for
    /// [`ConnectionEvent::AuthenticationFailed`].
    ///
    /// Every failure before `Connected` is published as
    /// [`ConnectionEvent::AuthenticationFailed`]. A TCP connect failure is
    /// still returned as the underlying transport error so callers can tell
    /// an unreachable radio from rejected credentials; a failed TLS
    /// handshake or credential write returns [`Error::AuthenticationFailed`].
    ///
    /// A [`disconnect`](Self::disconnect) while this is in flight cancels
    /// the attempt: the socket is closed, nothing further is published and
    /// [`Error::ConnectionLost`] is returned.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != ConnectionState::Disconnected {
                return Err(Error::AlreadyConnected);
            }
            transition(&mut state, &self.event_tx, ConnectionState::Connecting);
        }

        let addr = self.options.addr();
        tracing::debug!(addr = %addr, security = ?self.options.security, "Connecting to K4");

        let tcp = match self.open_tcp(&addr).await {
            Ok(tcp) => tcp,
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "TCP connect failed");
                if !self.abandon_attempt(&e.to_string()).await {
                    return Err(Error::ConnectionLost);
                }
                return Err(e);
            }
        };
        if *self.state.lock().await != ConnectionState::Connecting {
            tracing::debug!(addr = %addr, "Connect cancelled");
            return Err(Error::ConnectionLost);
        }

        let (reader, mut writer) = match self.authenticate(tcp).await {
            Ok(halves) => halves,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(addr = %addr, reason = %reason, "Authentication failed");
                if !self.abandon_attempt(&reason).await {
                    return Err(Error::ConnectionLost);
                }
                return Err(Error::AuthenticationFailed(reason));
            }
        };

        // Everything below happens under the state lock so a concurrent
        // disconnect() sees either no session or a complete one.
        let mut state = self.state.lock().await;
        if *state != ConnectionState::Connecting {
            drop(state);
            tracing::debug!(addr = %addr, "Connect cancelled");
            let _ = writer.shutdown().await;
            return Err(Error::ConnectionLost);
        }

        *self.writer.lock().await = Some(writer);
        let (packet_tx, packet_rx) = mpsc::unbounded_channel();
        *self.packet_rx.lock().await = Some(packet_rx);

        let ctx = ReadLoopContext {
            state: Arc::clone(&self.state),
            writer: Arc::clone(&self.writer),
            event_tx: self.event_tx.clone(),
            packet_tx,
            auth_timeout: self.options.auth_timeout,
            keepalive_interval: self.options.keepalive_interval,
            keepalive_command: self.options.keepalive_command.clone(),
            init_commands: self.options.init_commands.clone(),
        };
        *self.read_handle.lock().await = Some(tokio::spawn(read_loop(reader, ctx)));
        transition(&mut state, &self.event_tx, ConnectionState::Authenticating);
        Ok(())
    }

    /// Close the connection. Safe to call in any state.
    ///
    /// The manager is `Disconnected` and the read task stopped before
    /// anything else, so no packet is delivered after this returns and
    /// buffered partial frames are discarded with it. A connect attempt in
    /// flight is cancelled. When connected, the disconnect command is sent
    /// best-effort before the socket is shut down.
    pub async fn disconnect(&self) -> Result<()> {
        let (handle, writer, was_connected) = {
            let mut state = self.state.lock().await;
            let was_connected = *state == ConnectionState::Connected;
            let handle = self.read_handle.lock().await.take();
            let writer = self.writer.lock().await.take();
            self.packet_rx.lock().await.take();
            transition(&mut state, &self.event_tx, ConnectionState::Disconnected);
            (handle, writer, was_connected)
        };

        if let Some(handle) = handle {
            handle.abort();
            // Wait for the abort to land so the task cannot emit anything.
            let _ = handle.await;
        }

        if let Some(mut w) = writer {
            if was_connected {
                if let Some(cmd) = &self.options.disconnect_command {
                    tracing::debug!(command = %cmd, "Sending disconnect command");
                    let _ = w.write_all(&build_cat_packet(cmd)).await;
                    let _ = w.flush().await;
                }
            }
            let _ = w.shutdown().await;
        }
        Ok(())
    }

    /// Send one CAT command, framed. A missing `;` terminator is added.
    pub async fn send_cat(&self, cmd: &str) -> Result<()> {
        self.require_connected().await?;
        let cmd = with_terminator(cmd);
        tracing::trace!(command = %cmd, "Sending CAT");
        write_frame(&self.writer, &build_cat_packet(&cmd)).await
    }

    /// Send one encoded audio frame (e.g. Opus for the transmit path).
    pub async fn send_audio(&self, data: &[u8], encode_mode: u8) -> Result<()> {
        self.require_connected().await?;
        let seq = self.audio_seq.fetch_add(1, Ordering::Relaxed);
        write_frame(&self.writer, &build_audio_packet(data, seq, encode_mode)).await
    }

    async fn require_connected(&self) -> Result<()> {
        if *self.state.lock().await != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn open_tcp(&self, addr: &str) -> Result<TcpStream> {
        let stream = tokio::time::timeout(self.options.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Transport(format!("TCP connect to {addr} failed: {e}")))?;
        // Disable Nagle for low-latency CAT.
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    /// Secure or authenticate the stream and split it.
    async fn authenticate(&self, tcp: TcpStream) -> Result<(StreamReader, StreamWriteHalf)> {
        let stream: Box<dyn RadioStream> = match &self.options.security {
            Security::Plaintext { .. } => Box::new(tcp),
            Security::TlsPsk { identity, key } => self.tls(tcp, identity, key).await?,
        };
        let (reader, mut writer) = tokio::io::split(stream);

        if let Security::Plaintext { password } = &self.options.security {
            // Unframed, no terminator.
            let hash = password_hash(password);
            writer
                .write_all(hash.as_bytes())
                .await
                .map_err(|e| Error::Transport(format!("failed to send credentials: {e}")))?;
            writer
                .flush()
                .await
                .map_err(|e| Error::Transport(format!("failed to send credentials: {e}")))?;
            tracing::debug!("Sent password hash");
        }

        Ok((reader, writer))
    }

    #[cfg(feature = "tls")]
    async fn tls(
        &self,
        tcp: TcpStream,
        identity: &str,
        key: &[u8],
    ) -> Result<Box<dyn RadioStream>> {
        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            crate::tls::handshake(tcp, identity, key),
        )
        .await
        .map_err(|_| Error::Tls("handshake timed out".into()))??;
        Ok(Box::new(stream))
    }

    #[cfg(not(feature = "tls"))]
    async fn tls(
        &self,
        _tcp: TcpStream,
        _identity: &str,
        _key: &[u8],
    ) -> Result<Box<dyn RadioStream>> {
        Err(Error::Unsupported("TLS-PSK requires the `tls` feature".into()))
    }

    /// Publish a failed attempt and return to `Disconnected`. Returns
    /// `false`, publishing nothing, if `disconnect()` already cancelled it.
    async fn abandon_attempt(&self, reason: &str) -> bool {
        let mut state = self.state.lock().await;
        if *state != ConnectionState::Connecting {
            return false;
        }
        let _ = self.event_tx.send(ConnectionEvent::AuthenticationFailed {
            reason: reason.to_string(),
        });
        transition(&mut state, &self.event_tx, ConnectionState::Disconnected);
        true
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(h) = self.read_handle.get_mut().take() {
            h.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with the read task
// ---------------------------------------------------------------------------

fn with_terminator(cmd: &str) -> String {
    let cmd = cmd.trim();
    if cmd.ends_with(';') {
        cmd.to_string()
    } else {
        format!("{cmd};")
    }
}

async fn write_frame(writer: &StreamWriter, frame: &[u8]) -> Result<()> {
    let mut guard = writer.lock().await;
    let w = guard.as_mut().ok_or(Error::NotConnected)?;
    w.write_all(frame)
        .await
        .map_err(|e| Error::Transport(format!("failed to send: {e}")))?;
    w.flush()
        .await
        .map_err(|e| Error::Transport(format!("failed to flush: {e}")))?;
    Ok(())
}

/// Store `new` and broadcast it if it differs from `current`.
fn transition(
    current: &mut ConnectionState,
    event_tx: &broadcast::Sender<ConnectionEvent>,
    new: ConnectionState,
) {
    if *current == new {
        return;
    }
    tracing::debug!(from = %*current, to = %new, "Connection state changed");
    *current = new;
    let _ = event_tx.send(ConnectionEvent::StateChanged { state: new });
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

struct ReadLoopContext {
    state: Arc<Mutex<ConnectionState>>,
    writer: StreamWriter,
    event_tx: broadcast::Sender<ConnectionEvent>,
    packet_tx: mpsc::UnboundedSender<Packet>,
    auth_timeout: Duration,
    keepalive_interval: Option<Duration>,
    keepalive_command: String,
    init_commands: Vec<String>,
}

/// Resolves on the next keep-alive tick, or never when keep-alive is off.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn read_loop(mut reader: StreamReader, ctx: ReadLoopContext) {
    let mut framer = PacketFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut authenticated = false;
    let mut keepalive: Option<Interval> = None;

    let auth_deadline = tokio::time::sleep(ctx.auth_timeout);
    tokio::pin!(auth_deadline);

    let failure = loop {
        tokio::select! {
            result = reader.read(&mut buf) => match result {
                Ok(0) => break "connection closed by radio".to_string(),
                Ok(n) => {
                    let packets = framer.feed(&buf[..n]);
                    if packets.is_empty() {
                        continue;
                    }
                    if !authenticated {
                        authenticated = true;
                        on_authenticated(&ctx).await;
                        keepalive = ctx.keepalive_interval.map(|period| {
                            let start = Instant::now() + period;
                            let mut interval = tokio::time::interval_at(start, period);
                            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            interval
                        });
                    }
                    for packet in packets {
                        if ctx.packet_tx.send(packet).is_err() {
                            tracing::trace!("Packet receiver dropped, discarding packet");
                        }
                    }
                }
                Err(e) => break format!("read error: {e}"),
            },
            () = &mut auth_deadline, if !authenticated => {
                break "timed out waiting for the radio to accept credentials".to_string();
            }
            () = next_tick(&mut keepalive), if authenticated => {
                let frame = build_cat_packet(&ctx.keepalive_command);
                if let Err(e) = write_frame(&ctx.writer, &frame).await {
                    tracing::debug!(error = %e, "Keep-alive send failed");
                }
            }
        }
    };

    if authenticated {
        tracing::error!(error = %failure, "Connection to K4 lost");
        let _ = ctx.event_tx.send(ConnectionEvent::ErrorOccurred { message: failure });
    } else {
        tracing::warn!(reason = %failure, "Authentication failed");
        let _ = ctx.event_tx.send(ConnectionEvent::AuthenticationFailed { reason: failure });
    }

    let writer = ctx.writer.lock().await.take();
    if let Some(mut w) = writer {
        let _ = w.shutdown().await;
    }
    transition(&mut *ctx.state.lock().await, &ctx.event_tx, ConnectionState::Disconnected);
}

/// First packet decoded: the radio accepted us.
async fn on_authenticated(ctx: &ReadLoopContext) {
    {
        let mut state = ctx.state.lock().await;
        // Only a live attempt may be promoted.
        if *state != ConnectionState::Authenticating {
            return;
        }
        transition(&mut state, &ctx.event_tx, ConnectionState::Connected);
    }
    for cmd in &ctx.init_commands {
        if let Err(e) = write_frame(&ctx.writer, &build_cat_packet(cmd)).await {
            tracing::warn!(command = %cmd, error = %e, "Failed to send init command");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConnectionBuilder;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn builder(port: u16) -> ConnectionBuilder {
        ConnectionBuilder::new("127.0.0.1")
            .port(port)
            .password("secret")
            .keepalive_interval(None)
    }

    async fn read_hash(stream: &mut TcpStream) -> String {
        let mut hash = vec![0u8; 96];
        stream.read_exact(&mut hash).await.unwrap();
        String::from_utf8(hash).unwrap()
    }

    /// Collect events until `Disconnected` (or the timeout).
    async fn events_until_disconnected(
        rx: &mut broadcast::Receiver<ConnectionEvent>,
    ) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(Ok(event)) = timeout(Duration::from_secs(3), rx.recv()).await {
            let done = event
                == ConnectionEvent::StateChanged {
                    state: ConnectionState::Disconnected,
                };
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn auth_failures(events: &[ConnectionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::AuthenticationFailed { .. }))
            .count()
    }

    #[tokio::test]
    async fn sends_password_hash_then_authenticates() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let hash = read_hash(&mut stream).await;
            assert_eq!(hash, password_hash("secret"));
            stream.write_all(&build_cat_packet("ID017;")).await.unwrap();

            // Init commands follow the first packet, in order.
            let mut framer = PacketFramer::new();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while received.len() < 3 {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0);
                received.extend(framer.feed(&buf[..n]));
            }
            received
        });

        let manager = builder(port).build().unwrap();
        let mut events = manager.subscribe();

        assert!(manager.take_packets().await.is_none());
        manager.connect().await.unwrap();
        let mut packets = manager.take_packets().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::StateChanged {
                state: ConnectionState::Connecting
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::StateChanged {
                state: ConnectionState::Authenticating
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::StateChanged {
                state: ConnectionState::Connected
            }
        );
        assert_eq!(packets.recv().await.unwrap(), Packet::Cat("ID017;".into()));
        assert_eq!(manager.state().await, ConnectionState::Connected);

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec![
                Packet::Cat("RDY;".into()),
                Packet::Cat("K41;".into()),
                Packet::Cat("ER1;".into()),
            ]
        );
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn auth_timeout_fails_exactly_once() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            // Never answer.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let manager = builder(port)
            .auth_timeout(Duration::from_millis(150))
            .build()
            .unwrap();
        let mut events = manager.subscribe();
        manager.connect().await.unwrap();

        let events = events_until_disconnected(&mut events).await;
        assert_eq!(auth_failures(&events), 1);
        assert_eq!(
            events.last(),
            Some(&ConnectionEvent::StateChanged {
                state: ConnectionState::Disconnected
            })
        );
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_before_first_packet_is_auth_failure() {
        let (listener, port) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            // Bad password: the radio just hangs up.
        });

        let manager = builder(port).build().unwrap();
        let mut events = manager.subscribe();
        manager.connect().await.unwrap();

        let events = events_until_disconnected(&mut events).await;
        assert_eq!(auth_failures(&events), 1);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ConnectionEvent::ErrorOccurred { .. }))
        );
    }

    #[tokio::test]
    async fn peer_close_after_connect_is_error() {
        let (listener, port) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            stream.write_all(&build_cat_packet("TQ0;")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let manager = builder(port).build().unwrap();
        let mut events = manager.subscribe();
        manager.connect().await.unwrap();

        let events = events_until_disconnected(&mut events).await;
        assert_eq!(auth_failures(&events), 0);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ConnectionEvent::ErrorOccurred { .. }))
        );
    }

    #[tokio::test]
    async fn connect_refused_keeps_transport_cause() {
        let (listener, port) = listener().await;
        drop(listener);

        let manager = builder(port).build().unwrap();
        let mut events = manager.subscribe();
        let result = manager.connect().await;
        assert!(matches!(result, Err(Error::Transport(_))));

        let events = events_until_disconnected(&mut events).await;
        assert_eq!(auth_failures(&events), 1);
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let manager = builder(port).build().unwrap();
        manager.connect().await.unwrap();
        assert!(matches!(
            manager.connect().await,
            Err(Error::AlreadyConnected)
        ));
        manager.disconnect().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn disconnect_cancels_connect_in_flight() {
        let (listener, port) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        });

        let manager = Arc::new(builder(port).build().unwrap());
        let attempt = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.connect().await }
        });
        while manager.state().await == ConnectionState::Disconnected {
            tokio::task::yield_now().await;
        }

        manager.disconnect().await.unwrap();
        let mut events = manager.subscribe();
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(matches!(attempt.await.unwrap(), Err(Error::ConnectionLost)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(events.try_recv().is_err());
        assert!(manager.take_packets().await.is_none());
        assert!(matches!(
            manager.send_cat("FA;").await,
            Err(Error::NotConnected)
        ));
        assert!(manager.read_handle.lock().await.is_none());
    }

    #[tokio::test]
    async fn each_connection_gets_its_own_packets() {
        let (listener, port) = listener().await;
        tokio::spawn(async move {
            for greeting in ["FA00007074000;", "FA00014074000;"] {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_hash(&mut stream).await;
                stream.write_all(&build_cat_packet(greeting)).await.unwrap();
                let mut buf = [0u8; 256];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            }
        });

        let manager = builder(port).init_commands(Vec::<String>::new()).build().unwrap();
        manager.connect().await.unwrap();
        let mut first = manager.take_packets().await.unwrap();
        assert_eq!(first.recv().await.unwrap(), Packet::Cat("FA00007074000;".into()));
        manager.disconnect().await.unwrap();

        manager.connect().await.unwrap();
        let mut second = manager.take_packets().await.unwrap();
        assert_eq!(second.recv().await.unwrap(), Packet::Cat("FA00014074000;".into()));
        assert!(first.recv().await.is_none());
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn send_cat_requires_connection() {
        let manager = builder(1).build().unwrap();
        assert!(matches!(
            manager.send_cat("FA;").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            manager.send_audio(&[0; 4], 2).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_sends_farewell_and_stops_packets() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            stream.write_all(&build_cat_packet("MD2;")).await.unwrap();

            let mut framer = PacketFramer::new();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend(framer.feed(&buf[..n])),
                }
            }
            received
        });

        let manager = builder(port).init_commands(Vec::<String>::new()).build().unwrap();
        manager.connect().await.unwrap();
        let mut packets = manager.take_packets().await.unwrap();
        assert_eq!(packets.recv().await.unwrap(), Packet::Cat("MD2;".into()));

        manager.send_cat("FA00014074000").await.unwrap();
        manager.disconnect().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(matches!(
            packets.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec![
                Packet::Cat("FA00014074000;".into()),
                Packet::Cat("RRN;".into()),
            ]
        );

        // Disconnecting again is a no-op.
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn keepalive_is_sent_when_connected() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_hash(&mut stream).await;
            stream.write_all(&build_cat_packet("PC050H;")).await.unwrap();

            let mut framer = PacketFramer::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0);
                if framer.feed(&buf[..n]).contains(&Packet::Cat("PING;".into())) {
                    return;
                }
            }
        });

        let manager = ConnectionBuilder::new("127.0.0.1")
            .port(port)
            .password("secret")
            .init_commands(Vec::<String>::new())
            .keepalive_interval(Some(Duration::from_millis(50)))
            .build()
            .unwrap();
        manager.connect().await.unwrap();

        timeout(Duration::from_secs(2), server)
            .await
            .expect("keep-alive not received")
            .unwrap();
        manager.disconnect().await.unwrap();
    }

    #[test]
    fn terminator_is_added_once() {
        assert_eq!(with_terminator("FA"), "FA;");
        assert_eq!(with_terminator("FA;"), "FA;");
        assert_eq!(with_terminator(" MD$3 "), "MD$3;");
    }
}
