//! Mock K4 peer for protocol-level testing.
//!
//! [`MockK4Server`] listens on a random localhost port and plays the radio
//! side of one session: it reads the 96-character password hash, optionally
//! rejects it by hanging up, sends a scripted greeting, then answers framed
//! CAT commands from a queue of expectations until the client disconnects.
//!
//! # Example
//!
//! ```
//! use k4link_test_harness::MockK4Server;
//!
//! # async fn example() -> k4link_core::Result<()> {
//! let mut server = MockK4Server::new().await?;
//! server.greet_cat("ID017;FA00014074000;MD2;");
//! server.expect("FA;", Some("FA00014074000;"));
//! server.start();
//!
//! // ... connect a client to 127.0.0.1:server.port() ...
//!
//! let report = server.wait().await.expect("mock session failed");
//! assert!(report.received.contains(&"FA;".to_string()));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use k4link_core::error::{Error, Result};
use k4link_protocol::cat::split_commands;
use k4link_protocol::{AudioFrame, Packet, PacketFramer, build_cat_packet, build_packet};

/// Length of the plaintext credential.
const HASH_LEN: usize = 96;

/// A CAT command the mock waits for, and its optional reply.
#[derive(Debug, Clone)]
struct CatExpectation {
    request: String,
    response: Option<String>,
}

/// What the mock saw during the session.
#[derive(Debug, Clone, Default)]
pub struct MockReport {
    /// The credential sent by the client.
    pub password_hash: String,
    /// Every CAT command received, in order, each with its `;`.
    pub received: Vec<String>,
    /// Audio frames received from the client.
    pub audio: Vec<AudioFrame>,
    /// Expected requests that never arrived.
    pub unmet: Vec<String>,
    /// `true` if the session was refused for a wrong hash.
    pub rejected: bool,
}

/// A scripted stand-in for a K4 on the plaintext port.
pub struct MockK4Server {
    addr: SocketAddr,
    listener: Option<TcpListener>,
    required_hash: Option<String>,
    greeting: Vec<u8>,
    expectations: VecDeque<CatExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<MockReport, String>>>,
}

impl MockK4Server {
    /// Bind to a random port on localhost.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock K4 server: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?;
        Ok(MockK4Server {
            addr,
            listener: Some(listener),
            required_hash: None,
            greeting: Vec::new(),
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// The address the server is listening on (e.g. `"127.0.0.1:54321"`).
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Hang up unless the client sends exactly this hash.
    pub fn require_hash(&mut self, hash: &str) {
        self.required_hash = Some(hash.to_string());
    }

    /// Queue a CAT packet to send once the hash has been read.
    pub fn greet_cat(&mut self, text: &str) {
        self.greeting.extend(build_cat_packet(text));
    }

    /// Queue any packet to send once the hash has been read.
    pub fn greet_packet(&mut self, packet: &Packet) {
        self.greeting.extend(build_packet(&packet.encode()));
    }

    /// Queue raw bytes (e.g. deliberately corrupt frames) for the greeting.
    pub fn greet_raw(&mut self, bytes: &[u8]) {
        self.greeting.extend_from_slice(bytes);
    }

    /// Wait for `request` and answer it with `response`.
    ///
    /// Expectations are matched in order; other commands (init, keep-alive)
    /// are recorded but otherwise ignored.
    pub fn expect(&mut self, request: &str, response: Option<&str>) {
        self.expectations.push_back(CatExpectation {
            request: request.to_string(),
            response: response.map(str::to_string),
        });
    }

    /// Accept one client and run the script in a background task.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let required_hash = self.required_hash.clone();
        let greeting = std::mem::take(&mut self.greeting);
        let expectations = std::mem::take(&mut self.expectations);

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            tracing::debug!(peer = %peer, "Mock K4 accepted client");
            run_session(stream, required_hash, greeting, expectations).await
        });
        self.server_handle = Some(handle);
    }

    /// Wait for the session to end (client disconnect) and return what was
    /// seen.
    pub async fn wait(self) -> std::result::Result<MockReport, String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Err("server was never started".to_string()),
        }
    }
}

async fn run_session(
    mut stream: TcpStream,
    required_hash: Option<String>,
    greeting: Vec<u8>,
    mut expectations: VecDeque<CatExpectation>,
) -> std::result::Result<MockReport, String> {
    let mut report = MockReport::default();

    let mut hash = vec![0u8; HASH_LEN];
    stream
        .read_exact(&mut hash)
        .await
        .map_err(|e| format!("failed to read password hash: {e}"))?;
    report.password_hash = String::from_utf8_lossy(&hash).into_owned();

    if let Some(required) = required_hash {
        if required != report.password_hash {
            tracing::debug!("Mock K4 rejecting credentials");
            report.rejected = true;
            return Ok(report);
        }
    }

    if !greeting.is_empty() {
        stream
            .write_all(&greeting)
            .await
            .map_err(|e| format!("greeting write error: {e}"))?;
    }

    let mut framer = PacketFramer::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for packet in framer.feed(&buf[..n]) {
            match packet {
                Packet::Cat(text) => {
                    for cmd in split_commands(&text) {
                        let cmd = format!("{cmd};");
                        let matched = expectations.front().is_some_and(|e| e.request == cmd);
                        report.received.push(cmd);
                        if !matched {
                            continue;
                        }
                        let Some(expectation) = expectations.pop_front() else {
                            continue;
                        };
                        if let Some(response) = expectation.response {
                            stream
                                .write_all(&build_cat_packet(&response))
                                .await
                                .map_err(|e| format!("response write error: {e}"))?;
                        }
                    }
                }
                Packet::Audio(frame) => report.audio.push(frame),
                other => {
                    tracing::debug!(packet_type = ?other.packet_type(), "Mock K4 ignoring packet");
                }
            }
        }
    }

    report.unmet = expectations.into_iter().map(|e| e.request).collect();
    Ok(report)
}
