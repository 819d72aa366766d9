//! High-level K4 session: connection, state model and data streams.
//!
//! [`K4Radio`] wires a [`ConnectionManager`] to a [`RadioStateModel`]. Each
//! connection gets a pump task that drains its decoded packets in arrival
//! order: CAT text is applied to the model, audio and panadapter frames are
//! fanned out on broadcast channels. The pump is stopped on disconnect, so
//! packets still queued from a closed connection are discarded. Setters send the CAT command and then apply the same value
//! to the model optimistically, so observers see the change immediately
//! and the radio's echo is silent.
//!
//! # Example
//!
//! ```no_run
//! use k4link_client::K4RadioBuilder;
//! use k4link_core::{Mode, ReceiverId};
//!
//! # async fn example() -> k4link_core::Result<()> {
//! let radio = K4RadioBuilder::new("192.168.1.50")
//!     .password("hunter2")
//!     .connect()
//!     .await?;
//!
//! radio.set_mode(ReceiverId::VFO_A, Mode::Cw).await?;
//! radio.set_frequency(ReceiverId::VFO_A, 7_030_000).await?;
//!
//! let state = radio.state().await;
//! println!("{:?}", state.main.frequency_hz);
//! radio.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use k4link_core::{ConnectionEvent, ConnectionState, Error, Mode, ReceiverId, Result};
use k4link_protocol::cat::{is_error_response, split_commands};
use k4link_protocol::{AudioFrame, MiniSpectrumFrame, Packet, SpectrumFrame};
use k4link_state::{Field, FieldValue, ModelEvent, RadioState, RadioStateModel, commands};

use crate::connection::ConnectionManager;
use crate::options::{ConnectionBuilder, ConnectionOptions};

/// Broadcast capacity for audio and panadapter frames.
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// A connected K4 session.
pub struct K4Radio {
    connection: ConnectionManager,
    model: Arc<Mutex<RadioStateModel>>,
    audio_tx: broadcast::Sender<AudioFrame>,
    spectrum_tx: broadcast::Sender<SpectrumFrame>,
    mini_spectrum_tx: broadcast::Sender<MiniSpectrumFrame>,

    /// Pump of the current connection.
    pump_handle: Mutex<Option<JoinHandle<()>>>,
}

impl K4Radio {
    /// Create a disconnected session.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        let connection = ConnectionManager::new(options)?;
        let model = Arc::new(Mutex::new(RadioStateModel::new()));
        let (audio_tx, _) = broadcast::channel(STREAM_CHANNEL_CAPACITY);
        let (spectrum_tx, _) = broadcast::channel(STREAM_CHANNEL_CAPACITY);
        let (mini_spectrum_tx, _) = broadcast::channel(STREAM_CHANNEL_CAPACITY);

        Ok(K4Radio {
            connection,
            model,
            audio_tx,
            spectrum_tx,
            mini_spectrum_tx,
            pump_handle: Mutex::new(None),
        })
    }

    /// Connect and wait until the radio has accepted us.
    ///
    /// The state model is cleared first so nothing from a previous session
    /// survives.
    pub async fn connect(&self) -> Result<()> {
        let mut events = self.connection.subscribe();
        {
            // Held until the new pump is stored so disconnect() can stop it.
            let mut pump_handle = self.pump_handle.lock().await;
            if let Some(old) = pump_handle.take() {
                old.abort();
                let _ = old.await;
            }
            self.model.lock().await.reset();

            self.connection.connect().await?;
            let packets = self
                .connection
                .take_packets()
                .await
                .ok_or_else(|| Error::Protocol("packet channel already taken".into()))?;
            *pump_handle = Some(tokio::spawn(pump(
                packets,
                Arc::clone(&self.model),
                self.audio_tx.clone(),
                self.spectrum_tx.clone(),
                self.mini_spectrum_tx.clone(),
            )));
        }

        loop {
            match events.recv().await {
                Ok(ConnectionEvent::StateChanged {
                    state: ConnectionState::Connected,
                }) => return Ok(()),
                Ok(ConnectionEvent::AuthenticationFailed { reason }) => {
                    return Err(Error::AuthenticationFailed(reason));
                }
                Ok(ConnectionEvent::StateChanged {
                    state: ConnectionState::Disconnected,
                }) => return Err(Error::ConnectionLost),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(Error::ConnectionLost),
            }
        }
    }

    /// Close the connection. Nothing from it reaches the model or the
    /// stream channels after this returns.
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await?;
        let pump = self.pump_handle.lock().await.take();
        if let Some(pump) = pump {
            pump.abort();
            let _ = pump.await;
        }
        Ok(())
    }

    /// The underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    /// Snapshot of the cached radio state.
    pub async fn state(&self) -> RadioState {
        self.model.lock().await.snapshot()
    }

    pub async fn get_field(&self, field: &Field) -> Option<FieldValue> {
        self.model.lock().await.get_field(field)
    }

    /// Subscribe to state-model change notifications.
    pub async fn subscribe_state(&self) -> broadcast::Receiver<ModelEvent> {
        self.model.lock().await.subscribe()
    }

    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.subscribe()
    }

    pub fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame> {
        self.audio_tx.subscribe()
    }

    pub fn subscribe_spectrum(&self) -> broadcast::Receiver<SpectrumFrame> {
        self.spectrum_tx.subscribe()
    }

    pub fn subscribe_mini_spectrum(&self) -> broadcast::Receiver<MiniSpectrumFrame> {
        self.mini_spectrum_tx.subscribe()
    }

    /// Send a raw CAT command; the state model sees only the radio's reply.
    pub async fn send_cat(&self, cmd: &str) -> Result<()> {
        self.connection.send_cat(cmd).await
    }

    pub async fn send_audio(&self, data: &[u8], encode_mode: u8) -> Result<()> {
        self.connection.send_audio(data, encode_mode).await
    }

    // -----------------------------------------------------------------
    // Optimistic setters
    // -----------------------------------------------------------------

    pub async fn set_frequency(&self, rx: ReceiverId, freq_hz: u64) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_frequency(rx, freq_hz))
            .await?;
        self.model.lock().await.set_frequency(rx, freq_hz);
        Ok(())
    }

    pub async fn set_mode(&self, rx: ReceiverId, mode: Mode) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_mode(rx, mode))
            .await?;
        self.model.lock().await.set_mode(rx, mode);
        Ok(())
    }

    /// Bandwidth in hertz; the radio works in 10 Hz steps.
    pub async fn set_filter_bandwidth(&self, rx: ReceiverId, bandwidth_hz: u32) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_filter_bandwidth(rx, bandwidth_hz))
            .await?;
        self.model.lock().await.set_filter_bandwidth(rx, bandwidth_hz);
        Ok(())
    }

    pub async fn set_keyer_speed(&self, wpm: u32) -> Result<()> {
        if !(8..=100).contains(&wpm) {
            return Err(Error::InvalidParameter(format!(
                "keyer speed {wpm} WPM outside 8..=100"
            )));
        }
        self.connection
            .send_cat(&commands::cmd_set_keyer_speed(wpm))
            .await?;
        self.model.lock().await.set_keyer_speed(wpm);
        Ok(())
    }

    pub async fn set_span(&self, rx: ReceiverId, span_hz: u32) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_span(rx, span_hz))
            .await?;
        self.model.lock().await.set_span(rx, span_hz);
        Ok(())
    }

    pub async fn set_ref_level(&self, rx: ReceiverId, ref_level_db: i32) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_ref_level(rx, ref_level_db))
            .await?;
        self.model.lock().await.set_ref_level(rx, ref_level_db);
        Ok(())
    }

    pub async fn set_split(&self, on: bool) -> Result<()> {
        self.connection.send_cat(&commands::cmd_set_split(on)).await?;
        self.model.lock().await.set_split(on);
        Ok(())
    }

    /// Key (`true`) or unkey the transmitter.
    pub async fn set_ptt(&self, on: bool) -> Result<()> {
        self.connection
            .send_cat(&commands::cmd_set_transmit(on))
            .await?;
        self.model.lock().await.set_transmitting(on);
        Ok(())
    }
}

impl Drop for K4Radio {
    fn drop(&mut self) {
        if let Some(pump) = self.pump_handle.get_mut().take() {
            pump.abort();
        }
    }
}

/// Drain one connection's decoded packets in order.
async fn pump(
    mut packets: mpsc::UnboundedReceiver<Packet>,
    model: Arc<Mutex<RadioStateModel>>,
    audio_tx: broadcast::Sender<AudioFrame>,
    spectrum_tx: broadcast::Sender<SpectrumFrame>,
    mini_spectrum_tx: broadcast::Sender<MiniSpectrumFrame>,
) {
    while let Some(packet) = packets.recv().await {
        match packet {
            Packet::Cat(text) => {
                if split_commands(&text).any(is_error_response) {
                    tracing::debug!(text = %text, "Radio rejected a command");
                }
                let changes = model.lock().await.apply_text(&text);
                tracing::trace!(text = %text, changes = changes.len(), "Applied CAT");
            }
            // No subscribers is fine for stream data.
            Packet::Audio(frame) => {
                let _ = audio_tx.send(frame);
            }
            Packet::Spectrum(frame) => {
                let _ = spectrum_tx.send(frame);
            }
            Packet::MiniSpectrum(frame) => {
                let _ = mini_spectrum_tx.send(frame);
            }
        }
    }
    tracing::debug!("Packet channel closed, pump exiting");
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`K4Radio`], mirroring [`ConnectionBuilder`].
#[derive(Debug, Clone)]
pub struct K4RadioBuilder {
    inner: ConnectionBuilder,
}

impl K4RadioBuilder {
    pub fn new(host: &str) -> Self {
        K4RadioBuilder {
            inner: ConnectionBuilder::new(host),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.inner = self.inner.port(port);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.inner = self.inner.password(password);
        self
    }

    pub fn tls_psk(mut self, identity: &str, key: &[u8]) -> Self {
        self.inner = self.inner.tls_psk(identity, key);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.connect_timeout(timeout);
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.auth_timeout(timeout);
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.inner = self.inner.keepalive_interval(interval);
        self
    }

    pub fn init_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner = self.inner.init_commands(commands);
        self
    }

    pub fn disconnect_command(mut self, cmd: Option<&str>) -> Self {
        self.inner = self.inner.disconnect_command(cmd);
        self
    }

    /// Create a disconnected session.
    pub fn build(self) -> Result<K4Radio> {
        K4Radio::new(self.inner.options())
    }

    /// Build and connect.
    pub async fn connect(self) -> Result<K4Radio> {
        let radio = self.build()?;
        radio.connect().await?;
        Ok(radio)
    }
}
