// k4link-monitor -- command-line tool for exercising an Elecraft K4 over
// the remote protocol.
//
// Usage:
//   k4link-monitor --host 192.168.1.50 --password hunter2 state
//   k4link-monitor --host 192.168.1.50 --password hunter2 monitor --duration 30
//   k4link-monitor --host 192.168.1.50 --password hunter2 send "FA;" --wait 500
//   k4link-monitor --host 192.168.1.50 --password hunter2 freq 14074000
//   k4link-monitor --host 192.168.1.50 --password hunter2 mode CW --rx 1
//   k4link-monitor --host 192.168.1.50 --password hunter2 streams --duration 5
//   k4link-monitor --host 192.168.1.50 --tls-identity k4 --tls-key 0a1b2c state

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use k4link::{
    ConnectionEvent, K4Radio, K4RadioBuilder, Mode, ModelEvent, RadioState, ReceiverId,
    ReceiverState, format_freq_mhz, format_s_units,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// k4link monitor -- talks to a K4 over its native remote protocol.
#[derive(Parser)]
#[command(name = "k4link-monitor", version, about)]
struct Cli {
    /// Radio host name or IP address.
    #[arg(long)]
    host: String,

    /// Override the port (default 9205 plaintext, 9204 TLS).
    #[arg(long)]
    port: Option<u16>,

    /// Remote password for plaintext authentication.
    #[arg(long, default_value = "")]
    password: String,

    /// TLS-PSK identity. Requires --tls-key.
    #[cfg(feature = "tls")]
    #[arg(long, requires = "tls_key")]
    tls_identity: Option<String>,

    /// TLS-PSK key as hex.
    #[cfg(feature = "tls")]
    #[arg(long, requires = "tls_identity")]
    tls_key: Option<String>,

    /// Authentication timeout in seconds.
    #[arg(long, default_value_t = 5)]
    auth_timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect, let the radio report in, and print the cached state.
    State {
        /// Seconds to collect reports before printing.
        #[arg(long, default_value_t = 2)]
        settle: u64,
    },

    /// Print every state change as it arrives.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Send a raw CAT command and print the replies.
    Send {
        /// Command text, e.g. "FA;" (the `;` is optional).
        command: String,

        /// Milliseconds to wait for replies.
        #[arg(long, default_value_t = 500)]
        wait: u64,
    },

    /// Tune a receiver (in Hz).
    Freq {
        /// Frequency in hertz (e.g. 14074000).
        freq_hz: u64,

        /// Receiver index (0 = VFO-A, 1 = VFO-B).
        #[arg(long, default_value_t = 0)]
        rx: u8,
    },

    /// Set the mode of a receiver.
    Mode {
        /// Mode name (LSB, USB, CW, FM, AM, DATA, CW-R, DATA-R).
        mode: String,

        /// Receiver index (0 = VFO-A, 1 = VFO-B).
        #[arg(long, default_value_t = 0)]
        rx: u8,
    },

    /// Key or unkey the transmitter.
    Ptt {
        /// "on" or "off".
        state: String,
    },

    /// Count audio and panadapter frames for a while.
    Streams {
        /// Duration in seconds.
        #[arg(long, default_value_t = 5)]
        duration: u64,
    },
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn radio_builder(cli: &Cli) -> Result<K4RadioBuilder> {
    let mut builder = K4RadioBuilder::new(&cli.host)
        .password(&cli.password)
        .auth_timeout(Duration::from_secs(cli.auth_timeout));

    builder = with_tls(cli, builder)?;
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    Ok(builder)
}

#[cfg(feature = "tls")]
fn with_tls(cli: &Cli, builder: K4RadioBuilder) -> Result<K4RadioBuilder> {
    match (&cli.tls_identity, &cli.tls_key) {
        (Some(identity), Some(key)) => {
            let key = hex::decode(key.trim()).context("invalid --tls-key")?;
            Ok(builder.tls_psk(identity, &key))
        }
        _ => Ok(builder),
    }
}

#[cfg(not(feature = "tls"))]
fn with_tls(_cli: &Cli, builder: K4RadioBuilder) -> Result<K4RadioBuilder> {
    Ok(builder)
}

/// Prompt the user for y/N confirmation. Returns true only if "y" or "Y" entered.
fn confirm(prompt: &str) -> bool {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim(), "y" | "Y")
}

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_state(radio: &K4Radio, settle_secs: u64) -> Result<()> {
    tokio::time::sleep(Duration::from_secs(settle_secs)).await;
    let state = radio.state().await;
    print_state(&state);
    Ok(())
}

fn print_receiver(name: &str, rx: &ReceiverState) {
    println!("{name}:");
    println!(
        "  Frequency:      {}",
        rx.frequency_hz.map_or_else(|| "-".to_string(), format_freq_mhz)
    );
    println!("  Mode:           {}", show(rx.mode));
    println!("  Bandwidth:      {} Hz", show(rx.filter_bandwidth_hz));
    println!("  IF shift:       {} Hz", show(rx.if_shift_hz));
    println!(
        "  S-meter:        {}",
        rx.s_meter.map_or_else(|| "-".to_string(), format_s_units)
    );
    println!("  AGC:            {}", show(rx.agc_speed));
    println!("  AF / RF gain:   {} / {}", show(rx.af_gain), show(rx.rf_gain));
    println!("  Span:           {} Hz", show(rx.span_hz));
    println!("  Ref level:      {} dB", show(rx.ref_level_db));
}

fn print_state(state: &RadioState) {
    println!("Radio ID:         {}", show(state.radio_id.as_deref()));
    if let Some(options) = &state.option_modules {
        println!("Options:          {}", options.raw);
    }
    for (tag, version) in &state.firmware_versions {
        println!("Firmware {tag}:       {version}");
    }
    print_receiver("VFO-A", &state.main);
    print_receiver("VFO-B", &state.sub);
    println!("Transmit:");
    println!("  Power:          {} W", show(state.power_watts));
    println!("  Transmitting:   {}", show(state.transmitting));
    println!("  Split:          {}", show(state.split));
    println!("  SWR:            {}", show(state.swr));
    println!("  Keyer:          {} WPM", show(state.keyer_speed_wpm));
    println!("  Delay (mode):   {}", show(state.delay_for_current_mode()));
    println!("  VOX (mode):     {}", show(state.vox_for_current_mode()));
    for (index, name) in &state.antenna_names {
        println!("  Antenna {index}:      {name}");
    }
}

async fn cmd_monitor(radio: &K4Radio, duration_secs: u64) -> Result<()> {
    let mut state_rx = radio.subscribe_state().await;
    let mut connection_rx = radio.subscribe_connection();

    println!("Monitoring state changes (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            event = state_rx.recv() => match event {
                Ok(ModelEvent::FieldChanged(change)) => {
                    println!("[state] {:?} = {:?}", change.field, change.value);
                }
                Ok(ModelEvent::StateUpdated) => {}
                Err(RecvError::Lagged(n)) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Err(RecvError::Closed) => break,
            },
            event = connection_rx.recv() => match event {
                Ok(ConnectionEvent::StateChanged { state }) => {
                    println!("[connection] {state}");
                    if state == k4link::ConnectionState::Disconnected {
                        break;
                    }
                }
                Ok(event) => println!("[connection] {event:?}"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep(timeout) => {
                if deadline.is_some() {
                    println!("Monitor duration elapsed.");
                }
                break;
            }
        }
    }
    Ok(())
}

async fn cmd_send(radio: &K4Radio, command: &str, wait_ms: u64) -> Result<()> {
    let mut state_rx = radio.subscribe_state().await;
    radio.send_cat(command).await.context("failed to send CAT command")?;

    let wait = tokio::time::sleep(Duration::from_millis(wait_ms));
    tokio::pin!(wait);
    loop {
        tokio::select! {
            event = state_rx.recv() => match event {
                Ok(ModelEvent::FieldChanged(change)) => {
                    println!("{:?} = {:?}", change.field, change.value);
                }
                Ok(ModelEvent::StateUpdated) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = &mut wait => break,
        }
    }
    Ok(())
}

async fn cmd_freq(radio: &K4Radio, rx: u8, freq_hz: u64) -> Result<()> {
    let rid = ReceiverId::from_index(rx);
    radio.set_frequency(rid, freq_hz).await?;
    println!("{rid}: set to {}", format_freq_mhz(freq_hz));
    Ok(())
}

async fn cmd_mode(radio: &K4Radio, rx: u8, mode_str: &str) -> Result<()> {
    let mode: Mode = mode_str
        .parse()
        .map_err(|e: k4link::ParseModeError| anyhow::anyhow!("{e}"))?;
    let rid = ReceiverId::from_index(rx);
    radio.set_mode(rid, mode).await?;
    println!("{rid}: mode set to {mode}");
    Ok(())
}

async fn cmd_ptt(radio: &K4Radio, state: &str) -> Result<()> {
    let on = match state.to_ascii_lowercase().as_str() {
        "on" => true,
        "off" => false,
        other => bail!("expected \"on\" or \"off\", got {other:?}"),
    };
    if on {
        println!("WARNING: This will key the transmitter.");
        println!("Ensure an antenna or dummy load is connected.");
        if !confirm("Continue? [y/N] ") {
            println!("Aborted.");
            return Ok(());
        }
    }
    radio.set_ptt(on).await?;
    println!("PTT: {}", if on { "ON" } else { "OFF" });
    Ok(())
}

async fn cmd_streams(radio: &K4Radio, duration_secs: u64) -> Result<()> {
    let mut audio_rx = radio.subscribe_audio();
    let mut spectrum_rx = radio.subscribe_spectrum();
    let mut mini_rx = radio.subscribe_mini_spectrum();
    let (mut audio, mut spectrum, mut mini) = (0u64, 0u64, 0u64);

    let deadline = tokio::time::sleep(Duration::from_secs(duration_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            Ok(_) = audio_rx.recv() => audio += 1,
            Ok(frame) = spectrum_rx.recv() => {
                spectrum += 1;
                if spectrum == 1 {
                    println!(
                        "First panadapter line: rx {} center {} span {} Hz, {} bins",
                        frame.receiver,
                        frame.center_freq_hz,
                        show(frame.span_hz()),
                        frame.bins.len()
                    );
                }
            }
            Ok(_) = mini_rx.recv() => mini += 1,
            _ = &mut deadline => break,
        }
    }

    println!("Audio frames:     {audio}");
    println!("Spectrum lines:   {spectrum}");
    println!("Mini-pan lines:   {mini}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let radio = radio_builder(&cli)?
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", cli.host))?;
    tracing::info!(host = %cli.host, "Connected");

    let result = match &cli.command {
        Command::State { settle } => cmd_state(&radio, *settle).await,
        Command::Monitor { duration } => cmd_monitor(&radio, *duration).await,
        Command::Send { command, wait } => cmd_send(&radio, command, *wait).await,
        Command::Freq { freq_hz, rx } => cmd_freq(&radio, *rx, *freq_hz).await,
        Command::Mode { mode, rx } => cmd_mode(&radio, *rx, mode).await,
        Command::Ptt { state } => cmd_ptt(&radio, state).await,
        Command::Streams { duration } => cmd_streams(&radio, *duration).await,
    };

    radio.disconnect().await.ok();
    result
}

#[cfg(all(test, feature = "tls"))]
mod tests {
    use super::*;

    fn cli(key: &str) -> Cli {
        Cli::try_parse_from([
            "k4link-monitor",
            "--host",
            "127.0.0.1",
            "--tls-identity",
            "k4",
            "--tls-key",
            key,
            "state",
        ])
        .unwrap()
    }

    #[test]
    fn tls_key_is_hex_decoded() {
        assert!(radio_builder(&cli(" 0a1B2c ")).is_ok());
    }

    #[test]
    fn malformed_tls_key_is_an_error() {
        for key in ["abc", "zz", "a\u{e9}b"] {
            let err = radio_builder(&cli(key)).unwrap_err();
            assert!(err.to_string().contains("--tls-key"), "{key}: {err}");
        }
    }
}
