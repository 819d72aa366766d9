//! Whole-stack tests through the facade: bytes in, typed state out.

use std::time::Duration;

use k4link::protocol::packet::{END_MARKER, START_MARKER};
use k4link::protocol::{Packet, PacketFramer, build_cat_packet};
use k4link::{
    ConnectionEvent, Error, Field, FieldValue, K4RadioBuilder, Mode, ModelEvent, RadioStateModel,
    ReceiverId,
};
use k4link_test_harness::MockK4Server;

#[test]
fn framed_cat_reaches_the_model() {
    let bytes = build_cat_packet("MD3;");
    let mut framer = PacketFramer::new();

    // Split the frame mid-header to exercise reassembly.
    let mut packets = framer.feed(&bytes[..5]);
    assert!(packets.is_empty());
    packets.extend(framer.feed(&bytes[5..]));
    assert_eq!(packets, vec![Packet::Cat("MD3;".into())]);

    let mut model = RadioStateModel::new();
    let Packet::Cat(text) = &packets[0] else {
        panic!("expected CAT packet");
    };
    let changes = model.apply_text(text);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, Field::Mode(ReceiverId::VFO_A));
    assert_eq!(changes[0].value, FieldValue::Mode(Mode::Cw));
    assert!(model.apply_text(text).is_empty());
}

#[tokio::test]
async fn radio_session_against_mock() -> anyhow::Result<()> {
    let mut server = MockK4Server::new().await?;
    server.require_hash(&k4link::client::auth::password_hash("secret"));
    server.greet_cat("FA00007074000;MD6;KS022;");
    server.start();

    let radio = K4RadioBuilder::new("127.0.0.1")
        .port(server.port())
        .password("secret")
        .keepalive_interval(None)
        .build()?;
    let mut events = radio.subscribe_state().await;
    radio.connect().await?;

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(ModelEvent::FieldChanged(change)) = events.recv().await {
                if change.field == Field::KeyerSpeed {
                    break;
                }
            }
        }
    })
    .await?;

    let state = radio.state().await;
    assert_eq!(state.main.frequency_hz, Some(7_074_000));
    assert_eq!(state.main.mode, Some(Mode::Data));
    assert_eq!(state.keyer_speed_wpm, Some(22));

    radio.set_frequency(ReceiverId::VFO_B, 7_076_000).await?;
    assert_eq!(
        radio.get_field(&Field::Frequency(ReceiverId::VFO_B)).await,
        Some(FieldValue::Int(7_076_000))
    );

    radio.disconnect().await?;
    let report = server.wait().await.map_err(anyhow::Error::msg)?;
    assert!(report.received.contains(&"FB00007076000;".to_string()));
    assert_eq!(report.received.last().map(String::as_str), Some("RRN;"));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_reported_once() -> anyhow::Result<()> {
    let mut server = MockK4Server::new().await?;
    server.require_hash(&k4link::client::auth::password_hash("secret"));
    server.start();

    let radio = K4RadioBuilder::new("127.0.0.1")
        .port(server.port())
        .password("wrong")
        .build()?;
    let mut connection_events = radio.subscribe_connection();

    let result = radio.connect().await;
    assert!(matches!(result, Err(Error::AuthenticationFailed(_))));

    let mut failures = 0;
    while let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_millis(200), connection_events.recv()).await
    {
        if matches!(event, ConnectionEvent::AuthenticationFailed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_frames_before_greeting_are_skipped() -> anyhow::Result<()> {
    // A frame whose end marker is wrong, then line noise, then a good frame.
    let mut corrupt = START_MARKER.to_vec();
    corrupt.extend_from_slice(&7u32.to_be_bytes());
    corrupt.extend_from_slice(&[0x00, 0x00, 0x00, b'M', b'D', b'1', b';']);
    corrupt.extend(END_MARKER.iter().map(|b| !b));
    corrupt.extend_from_slice(&[0x13, 0x37, START_MARKER[0]]);

    let mut server = MockK4Server::new().await?;
    server.greet_raw(&corrupt);
    server.greet_cat("FA00021074000;");
    server.start();

    let radio = K4RadioBuilder::new("127.0.0.1")
        .port(server.port())
        .keepalive_interval(None)
        .build()?;
    let mut events = radio.subscribe_state().await;
    radio.connect().await?;

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(ModelEvent::FieldChanged(change)) = events.recv().await {
                if change.field == Field::Frequency(ReceiverId::VFO_A) {
                    break;
                }
            }
        }
    })
    .await?;

    let state = radio.state().await;
    assert_eq!(state.main.frequency_hz, Some(21_074_000));
    assert_eq!(state.main.mode, None);

    radio.disconnect().await?;
    server.wait().await.map_err(anyhow::Error::msg)?;
    Ok(())
}
