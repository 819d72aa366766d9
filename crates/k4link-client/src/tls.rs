//! TLS-PSK transport (feature `tls`).
//!
//! The K4 accepts TLS 1.2 only, authenticated by a pre-shared key instead
//! of certificates. The cipher list is restricted to a single
//! forward-secret PSK suite and peer verification is off, since there is
//! no certificate to verify.

use std::pin::Pin;

use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use k4link_core::{Error, Result};

/// The only cipher suite offered.
pub const PSK_CIPHER: &str = "ECDHE-PSK-CHACHA20-POLY1305";

fn tls_err(e: ErrorStack) -> Error {
    Error::Tls(e.to_string())
}

/// Run the TLS-PSK handshake over an established TCP stream.
pub(crate) async fn handshake(
    tcp: TcpStream,
    identity: &str,
    key: &[u8],
) -> Result<SslStream<TcpStream>> {
    let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(tls_err)?;
    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(tls_err)?;
    builder
        .set_max_proto_version(Some(SslVersion::TLS1_2))
        .map_err(tls_err)?;
    builder.set_cipher_list(PSK_CIPHER).map_err(tls_err)?;
    builder.set_verify(SslVerifyMode::NONE);

    let identity = identity.as_bytes().to_vec();
    let key = key.to_vec();
    builder.set_psk_client_callback(move |_ssl, _hint, identity_out, psk_out| {
        // Identity is written nul-terminated.
        if identity.len() >= identity_out.len() || key.len() > psk_out.len() {
            tracing::error!("TLS-PSK identity or key exceeds OpenSSL buffer");
            return Err(ErrorStack::get());
        }
        identity_out[..identity.len()].copy_from_slice(&identity);
        identity_out[identity.len()] = 0;
        psk_out[..key.len()].copy_from_slice(&key);
        Ok(key.len())
    });

    let connector = builder.build();
    let mut config = connector.configure().map_err(tls_err)?;
    config.set_verify_hostname(false);
    config.set_use_server_name_indication(false);
    let ssl = config.into_ssl("k4").map_err(tls_err)?;

    let mut stream = SslStream::new(ssl, tcp).map_err(tls_err)?;
    Pin::new(&mut stream)
        .connect()
        .await
        .map_err(|e| Error::Tls(format!("handshake failed: {e}")))?;

    tracing::debug!(
        version = stream.ssl().version_str(),
        cipher = stream.ssl().current_cipher().map(|c| c.name()),
        "TLS-PSK handshake complete"
    );
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConnectionBuilder;
    use k4link_core::{ConnectionEvent, ConnectionState};
    use k4link_protocol::build_cat_packet;
    use k4link_protocol::packet::START_MARKER;
    use openssl::ssl::{Ssl, SslContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const IDENTITY: &str = "k4-remote";
    const KEY: &[u8] = b"0123456789abcdef";

    struct Accepted {
        version: &'static str,
        cipher: Option<String>,
        first_bytes: Vec<u8>,
    }

    /// One-shot TLS 1.2 PSK server on loopback that knows only `IDENTITY`/`KEY`.
    async fn psk_server() -> (u16, JoinHandle<std::result::Result<Accepted, String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut ctx = SslContext::builder(SslMethod::tls_server()).unwrap();
        ctx.set_min_proto_version(Some(SslVersion::TLS1_2)).unwrap();
        ctx.set_max_proto_version(Some(SslVersion::TLS1_2)).unwrap();
        ctx.set_cipher_list(PSK_CIPHER).unwrap();
        ctx.set_psk_server_callback(|_ssl, identity, psk| {
            if identity != Some(IDENTITY.as_bytes()) {
                return Ok(0);
            }
            psk[..KEY.len()].copy_from_slice(KEY);
            Ok(KEY.len())
        });
        let ctx = ctx.build();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.map_err(|e| e.to_string())?;
            let ssl = Ssl::new(&ctx).map_err(|e| e.to_string())?;
            let mut stream = SslStream::new(ssl, tcp).map_err(|e| e.to_string())?;
            Pin::new(&mut stream)
                .accept()
                .await
                .map_err(|e| e.to_string())?;

            let version = stream.ssl().version_str();
            let cipher = stream.ssl().current_cipher().map(|c| c.name().to_string());

            stream
                .write_all(&build_cat_packet("ID017;"))
                .await
                .map_err(|e| e.to_string())?;
            let mut first_bytes = vec![0u8; START_MARKER.len()];
            stream
                .read_exact(&mut first_bytes)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(Accepted {
                version,
                cipher,
                first_bytes,
            })
        });
        (port, server)
    }

    #[tokio::test]
    async fn handshake_negotiates_tls12_psk() {
        let (port, server) = psk_server().await;
        let tcp = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let mut stream = handshake(tcp, IDENTITY, KEY).await.unwrap();
        assert_eq!(stream.ssl().version_str(), "TLSv1.2");
        assert_eq!(
            stream.ssl().current_cipher().map(|c| c.name()),
            Some(PSK_CIPHER)
        );

        let mut greeting = vec![0u8; build_cat_packet("ID017;").len()];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, build_cat_packet("ID017;"));
        stream.write_all(&START_MARKER).await.unwrap();

        let accepted = server.await.unwrap().unwrap();
        assert_eq!(accepted.version, "TLSv1.2");
        assert_eq!(accepted.cipher.as_deref(), Some(PSK_CIPHER));
    }

    #[tokio::test]
    async fn tls_session_skips_password_hash() {
        let (port, server) = psk_server().await;
        let manager = ConnectionBuilder::new("127.0.0.1")
            .port(port)
            .tls_psk(IDENTITY, KEY)
            .keepalive_interval(None)
            .build()
            .unwrap();
        let mut events = manager.subscribe();

        manager.connect().await.unwrap();
        loop {
            let event = events.recv().await.unwrap();
            if event
                == (ConnectionEvent::StateChanged {
                    state: ConnectionState::Connected,
                })
            {
                break;
            }
        }

        // The first bytes after the handshake are a framed init command.
        let accepted = server.await.unwrap().unwrap();
        assert_eq!(accepted.first_bytes, START_MARKER);
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn wrong_key_is_authentication_failure() {
        let (port, server) = psk_server().await;
        let manager = ConnectionBuilder::new("127.0.0.1")
            .port(port)
            .tls_psk(IDENTITY, b"not the radio key")
            .keepalive_interval(None)
            .build()
            .unwrap();
        let mut events = manager.subscribe();

        let result = manager.connect().await;
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(server.await.unwrap().is_err());

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ConnectionEvent::AuthenticationFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }
}
