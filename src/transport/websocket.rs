//! WebSocket dialer for streaming results.
//!
//! A streaming dataplane redirect points at an `http(s)` URI. The socket is
//! opened on the matching `ws(s)` URI and authenticated with a single `auth`
//! message before the server starts pushing frames.

use futures_util::SinkExt;
use reqwest::Url;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{DeltaStreamError, Result, TransportError};

use super::messages::ClientMessage;

/// Header carrying the session id on the upgrade request.
pub const SESSION_HEADER: &str = "ds-session-id";

/// Socket type returned by [`StreamDialer::connect`].
pub type StreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dialer for streaming result sockets.
#[derive(Debug, Clone)]
pub struct StreamDialer {
    handshake_timeout: Duration,
    insecure_tls: bool,
}

impl StreamDialer {
    /// Create a dialer with the given handshake timeout.
    pub fn new(handshake_timeout: Duration) -> Self {
        Self {
            handshake_timeout,
            insecure_tls: false,
        }
    }

    /// Skip certificate validation on `wss` sockets.
    pub fn insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    /// Open and authenticate a streaming socket.
    ///
    /// # Arguments
    ///
    /// * `uri` - `http` or `https` URI from the dataplane redirect
    /// * `token` - Bearer token from the dataplane redirect
    /// * `session_id` - Session id, sent as a header and in the auth message
    ///
    /// # Errors
    ///
    /// Returns a client error if the scheme is not `http`/`https`, the
    /// handshake fails or times out, or the auth message cannot be sent. A
    /// rejected upgrade reports the response body as the message.
    pub async fn connect(
        &self,
        uri: &str,
        token: &str,
        session_id: Option<&str>,
    ) -> Result<StreamSocket> {
        let url = streaming_url(uri)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| DeltaStreamError::Client(format!("invalid streaming uri: {}", e)))?;
        if let Some(session_id) = session_id {
            let value = HeaderValue::from_str(session_id)
                .map_err(|e| DeltaStreamError::Client(format!("invalid session id: {}", e)))?;
            request.headers_mut().insert(SESSION_HEADER, value);
        }

        debug!(url = %url, "opening streaming socket");
        let handshake = connect_async_tls_with_config(request, None, false, self.connector());
        let (mut socket, _) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: self.handshake_timeout.as_millis() as u64,
            })?
            .map_err(handshake_error)?;

        let auth = ClientMessage::Auth {
            access_token: token.to_string(),
            session_id: session_id.unwrap_or_default().to_string(),
        };
        let json = serde_json::to_string(&auth)
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
        socket
            .send(Message::Text(json))
            .await
            .map_err(|e| DeltaStreamError::Client(format!("unable to send request: {}", e)))?;

        Ok(socket)
    }
}

impl StreamDialer {
    /// TLS connector for `wss` sockets; `None` uses the webpki roots.
    fn connector(&self) -> Option<Connector> {
        if !self.insecure_tls {
            return None;
        }
        let config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
            .with_no_client_auth();
        Some(Connector::Rustls(Arc::new(config)))
    }
}

/// Verifier that accepts any server certificate.
#[derive(Debug)]
struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Map a dataplane URI onto its socket scheme.
pub fn streaming_url(uri: &str) -> Result<Url> {
    let mut url = Url::parse(uri)
        .map_err(|e| DeltaStreamError::Client(format!("invalid streaming uri: {}", e)))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => {
            return Err(DeltaStreamError::Client(
                "unsupported scheme in streaming result set".to_string(),
            ))
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        DeltaStreamError::Client("unsupported scheme in streaming result set".to_string())
    })?;
    Ok(url)
}

fn handshake_error(err: WsError) -> DeltaStreamError {
    match err {
        WsError::Http(response) => {
            let body = response
                .body()
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .unwrap_or_default();
            if body.is_empty() {
                DeltaStreamError::Client(format!(
                    "streaming handshake rejected with status {}",
                    response.status().as_u16()
                ))
            } else {
                DeltaStreamError::Client(body)
            }
        }
        other => TransportError::from(other).into(),
    }
}
