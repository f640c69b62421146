// src/checker/raw.rs
// =============================================================================
// The last-resort probe: a hand-written HTTP request over a plain socket.
//
// By the time we get here, reqwest got no response at all with or without
// certificate checks. This stage is deliberately dumb:
// - connect with tokio's TcpStream (TLS on top for https, no verification)
// - send a minimal HEAD, then GET if HEAD produced nothing or an error status
// - read until the first line arrives, the byte cap is hit, or EOF
// - redirects are not followed; a 3xx counts as reachable
//
// A reply without a parsable status line still proves someone is listening,
// so it counts as reachable.
// =============================================================================

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{
    ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use url::{Host, Url};

use super::http::StageOutcome;
use crate::config::ProbePolicy;
use crate::links::LinkStatus;

#[derive(Clone)]
pub(crate) struct RawProber {
    timeout: Duration,
    user_agent: String,
    max_bytes: usize,
    /// None when no TLS config could be built; https is then skipped
    tls: Option<TlsConnector>,
}

impl std::fmt::Debug for RawProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawProber")
            .field("timeout", &self.timeout)
            .field("max_bytes", &self.max_bytes)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl RawProber {
    pub(crate) fn new(policy: &ProbePolicy) -> Self {
        let tls = match insecure_tls_connector() {
            Ok(connector) => Some(connector),
            Err(e) => {
                warn!(error = %e, "TLS unavailable for raw probes, https will be skipped");
                None
            }
        };

        Self {
            timeout: policy.timeout(),
            user_agent: policy.user_agent.clone(),
            // Room for a status line and headers on top of the body cap
            max_bytes: policy.max_body_bytes.max(256),
            tls,
        }
    }

    /// HEAD, then GET unless HEAD got a 2xx/3xx
    ///
    /// A HEAD error status stands only when GET gets no answer at all.
    pub(crate) async fn probe(&self, url: &Url) -> StageOutcome {
        let mut outcome = StageOutcome::NoResponse(String::from("no response"));

        for method in ["HEAD", "GET"] {
            let answer = match self.exchange(url, method).await {
                Ok(bytes) if !bytes.is_empty() => parse_response(&bytes),
                Ok(_) => StageOutcome::NoResponse(format!("{} got an empty reply", method)),
                Err(e) => {
                    debug!(url = %url, method, error = %e, "Raw probe failed");
                    StageOutcome::NoResponse(e.to_string())
                }
            };

            match answer {
                StageOutcome::NoResponse(_) if outcome.verdict().is_some() => {}
                answer => outcome = answer,
            }
            if outcome.verdict() == Some(LinkStatus::Ok) {
                break;
            }
        }

        outcome
    }

    async fn exchange(&self, url: &Url, method: &str) -> io::Result<Vec<u8>> {
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(io::Error::new(io::ErrorKind::InvalidInput, "URL has no host")),
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let stream = timeout(self.timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        let request = build_request(method, url, &self.user_agent);

        if url.scheme() == "https" {
            let connector = self
                .tls
                .as_ref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no TLS connector"))?;
            let name = ServerName::try_from(host)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let tls = timeout(self.timeout, connector.connect(name, stream))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
            send_and_read(tls, request.as_bytes(), self.max_bytes, self.timeout).await
        } else {
            send_and_read(stream, request.as_bytes(), self.max_bytes, self.timeout).await
        }
    }
}

fn build_request(method: &str, url: &Url, user_agent: &str) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let host = url.host_str().unwrap_or_default();
    let host_header = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        method, target, host_header, user_agent
    )
}

/// Writes the request and reads until a full first line, the cap, or EOF
///
/// A read that stalls after some bytes arrived ends the exchange with what
/// we have; a stall before any byte is a timeout.
async fn send_and_read<S>(mut stream: S, request: &[u8], max_bytes: usize, wait: Duration) -> io::Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(wait, async {
        stream.write_all(request).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))??;

    let mut received = Vec::with_capacity(max_bytes.min(4096));
    let mut chunk = [0u8; 1024];

    while received.len() < max_bytes && !received.contains(&b'\n') {
        match timeout(wait, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => received.extend_from_slice(&chunk[..n]),
            Ok(Err(_)) | Err(_) if !received.is_empty() => break,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        }
    }

    received.truncate(max_bytes);
    Ok(received)
}

/// Classifies whatever the server sent back
pub(crate) fn parse_response(bytes: &[u8]) -> StageOutcome {
    if bytes.is_empty() {
        return StageOutcome::NoResponse("empty reply".to_string());
    }

    let text = String::from_utf8_lossy(bytes);
    let first_line = text.lines().next().unwrap_or("");

    // "HTTP/1.1 404 Not Found" -> 404
    if first_line.starts_with("HTTP/") {
        if let Some(code) = first_line
            .split_whitespace()
            .nth(1)
            .filter(|c| c.len() == 3)
            .and_then(|c| c.parse::<u16>().ok())
        {
            return StageOutcome::Status(code);
        }
    }

    StageOutcome::Reachable
}

/// TLS client config that accepts any certificate
fn insecure_tls_connector() -> Result<TlsConnector, tokio_rustls::rustls::Error> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Skips chain validation but still checks handshake signatures
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
