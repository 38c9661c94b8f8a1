// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal HTTP/1.1 requester over TCP or TLS.
//!
//! The Ua key derivation is a function of the negotiated TLS cipher suite,
//! so the client must see it on every response; general-purpose HTTP
//! clients hide it. One connection per request, `Connection: close`.

use std::{collections::HashMap, fs, io::BufReader, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow, bail, ensure};
use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::client::common::io_with_timeout;

/// A decoded HTTP response plus the transport-security observation the key
/// derivation needs.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Negotiated TLS cipher-suite id; `None` on plaintext connections.
    pub cipher: Option<u16>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name).map(String::as_str).unwrap_or("")
    }
}

pub struct HttpClient {
    tls: TlsConnector,
    timeout_connection: Duration,
    cancel: CancellationToken,
}

impl HttpClient {
    pub fn new(
        insecure_skip_verify: bool,
        ca_file: Option<&str>,
        timeout_connection: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let config = if insecure_skip_verify {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(danger::no_verify())
                .with_no_client_auth()
        } else {
            let mut roots = rustls::RootCertStore::empty();
            if let Some(path) = ca_file {
                let pem = fs::read(path)
                    .with_context(|| format!("failed to read CA bundle {path}"))?;
                for cert in rustls_pemfile::certs(&mut BufReader::new(pem.as_slice())) {
                    roots
                        .add(cert.context("malformed certificate in CA bundle")?)
                        .context("rejected certificate in CA bundle")?;
                }
            }
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };

        Ok(Self {
            tls: TlsConnector::from(Arc::new(config)),
            timeout_connection,
            cancel,
        })
    }

    /// Issues one request and reads the full response. `deadline` bounds
    /// the whole exchange, connect and TLS handshake included.
    pub async fn send(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: &[u8],
        deadline: Duration,
    ) -> Result<HttpResponse> {
        timeout(deadline, self.send_inner(method, url, headers, body))
            .await
            .map_err(|_| anyhow!("request to {url} timed out"))?
    }

    async fn send_inner(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse> {
        let host = url.host_str().context("URL without host")?;
        let port = url
            .port_or_known_default()
            .context("URL without usable port")?;
        let authority = host_header(url);

        let stream = io_with_timeout(
            "http connect",
            TcpStream::connect((host, port)),
            self.timeout_connection,
            &self.cancel,
        )
        .await?;
        stream.set_nodelay(true)?;

        let head = request_head(method, url, &authority, headers, body.len());
        debug!(method, url = %url, "sending request");

        match url.scheme() {
            "http" => {
                let mut stream = stream;
                let raw = exchange(&mut stream, &head, body).await?;
                parse_response(&raw, None)
            },
            "https" => {
                let name = rustls::pki_types::ServerName::try_from(host.to_string())
                    .map_err(|_| anyhow!("invalid TLS server name {host}"))?;
                let mut stream = self.tls.connect(name, stream).await?;
                let cipher = stream
                    .get_ref()
                    .1
                    .negotiated_cipher_suite()
                    .map(|s| u16::from(s.suite()));
                let raw = exchange(&mut stream, &head, body).await?;
                parse_response(&raw, cipher)
            },
            other => bail!("unsupported URL scheme {other}"),
        }
    }
}

/// The Host header value: authority with the port elided when it is the
/// scheme default. Must match what the server hashes into realms and keys.
pub fn host_header(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        _ => String::new(),
    }
}

fn request_head(
    method: &str,
    url: &Url,
    authority: &str,
    headers: &[(String, String)],
    body_len: usize,
) -> String {
    let mut target = url.path().to_string();
    if target.is_empty() {
        target.push('/');
    }
    if let Some(q) = url.query() {
        target.push('?');
        target.push_str(q);
    }

    let mut head = format!("{method} {target} HTTP/1.1\r\nHost: {authority}\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!(
        "Content-Length: {body_len}\r\nConnection: close\r\n\r\n"
    ));
    head
}

async fn exchange<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    head: &str,
    body: &[u8],
) -> Result<Vec<u8>> {
    stream.write_all(head.as_bytes()).await?;
    if !body.is_empty() {
        stream.write_all(body).await?;
    }
    stream.flush().await?;

    // Connection: close, so the peer ends the response with EOF.
    let mut raw = Vec::with_capacity(4096);
    stream.read_to_end(&mut raw).await?;
    Ok(raw)
}

fn parse_response(raw: &[u8], cipher: Option<u16>) -> Result<HttpResponse> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .context("response without header terminator")?;
    let head = std::str::from_utf8(&raw[..split]).context("non-UTF8 response head")?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().context("empty response head")?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    ensure!(
        version.starts_with("HTTP/1."),
        "unexpected HTTP version {version:?}"
    );
    let status: u16 = parts
        .next()
        .context("status line without code")?
        .parse()
        .context("malformed status code")?;

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let mut body = raw[split + 4..].to_vec();
    if let Some(len) = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
    {
        ensure!(body.len() >= len, "truncated response body");
        body.truncate(len);
    }

    Ok(HttpResponse {
        status,
        headers,
        body: Bytes::from(body),
        cipher,
    })
}

mod danger {
    use std::sync::Arc;

    use once_cell::sync::Lazy;
    use rustls::{
        DigitallySignedStruct, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
        pki_types::{CertificateDer, ServerName, UnixTime},
    };

    /// Certificate verifier that accepts everything. Test deployments only;
    /// gated behind `Me.InsecureSkipVerify`.
    #[derive(Debug)]
    pub(super) struct NoVerify(CryptoProvider);

    static NO_VERIFY: Lazy<Arc<NoVerify>> =
        Lazy::new(|| Arc::new(NoVerify(rustls::crypto::ring::default_provider())));

    pub(super) fn no_verify() -> Arc<NoVerify> {
        NO_VERIFY.clone()
    }

    impl ServerCertVerifier for NoVerify {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
