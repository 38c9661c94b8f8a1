// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accept loops for the BSF/NAF endpoints.
//!
//! Connections are served one hyper HTTP/1.1 state machine each. TLS
//! listeners capture the negotiated cipher-suite id after the handshake
//! and hand it to the request handler; the NAF key derivation depends
//! on it.

use std::{convert::Infallible, fs, io::BufReader, sync::Arc};

use anyhow::{Context, Result};
use hyper::{Body, Request, Response, server::conn::Http, service::service_fn};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Loads PEM material into a TLS acceptor.
pub fn load_tls_acceptor(cert_file: &str, key_file: &str) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(
        fs::read(cert_file)
            .with_context(|| format!("failed to read {cert_file}"))?
            .as_slice(),
    ))
    .collect::<Result<Vec<_>, _>>()
    .context("malformed certificate chain")?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(
        fs::read(key_file)
            .with_context(|| format!("failed to read {key_file}"))?
            .as_slice(),
    ))
    .context("malformed private key")?
    .context("no private key found")?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate/key pair")?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Serves plaintext connections until cancelled.
pub async fn serve_plain<H, Fut>(
    listener: TcpListener,
    cancel: CancellationToken,
    handler: H,
) -> Result<()>
where
    H: Fn(Request<Body>, Option<u16>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send,
{
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };
        debug!(%peer, "accepted connection");

        let handler = handler.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler(req, None).await) }
            });
            if let Err(e) = Http::new().serve_connection(stream, service).await {
                debug!("connection from {peer} ended: {e}");
            }
        });
    }
}

/// Serves TLS connections until cancelled, capturing the negotiated
/// cipher-suite id per connection.
pub async fn serve_tls<H, Fut>(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    cancel: CancellationToken,
    handler: H,
) -> Result<()>
where
    H: Fn(Request<Body>, Option<u16>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send,
{
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };

        let acceptor = acceptor.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("TLS handshake with {peer} failed: {e}");
                    return;
                },
            };
            let cipher = stream
                .get_ref()
                .1
                .negotiated_cipher_suite()
                .map(|s| u16::from(s.suite()));
            debug!(%peer, ?cipher, "accepted TLS connection");

            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler(req, cipher).await) }
            });
            if let Err(e) = Http::new().serve_connection(stream, service).await {
                debug!("connection from {peer} ended: {e}");
            }
        });
    }
}
