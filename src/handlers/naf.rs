// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! NAF digest exchange.
//!
//! The client's Digest username is the B-TID; the secret is the base64
//! Ks_NAF derived from the cached vector and the Ua security-protocol id
//! of this very connection (plaintext or the negotiated TLS cipher).

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use hyper::{Body, Request, Response, header, http::request::Parts};
use tracing::{debug, info, warn};

use crate::{
    cache::AvCache,
    kdf::{UA_ORG_3GPP, UA_PROTO_HTTP, derive_ks_naf, ua_proto_for_cipher},
    models::digest::{Authorization, AuthenticationInfo, WwwAuthenticate},
    utils::rand_text,
};

/// Application hook invoked once the request is authenticated.
pub type AppHandler =
    Box<dyn Fn(&Parts, &Bytes) -> (u16, Vec<u8>) + Send + Sync + 'static>;

pub struct NafServer {
    cache: Arc<AvCache>,
    product: String,
    app: AppHandler,
}

impl NafServer {
    pub fn new(cache: Arc<AvCache>, product: String) -> Self {
        Self::with_app(cache, product, Box::new(|_, _| (200, b"result".to_vec())))
    }

    pub fn with_app(cache: Arc<AvCache>, product: String, app: AppHandler) -> Self {
        Self {
            cache,
            product,
            app,
        }
    }

    /// Handles one request. `cipher` is the cipher-suite id of the carrying
    /// TLS connection, `None` on plaintext.
    pub async fn handle(
        &self,
        req: Request<Body>,
        cipher: Option<u16>,
    ) -> Response<Body> {
        let (parts, body) = req.into_parts();
        let body = match hyper::body::to_bytes(body).await {
            Ok(b) => b,
            Err(e) => {
                warn!("failed to read request body: {e}");
                return self.challenge("");
            },
        };

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let auth = match parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(Authorization::parse)
        {
            Some(Ok(a)) if !a.username.is_empty() && !a.realm.is_empty() => a,
            _ => return self.challenge(&host),
        };

        // The username carries the B-TID.
        let av = match self.cache.get(&auth.username).await {
            Ok(Some((av, _))) => av,
            Ok(None) => {
                debug!(btid = %auth.username, "unknown or expired B-TID");
                return self.challenge(&host);
            },
            Err(e) => {
                warn!("AV cache lookup failed: {e}");
                return self.challenge(&host);
            },
        };

        let realm = format!("3GPP-bootstrapping@{host}");
        if auth.realm != realm {
            debug!(got = %auth.realm, want = %realm, "realm mismatch");
            return self.status(403);
        }

        let proto = cipher.map(ua_proto_for_cipher).unwrap_or(UA_PROTO_HTTP);
        let ks_naf = STANDARD.encode(derive_ks_naf(
            &av.ck,
            &av.ik,
            &av.rand,
            &av.impi,
            &host,
            UA_ORG_3GPP,
            proto,
        ));
        debug!(
            impi = %av.impi,
            proto = %format!("{proto:#x}"),
            "derived Ks_NAF for verification"
        );

        let expected = auth.compute_response(parts.method.as_str(), ks_naf.as_bytes(), &body);
        if auth.response != Some(expected) {
            debug!(btid = %auth.username, "digest response mismatch");
            return self.challenge(&host);
        }

        let (status, app_body) = (self.app)(&parts, &body);

        let auth_info = AuthenticationInfo {
            nextnonce: rand_text(),
            qop: auth.qop.clone(),
            rspauth: Some(auth.compute_response("", ks_naf.as_bytes(), &app_body)),
            cnonce: auth.cnonce.clone(),
            nc: auth.nc,
        };

        info!(btid = %auth.username, status, "NAF request authenticated");
        Response::builder()
            .status(status)
            .header(header::SERVER, format!("{} NAF", self.product))
            .header("Authentication-Info", auth_info.to_string())
            .body(Body::from(app_body))
            .unwrap_or_default()
    }

    fn status(&self, code: u16) -> Response<Body> {
        Response::builder()
            .status(code)
            .header(header::SERVER, format!("{} NAF", self.product))
            .body(Body::empty())
            .unwrap_or_default()
    }

    fn challenge(&self, host: &str) -> Response<Body> {
        let www = WwwAuthenticate {
            realm: format!("3GPP-bootstrapping@{host}"),
            nonce: rand_text(),
            qop: vec!["auth-int".to_string()],
            opaque: rand_text(),
            algorithm: "MD5".to_string(),
            ..WwwAuthenticate::default()
        };
        Response::builder()
            .status(401)
            .header(header::SERVER, format!("{} NAF", self.product))
            .header(header::WWW_AUTHENTICATE, www.to_string())
            .body(Body::empty())
            .unwrap_or_default()
    }
}
