// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! BSF bootstrap exchange.
//!
//! Stateless per request: everything is recovered from the client's
//! `Authorization` header and the AV cache. The challenge nonce is always
//! `base64(RAND ‖ AUTN)` of the vector in play, so the B-TID the client
//! echoes back locates that same vector.

use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hyper::{Body, Request, Response, header};
use tracing::{debug, info, warn};

use crate::{
    cache::AvCache,
    hss::client::{DiameterPeer, HssClient},
    models::{
        av::Av,
        bootstrap_info::BootstrappingInfo,
        btid::{aka_nonce, mint_btid},
        digest::{Authorization, AuthenticationInfo, WwwAuthenticate},
    },
    utils::{canonical_host, rand_text},
};

pub struct BsfServer<P> {
    cache: Arc<AvCache>,
    hss: HssClient<P>,
    lifetime: Duration,
    product: String,
}

impl<P: DiameterPeer> BsfServer<P> {
    pub fn new(
        cache: Arc<AvCache>,
        hss: HssClient<P>,
        lifetime: Duration,
        product: String,
    ) -> Self {
        Self {
            cache,
            hss,
            lifetime,
            product,
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let (parts, body) = req.into_parts();
        let body = match hyper::body::to_bytes(body).await {
            Ok(b) => b,
            Err(e) => {
                warn!("failed to read request body: {e}");
                return self.status(500);
            },
        };

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let realm = canonical_host(host).to_string();

        let auth = match parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(Authorization::parse)
        {
            Some(Ok(a)) if !a.username.is_empty() && !a.realm.is_empty() => a,
            _ => return self.status(400),
        };
        // The client authenticates against this very host.
        if auth.realm != realm {
            debug!(got = %auth.realm, want = %realm, "realm does not match Host");
            return self.status(400);
        }

        let auts: Option<[u8; 14]> = if auth.auts.is_empty() {
            None
        } else {
            match STANDARD.decode(&auth.auts).ok().and_then(|raw| raw.try_into().ok()) {
                Some(raw) => Some(raw),
                None => {
                    debug!("auts parameter is not 14 octets");
                    return self.status(400);
                },
            }
        };

        let btid = mint_btid(&auth.nonce, &auth.username, &auth.realm);
        let cached = match self.cache.get(&btid).await {
            Ok(v) => v,
            Err(e) => {
                warn!("AV cache lookup failed: {e}");
                return self.status(500);
            },
        };

        if let Some(response) = auth.response {
            let Some((av, _)) = &cached else {
                // Citing a nonce we no longer hold forces a fresh bootstrap.
                debug!(btid = %btid, "response for unknown or expired B-TID");
                return self.status(400);
            };
            // A resync request authenticates with an empty secret; the
            // cached XRES is void until the HSS answers.
            let secret: &[u8] = if auts.is_some() { b"" } else { &av.res };
            let expected = auth.compute_response(parts.method.as_str(), secret, &body);
            if expected != response {
                debug!(%btid, "digest response mismatch, re-challenging");
                return self.challenge(&realm, av);
            }
        } else if auts.is_some() {
            // Resync must accompany a response to a prior challenge.
            return self.status(400);
        }

        let needs_fetch = cached.is_none() || auts.is_some();
        let (av, expiry) = if needs_fetch {
            let resync = match (&cached, auts) {
                (Some((prior, _)), Some(auts)) => Some((prior.rand, auts)),
                _ => None,
            };
            let av = match self.hss.fetch_av(&auth.username, resync).await {
                Ok(av) => av,
                // Unknown identity, transport failure and malformed answers
                // all end the bootstrap the same way.
                Err(e) => {
                    warn!(impi = %auth.username, "HSS fetch failed: {e}");
                    return self.status(403);
                },
            };

            let expiry = Utc::now() + self.lifetime;
            let fresh_btid =
                mint_btid(&aka_nonce(&av.rand, &av.autn), &auth.username, &auth.realm);
            if let Err(e) = self.cache.set(&fresh_btid, &av, expiry).await {
                warn!("AV cache store failed: {e}");
                return self.status(500);
            }
            info!(impi = %auth.username, btid = %fresh_btid, "cached fresh AV");
            (av, expiry)
        } else {
            match cached {
                Some(v) => v,
                None => return self.status(500),
            }
        };

        if auth.response.is_none() || auts.is_some() {
            return self.challenge(&realm, &av);
        }

        self.verified(&auth, &av, &btid, expiry)
    }

    fn status(&self, code: u16) -> Response<Body> {
        Response::builder()
            .status(code)
            .header(header::SERVER, format!("{} BSF", self.product))
            .body(Body::empty())
            .unwrap_or_default()
    }

    fn challenge(&self, realm: &str, av: &Av) -> Response<Body> {
        let www = WwwAuthenticate {
            realm: realm.to_string(),
            nonce: aka_nonce(&av.rand, &av.autn),
            qop: vec!["auth-int".to_string()],
            opaque: rand_text(),
            algorithm: "AKAv1-MD5".to_string(),
            ..WwwAuthenticate::default()
        };
        Response::builder()
            .status(401)
            .header(header::SERVER, format!("{} BSF", self.product))
            .header(header::WWW_AUTHENTICATE, www.to_string())
            .body(Body::empty())
            .unwrap_or_default()
    }

    fn verified(
        &self,
        auth: &Authorization,
        av: &Av,
        btid: &str,
        expiry: DateTime<Utc>,
    ) -> Response<Body> {
        let info = BootstrappingInfo::new(btid.to_string(), expiry);
        let xml = match info.to_xml() {
            Ok(x) => x,
            Err(e) => {
                warn!("failed to serialise BootstrappingInfo: {e}");
                return self.status(500);
            },
        };

        let auth_info = AuthenticationInfo {
            nextnonce: auth.nonce.clone(),
            qop: auth.qop.clone(),
            rspauth: Some(auth.compute_response("", &av.res, xml.as_bytes())),
            cnonce: auth.cnonce.clone(),
            nc: auth.nc,
        };

        info!(%btid, "bootstrap verified");
        Response::builder()
            .status(200)
            .header(header::SERVER, format!("{} BSF", self.product))
            .header(header::CONTENT_TYPE, "application/vnd.3gpp.bsf+xml")
            .header(
                header::EXPIRES,
                expiry.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            )
            .header("Authentication-Info", auth_info.to_string())
            .body(Body::from(xml))
            .unwrap_or_default()
    }
}
