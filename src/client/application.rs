// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! GBA_ME application client: drives NAF requests, bootstrapping against
//! the BSF whenever the NAF challenges.

use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cfg::config::MeConfig,
    client::{
        http::{HttpClient, host_header},
        session::{SessionKey, SessionMap},
    },
    hss::server::SubscriberDb,
    kdf::{UA_ORG_3GPP, UA_PROTO_HTTP, derive_ks_naf, ua_proto_for_cipher},
    models::{
        av::Av,
        digest::{Authorization, AuthenticationInfo, WwwAuthenticate},
        errors::GbaError,
    },
    state_machine::{bootstrap_states::BootstrapCtx, common::StateMachineCtx},
    utils::rand_text,
};

/// One application request handed to the ME.
#[derive(Debug, Clone, Default)]
pub struct MeRequest {
    pub method: String,
    /// Absolute NAF URL.
    pub url: String,
    pub impi: String,
    /// Optional IMPU, forwarded as `X-3GPP-Intended-Identity`.
    pub impu: Option<String>,
    pub body: Vec<u8>,
    /// Control operation: drop the cached challenge and B-TID first.
    pub clear_cache: bool,
    /// Test hook: replace individual AV fields for this request.
    pub overrides: AvOverride,
}

/// Per-request AV field replacements (load and fault-injection drivers).
#[derive(Debug, Clone, Default)]
pub struct AvOverride {
    pub rand: Option<[u8; 16]>,
    pub autn: Option<[u8; 16]>,
    pub res: Option<Vec<u8>>,
    pub ik: Option<[u8; 16]>,
    pub ck: Option<[u8; 16]>,
}

impl AvOverride {
    fn apply(&self, av: &mut Av) {
        if let Some(v) = self.rand {
            av.rand = v;
        }
        if let Some(v) = self.autn {
            av.autn = v;
        }
        if let Some(v) = &self.res {
            av.res = v.clone();
        }
        if let Some(v) = self.ik {
            av.ik = v;
        }
        if let Some(v) = self.ck {
            av.ck = v;
        }
    }
}

/// What the NAF answered once authentication settled.
#[derive(Debug)]
pub struct MeAnswer {
    pub code: u16,
    pub body: Bytes,
}

pub struct GbaClient<D> {
    me: MeConfig,
    bsf_url: Url,
    http: HttpClient,
    sessions: SessionMap,
    db: Arc<D>,
}

impl<D: SubscriberDb> GbaClient<D> {
    pub fn new(
        me: MeConfig,
        timeout_connection: Duration,
        db: Arc<D>,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let bsf_url = Url::parse(&me.bsf_url)?;
        let http = HttpClient::new(
            me.insecure_skip_verify,
            me.ca_file.as_deref(),
            timeout_connection,
            cancel,
        )?;
        Ok(Self {
            me,
            bsf_url,
            http,
            sessions: SessionMap::new(),
            db,
        })
    }

    /// Invalidates one (scheme, NAF, IMPI) association.
    pub fn clear_cache(&self, scheme: &str, host: &str, impi: &str) -> bool {
        self.sessions.clear(&SessionKey {
            scheme: scheme.to_string(),
            host: host.to_string(),
            impi: impi.to_string(),
        })
    }

    /// Issues one application request, bootstrapping as needed. The retry
    /// budget and the `expire` deadline both bound the loop.
    pub async fn request(&self, req: MeRequest) -> Result<MeAnswer, GbaError> {
        let mut av = self
            .db
            .lookup(&req.impi)
            .await
            .ok_or(GbaError::HssUnknownIdentity)?;
        req.overrides.apply(&mut av);
        debug!(impi = %req.impi, av = %av, "retrieved AV info");

        let url = Url::parse(&req.url)
            .map_err(|e| GbaError::TransportError(format!("invalid NAF URL: {e}")))?;
        let key = SessionKey {
            scheme: url.scheme().to_string(),
            host: host_header(&url),
            impi: req.impi.clone(),
        };

        if req.clear_cache {
            info!(host = %key.host, "clearing cached challenge and B-TID");
            self.sessions.clear(&key);
        }

        // One writer per association: nc stays strictly monotone.
        let entry = self.sessions.entry(&key);
        let mut session = entry.lock().await;

        let deadline = Instant::now() + self.me.expire;
        let mut uri = url.path().to_string();
        if uri.is_empty() {
            uri = "/".to_string();
        }

        for attempt in 0..self.me.auth_retransmit {
            let mut headers = Vec::with_capacity(3);

            if let (Some(btid), Some(challenge)) =
                (session.btid.clone(), session.naf_auth.clone())
                && !challenge.nonce.is_empty()
            {
                session.nc += 1;
                let mut auth = Authorization {
                    username: btid,
                    realm: challenge.realm.clone(),
                    uri: uri.clone(),
                    nonce: challenge.nonce.clone(),
                    nc: session.nc,
                    cnonce: rand_text(),
                    opaque: challenge.opaque.clone(),
                    ..Authorization::default()
                };
                auth.qop = if challenge.offers_auth_int() {
                    "auth-int".to_string()
                } else {
                    "auth".to_string()
                };

                let proto = session
                    .cipher
                    .map(ua_proto_for_cipher)
                    .unwrap_or(UA_PROTO_HTTP);
                let ks_naf = STANDARD.encode(derive_ks_naf(
                    &av.ck,
                    &av.ik,
                    &av.rand,
                    &av.impi,
                    &key.host,
                    UA_ORG_3GPP,
                    proto,
                ));
                debug!(
                    naf = %key.host,
                    proto = %format!("{proto:#x}"),
                    nc = session.nc,
                    "derived Ks_NAF for request"
                );
                auth.set_response(&req.method, ks_naf.as_bytes(), &req.body);
                headers.push(("Authorization".to_string(), auth.to_string()));
            }

            headers.push((
                "User-Agent".to_string(),
                format!("{}3gpp-gba", self.me.ua_prefix),
            ));
            if let Some(impu) = &req.impu {
                headers.push(("X-3GPP-Intended-Identity".to_string(), impu.clone()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GbaError::TransportError(
                    "request deadline exceeded".to_string(),
                ));
            }

            debug!(attempt, naf = %key.host, "transferring request to NAF");
            let resp = self
                .http
                .send(&req.method, &url, &headers, &req.body, remaining)
                .await
                .map_err(|e| {
                    GbaError::TransportError(format!("failed to access NAF: {e}"))
                })?;

            if let Some(cipher) = resp.cipher {
                debug!(cipher = %format!("{cipher:#06x}"), "connection is TLS");
                session.cipher = Some(cipher);
            }

            if resp.status != 401 {
                match AuthenticationInfo::parse(resp.header("authentication-info")) {
                    Ok(auth_info) => {
                        session
                            .naf_auth
                            .get_or_insert_with(WwwAuthenticate::default)
                            .nonce = auth_info.nextnonce;
                    },
                    Err(e) => {
                        warn!("NAF returned invalid Authentication-Info header: {e}");
                    },
                }
                return Ok(MeAnswer {
                    code: resp.status,
                    body: resp.body,
                });
            }

            let challenge = WwwAuthenticate::parse(resp.header("www-authenticate"))
                .map_err(|e| {
                    GbaError::TransportError(format!(
                        "invalid WWW-Authenticate header from NAF: {e}"
                    ))
                })?;
            session.naf_auth = Some(challenge);

            info!(bsf = %self.bsf_url, "BSF authentication is required");
            let mut bootstrap = BootstrapCtx::new(
                &self.http,
                &self.bsf_url,
                &av,
                &self.me.ua_prefix,
                self.me.auth_retransmit,
                deadline,
            );
            let btid = bootstrap.execute().await.map_err(|e| {
                match e.downcast_ref::<GbaError>() {
                    Some(GbaError::RetryBudgetExhausted) => GbaError::RetryBudgetExhausted,
                    _ => GbaError::BootstrapFailed(e.to_string()),
                }
            })?;
            session.btid = Some(btid);
            info!("BSF authentication success, retrying NAF access");
        }

        Err(GbaError::RetryBudgetExhausted)
    }
}
