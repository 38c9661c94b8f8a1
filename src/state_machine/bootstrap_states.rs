// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Client side of the BSF bootstrap exchange.
//!
//! Two-round Digest-AKAv1-MD5 handshake: an anonymous request draws the
//! AKA challenge, the challenged round answers it with XRES. When the
//! delivered AUTN does not match the USIM state, reports AUTS and loops on
//! the fresh challenge.

use anyhow::{Context, Result, anyhow};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::{
    client::http::{HttpClient, HttpResponse, host_header},
    models::{
        av::Av,
        bootstrap_info::BootstrappingInfo,
        btid::split_aka_nonce,
        digest::{Authorization, WwwAuthenticate},
        errors::GbaError,
    },
    state_machine::common::{StateMachineCtx, Transition},
    utils::{canonical_host, rand_text},
};

/// Context for one bootstrap run against the BSF.
pub struct BootstrapCtx<'a> {
    pub http: &'a HttpClient,
    pub bsf_url: &'a Url,
    pub av: &'a Av,
    pub user_agent: &'a str,
    /// Challenge retry budget (one HTTP request per step).
    pub retransmit: u32,
    /// Absolute deadline inherited from the outer application request.
    pub deadline: Instant,

    challenge: Option<WwwAuthenticate>,
    btid: Option<String>,
    state: Option<BootstrapStates>,
}

impl<'a> BootstrapCtx<'a> {
    pub fn new(
        http: &'a HttpClient,
        bsf_url: &'a Url,
        av: &'a Av,
        user_agent: &'a str,
        retransmit: u32,
        deadline: Instant,
    ) -> Self {
        Self {
            http,
            bsf_url,
            av,
            user_agent,
            retransmit,
            deadline,
            challenge: None,
            btid: None,
            state: Some(BootstrapStates::Anonymous(Anonymous)),
        }
    }

    fn base_authorization(&self) -> Authorization {
        let mut uri = self.bsf_url.path().to_string();
        if uri.is_empty() {
            uri = "/".to_string();
        }
        Authorization {
            username: self.av.impi.clone(),
            realm: canonical_host(&host_header(self.bsf_url)).to_string(),
            uri,
            ..Authorization::default()
        }
    }

    async fn send(&self, auth: &Authorization) -> Result<HttpResponse> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(anyhow!("bootstrap deadline exceeded"));
        }
        let headers = [
            ("Authorization".to_string(), auth.to_string()),
            ("User-Agent".to_string(), format!("{}3gpp-gba", self.user_agent)),
            ("Accept".to_string(), "*/*".to_string()),
        ];
        self.http
            .send("GET", self.bsf_url, &headers, b"", remaining)
            .await
    }

    /// Validates and stores a 401 challenge. The nonce must carry a full
    /// AKA challenge: 32 octets once base64-decoded.
    fn accept_challenge(&mut self, resp: &HttpResponse) -> Result<()> {
        let challenge = WwwAuthenticate::parse(resp.header("www-authenticate"))
            .context("no valid WWW-Authenticate header in BSF challenge")?;
        if challenge.realm.is_empty() || challenge.nonce.is_empty() {
            return Err(anyhow!("BSF challenge without realm or nonce"));
        }
        let (rand, autn) = split_aka_nonce(&challenge.nonce)?;
        debug!(
            rand = %hex::encode(rand),
            autn = %hex::encode(autn),
            "AKA authentication is required"
        );
        self.challenge = Some(challenge);
        Ok(())
    }

    fn take_btid(&mut self, resp: &HttpResponse) -> Result<()> {
        let body = std::str::from_utf8(&resp.body)
            .context("BSF bootstrapping body is not UTF-8")?;
        let info =
            BootstrappingInfo::from_xml(body).context("malformed BootstrappingInfo")?;
        if info.btid.is_empty() {
            return Err(anyhow!("BootstrappingInfo without btid"));
        }
        debug!(btid = %info.btid, lifetime = %info.lifetime, "bootstrap complete");
        self.btid = Some(info.btid);
        Ok(())
    }
}

type BootstrapStepOut = Transition<BootstrapStates, Result<()>>;

pub enum BootstrapStates {
    /// First round: no challenge seen yet, empty-response Authorization.
    Anonymous(Anonymous),
    /// A challenge is cached; answer it (or report AUTS).
    Challenged(Challenged),
}

pub struct Anonymous;

impl Anonymous {
    async fn step(&self, ctx: &mut BootstrapCtx<'_>) -> BootstrapStepOut {
        let auth = ctx.base_authorization();
        let resp = match ctx.send(&auth).await {
            Ok(r) => r,
            Err(e) => return Transition::Done(Err(e)),
        };
        match resp.status {
            401 => match ctx.accept_challenge(&resp) {
                Ok(()) => Transition::Next(BootstrapStates::Challenged(Challenged), Ok(())),
                Err(e) => Transition::Done(Err(e)),
            },
            200 => Transition::Done(ctx.take_btid(&resp)),
            s => Transition::Done(Err(anyhow!("unexpected BSF response {s}"))),
        }
    }
}

pub struct Challenged;

impl Challenged {
    async fn step(&self, ctx: &mut BootstrapCtx<'_>) -> BootstrapStepOut {
        let Some(challenge) = ctx.challenge.clone() else {
            return Transition::Done(Err(anyhow!("no challenge in ctx")));
        };

        let mut auth = ctx.base_authorization();
        auth.nonce = challenge.nonce.clone();
        auth.cnonce = rand_text();
        auth.opaque = challenge.opaque.clone();
        auth.qop = if challenge.offers_auth_int() {
            "auth-int".to_string()
        } else {
            "auth".to_string()
        };
        auth.nc = 1;

        let autn = match split_aka_nonce(&challenge.nonce) {
            Ok((_, autn)) => autn,
            Err(e) => return Transition::Done(Err(e.into())),
        };
        if autn == ctx.av.autn {
            auth.set_response("GET", &ctx.av.res, b"");
        } else {
            // AUTN mismatch: AKA resynchronisation. Empty secret plus the
            // AUTS token drives the BSF back to the HSS.
            auth.set_response("GET", b"", b"");
            auth.auts = ctx.av.auts_token();
            debug!(auts = %auth.auts, "requesting AKA resynchronisation");
        }

        let resp = match ctx.send(&auth).await {
            Ok(r) => r,
            Err(e) => return Transition::Done(Err(e)),
        };
        match resp.status {
            401 => match ctx.accept_challenge(&resp) {
                Ok(()) => Transition::Stay(Ok(())),
                Err(e) => Transition::Done(Err(e)),
            },
            200 => Transition::Done(ctx.take_btid(&resp)),
            s => Transition::Done(Err(anyhow!("unexpected BSF response {s}"))),
        }
    }
}

impl StateMachineCtx<String> for BootstrapCtx<'_> {
    async fn execute(&mut self) -> Result<String> {
        for _ in 0..self.retransmit {
            let state = self.state.take().context("state must be set")?;
            let tr = match state {
                BootstrapStates::Anonymous(s) => s.step(self).await,
                BootstrapStates::Challenged(s) => s.step(self).await,
            };
            match tr {
                Transition::Next(next, r) => {
                    r?;
                    self.state = Some(next);
                },
                Transition::Stay(r) => {
                    r?;
                    self.state = Some(BootstrapStates::Challenged(Challenged));
                },
                Transition::Done(r) => {
                    r?;
                    return self
                        .btid
                        .take()
                        .ok_or_else(|| anyhow!("bootstrap finished without B-TID"));
                },
            }
        }
        Err(GbaError::RetryBudgetExhausted.into())
    }
}
