// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use crate::models::digest::{DigestError, parse_digest_prefix};

/// A `WWW-Authenticate: Digest` challenge.
///
/// The BSF issues these with `algorithm=AKAv1-MD5` and the AKA challenge
/// packed into `nonce`; NAFs issue plain `MD5` challenges with a random
/// nonce. Unknown parameters are ignored on parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WwwAuthenticate {
    /// Protection realm (mandatory).
    pub realm: String,
    /// Optional protection-space URIs.
    pub domain: Vec<String>,
    /// Server nonce (mandatory).
    pub nonce: String,
    /// Opaque blob echoed back by the client.
    pub opaque: String,
    /// Stale flag, emitted as an unquoted token.
    pub stale: bool,
    /// Digest algorithm, emitted as an unquoted token.
    pub algorithm: String,
    /// Offered qop values (mandatory).
    pub qop: Vec<String>,
}

impl WwwAuthenticate {
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let mut p = parse_digest_prefix(s)?;

        let realm = p.remove("realm").ok_or(DigestError::MissingField("realm"))?;
        let nonce = p.remove("nonce").ok_or(DigestError::MissingField("nonce"))?;
        let qop_raw = p.remove("qop").ok_or(DigestError::MissingField("qop"))?;

        let mut qop = Vec::new();
        for v in qop_raw.split(',') {
            let v = v.trim();
            if v.is_empty() {
                return Err(DigestError::MalformedHeader(
                    "empty qop value".to_string(),
                ));
            }
            qop.push(v.to_string());
        }

        let domain = p
            .remove("domain")
            .map(|d| d.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            realm,
            domain,
            nonce,
            opaque: p.remove("opaque").unwrap_or_default(),
            stale: p.remove("stale").is_some_and(|v| v == "true"),
            algorithm: p.remove("algorithm").unwrap_or_default(),
            qop,
        })
    }

    /// True when the server offers `auth-int`; the client prefers it.
    pub fn offers_auth_int(&self) -> bool {
        self.qop.iter().any(|q| q == "auth-int")
    }
}

impl fmt::Display for WwwAuthenticate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest realm=\"{}\"", self.realm)?;
        if !self.domain.is_empty() {
            write!(f, ", domain=\"{}\"", self.domain.join(" "))?;
        }
        write!(f, ", nonce=\"{}\"", self.nonce)?;
        if !self.opaque.is_empty() {
            write!(f, ", opaque=\"{}\"", self.opaque)?;
        }
        if self.stale {
            write!(f, ", stale=true")?;
        }
        if !self.algorithm.is_empty() {
            write!(f, ", algorithm={}", self.algorithm)?;
        }
        if !self.qop.is_empty() {
            write!(f, ", qop=\"{}\"", self.qop.join(","))?;
        }
        Ok(())
    }
}
