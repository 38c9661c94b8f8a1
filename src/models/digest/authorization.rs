// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use md5::{Digest, Md5};

use crate::models::digest::{DigestError, parse_digest_prefix, parse_hash16};

/// An `Authorization: Digest` header.
///
/// `response == None` marks the "empty response" sentinel a client sends on
/// its very first bootstrap round (`response=""`); anything else is the
/// 16-octet MD5 digest. `auts` is the base64 AKA resynchronisation token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: Option<[u8; 16]>,
    pub algorithm: String,
    pub cnonce: String,
    pub opaque: String,
    /// Selected qop, emitted as an unquoted token.
    pub qop: String,
    /// Nonce count, rendered as 8 lowercase hex digits.
    pub nc: u64,
    pub auts: String,
}

impl Authorization {
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let mut p = parse_digest_prefix(s)?;

        let username = p
            .remove("username")
            .ok_or(DigestError::MissingField("username"))?;
        let realm = p.remove("realm").ok_or(DigestError::MissingField("realm"))?;
        let nonce = p.remove("nonce").ok_or(DigestError::MissingField("nonce"))?;
        let uri = p.remove("uri").ok_or(DigestError::MissingField("uri"))?;
        let response = parse_hash16(
            &p.remove("response")
                .ok_or(DigestError::MissingField("response"))?,
        )?;

        Ok(Self {
            username,
            realm,
            nonce,
            uri,
            response,
            algorithm: p.remove("algorithm").unwrap_or_default(),
            cnonce: p.remove("cnonce").unwrap_or_default(),
            opaque: p.remove("opaque").unwrap_or_default(),
            qop: p.remove("qop").unwrap_or_default(),
            nc: p
                .remove("nc")
                .and_then(|v| u64::from_str_radix(&v, 16).ok())
                .unwrap_or(0),
            auts: p.remove("auts").unwrap_or_default(),
        })
    }

    /// Digest response over the current parameters.
    ///
    /// `secret` is role-dependent: the raw AKA XRES at the BSF, the base64
    /// Ks_NAF at a NAF. Servers verify by recomputing with the request
    /// method; `Authentication-Info` rspauth uses an empty method.
    pub fn compute_response(
        &self,
        method: &str,
        secret: &[u8],
        body: &[u8],
    ) -> [u8; 16] {
        let mut a1 = Md5::new();
        a1.update(self.username.as_bytes());
        a1.update(b":");
        a1.update(self.realm.as_bytes());
        a1.update(b":");
        a1.update(secret);
        let a1 = a1.finalize();

        let a2 = if self.qop == "auth-int" {
            let body_hash = Md5::digest(body);
            Md5::digest(
                format!("{method}:{}:{}", self.uri, hex::encode(body_hash)).as_bytes(),
            )
        } else {
            Md5::digest(format!("{method}:{}", self.uri).as_bytes())
        };

        let line = format!(
            "{}:{}:{:08x}:{}:{}:{}",
            hex::encode(a1),
            self.nonce,
            self.nc,
            self.cnonce,
            self.qop,
            hex::encode(a2)
        );
        Md5::digest(line.as_bytes()).into()
    }

    /// Computes and stores the response in place (client direction).
    pub fn set_response(&mut self, method: &str, secret: &[u8], body: &[u8]) {
        self.response = Some(self.compute_response(method, secret, body));
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\"",
            self.username, self.realm, self.nonce, self.uri
        )?;
        match &self.response {
            Some(r) => write!(f, ", response=\"{}\"", hex::encode(r))?,
            None => write!(f, ", response=\"\"")?,
        }
        if !self.algorithm.is_empty() {
            write!(f, ", algorithm={}", self.algorithm)?;
        }
        if !self.cnonce.is_empty() {
            write!(f, ", cnonce=\"{}\"", self.cnonce)?;
        }
        if !self.opaque.is_empty() {
            write!(f, ", opaque=\"{}\"", self.opaque)?;
        }
        if !self.qop.is_empty() {
            write!(f, ", qop={}", self.qop)?;
        }
        if self.nc != 0 {
            write!(f, ", nc={:08x}", self.nc)?;
        }
        if !self.auts.is_empty() {
            write!(f, ", auts=\"{}\"", self.auts)?;
        }
        Ok(())
    }
}
