// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use crate::models::digest::{DigestError, parse_hash16, parse_params};

/// An `Authentication-Info` header (no auth-scheme prefix on the wire).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationInfo {
    pub nextnonce: String,
    /// Agreed qop, emitted as an unquoted token.
    pub qop: String,
    pub rspauth: Option<[u8; 16]>,
    pub cnonce: String,
    pub nc: u64,
}

impl AuthenticationInfo {
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let mut p = parse_params(s.trim())?;

        let nextnonce = p
            .remove("nextnonce")
            .ok_or(DigestError::MissingField("nextnonce"))?;
        let qop = p.remove("qop").ok_or(DigestError::MissingField("qop"))?;

        Ok(Self {
            nextnonce,
            qop,
            rspauth: p
                .remove("rspauth")
                .map(|v| parse_hash16(&v))
                .transpose()?
                .flatten(),
            cnonce: p.remove("cnonce").unwrap_or_default(),
            nc: p
                .remove("nc")
                .and_then(|v| u64::from_str_radix(&v, 16).ok())
                .unwrap_or(0),
        })
    }
}

impl fmt::Display for AuthenticationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nextnonce=\"{}\"", self.nextnonce)?;
        if !self.qop.is_empty() {
            write!(f, ", qop={}", self.qop)?;
        }
        if let Some(r) = &self.rspauth {
            write!(f, ", rspauth=\"{}\"", hex::encode(r))?;
        }
        if !self.cnonce.is_empty() {
            write!(f, ", cnonce=\"{}\"", self.cnonce)?;
        }
        if self.nc != 0 {
            write!(f, ", nc={:08x}", self.nc)?;
        }
        Ok(())
    }
}
