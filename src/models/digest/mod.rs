// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP Digest header codec, restricted to the parameter sets used by the
//! 3GPP bootstrapping interfaces (RFC 7616 grammar, AKAv1-MD5/MD5 only).

use std::{collections::HashMap, iter::Peekable, str::Chars};

use thiserror::Error;

pub mod auth_info;
pub mod authorization;
pub mod challenge;

pub use auth_info::AuthenticationInfo;
pub use authorization::Authorization;
pub use challenge::WwwAuthenticate;

/// Digest codec failures, surfaced to callers as 400/401 decisions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("malformed digest header: {0}")]
    MalformedHeader(String),
    #[error("mandatory digest parameter '{0}' not found")]
    MissingField(&'static str),
    #[error("digest response must be 32 hex digits, got {0}")]
    InvalidResponseLength(usize),
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_'
                | '`' | '|' | '~'
        )
}

fn skip_spaces(it: &mut Peekable<Chars<'_>>) {
    while it.peek().is_some_and(|c| c.is_whitespace()) {
        it.next();
    }
}

/// Parses a `name=value, name=value` parameter list. Values are either
/// tokens or quoted strings; parameter names are case-sensitive tokens.
pub(crate) fn parse_params(s: &str) -> Result<HashMap<String, String>, DigestError> {
    let mut params = HashMap::new();
    let mut it = s.chars().peekable();

    loop {
        skip_spaces(&mut it);
        if it.peek().is_none() {
            return Ok(params);
        }

        let mut name = String::new();
        while let Some(&c) = it.peek() {
            if c.is_ascii_alphanumeric() || c == '-' {
                name.push(c);
                it.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(DigestError::MalformedHeader(format!(
                "expected parameter name, found {:?}",
                it.peek()
            )));
        }

        skip_spaces(&mut it);
        match it.next() {
            Some('=') => {},
            other => {
                return Err(DigestError::MalformedHeader(format!(
                    "expected '=' after '{name}', found {other:?}"
                )));
            },
        }
        skip_spaces(&mut it);

        let mut value = String::new();
        match it.peek() {
            Some('"') => {
                it.next();
                loop {
                    match it.next() {
                        Some('"') => break,
                        Some(c) => value.push(c),
                        None => {
                            return Err(DigestError::MalformedHeader(format!(
                                "unterminated quoted value for '{name}'"
                            )));
                        },
                    }
                }
            },
            _ => {
                while let Some(&c) = it.peek() {
                    if is_token_char(c) {
                        value.push(c);
                        it.next();
                    } else {
                        break;
                    }
                }
            },
        }
        params.insert(name, value);

        skip_spaces(&mut it);
        match it.next() {
            None => return Ok(params),
            Some(',') => {},
            Some(c) => {
                return Err(DigestError::MalformedHeader(format!(
                    "expected ',' between parameters, found {c:?}"
                )));
            },
        }
    }
}

/// Strips the `Digest` auth-scheme prefix and parses the parameter list.
pub(crate) fn parse_digest_prefix(
    s: &str,
) -> Result<HashMap<String, String>, DigestError> {
    let s = s.trim();
    let (scheme, rest) = s.split_once(char::is_whitespace).ok_or_else(|| {
        DigestError::MalformedHeader("missing auth scheme separator".to_string())
    })?;
    if !scheme.eq_ignore_ascii_case("digest") {
        return Err(DigestError::MalformedHeader(format!(
            "invalid auth scheme '{scheme}'"
        )));
    }
    parse_params(rest)
}

/// Decodes a `response`/`rspauth` value: empty means "not yet computed",
/// anything else must be exactly 32 lowercase hex digits.
pub(crate) fn parse_hash16(v: &str) -> Result<Option<[u8; 16]>, DigestError> {
    if v.is_empty() {
        return Ok(None);
    }
    if v.len() != 32 {
        return Err(DigestError::InvalidResponseLength(v.len()));
    }
    let raw = hex::decode(v)
        .map_err(|_| DigestError::InvalidResponseLength(v.len()))?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&raw);
    Ok(Some(out))
}
