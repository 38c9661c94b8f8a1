// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Failure taxonomy shared by the BSF, NAF and ME roles.
///
/// Only `ResponseMismatch` and `AvCacheMiss` are recovered locally (via a
/// re-challenge); everything else surfaces to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GbaError {
    #[error("no cached authentication vector, or TTL expired")]
    AvCacheMiss,
    #[error("AV cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("HSS does not know this identity")]
    HssUnknownIdentity,
    #[error("HSS unavailable: {0}")]
    HssUnavailable(String),
    #[error("malformed HSS answer: {0}")]
    HssMalformed(String),
    #[error("digest response mismatch")]
    ResponseMismatch,
    #[error("authentication retry count exceeded")]
    RetryBudgetExhausted,
    #[error("bootstrap to BSF failed: {0}")]
    BootstrapFailed(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("AKA nonce must decode to 32 octets, got {0}")]
    MalformedNonce(usize),
}

impl GbaError {
    /// The HTTP status an ME surfaces to its caller for this failure.
    pub fn me_status(&self) -> u16 {
        match self {
            GbaError::TransportError(_) => 502,
            _ => 403,
        }
    }
}
