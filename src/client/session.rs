// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::digest::WwwAuthenticate;

/// One Ua security association on the ME side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// URL scheme (`http`/`https`).
    pub scheme: String,
    /// NAF authority, `host[:port]`.
    pub host: String,
    pub impi: String,
}

/// Per-association state carried between application requests.
#[derive(Debug, Default)]
pub struct NafSession {
    /// Last challenge parameters received from the NAF.
    pub naf_auth: Option<WwwAuthenticate>,
    /// Bootstrapped transaction identifier, presented as the Digest
    /// username.
    pub btid: Option<String>,
    /// Nonce count. Strictly monotone within the session; the entry mutex
    /// serialises writers.
    pub nc: u64,
    /// Cipher-suite id observed on the last TLS response; feeds the next
    /// Ks_NAF derivation.
    pub cipher: Option<u16>,
}

/// ME-side session table. Entries accumulate per (scheme, NAF, IMPI);
/// `clear` is the control operation that invalidates one of them.
#[derive(Default)]
pub struct SessionMap {
    entries: DashMap<SessionKey, Arc<Mutex<NafSession>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the association entry, creating it on first use.
    pub fn entry(&self, key: &SessionKey) -> Arc<Mutex<NafSession>> {
        self.entries.entry(key.clone()).or_default().clone()
    }

    /// Drops one association (cached challenge, B-TID, counters).
    pub fn clear(&self, key: &SessionKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
