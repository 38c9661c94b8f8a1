// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

use crate::models::errors::GbaError;

/// Bootstrapping Transaction Identifier.
///
/// `btid = base64(SHA-256(nonce ‖ username)) ‖ "@" ‖ realm`: a stable
/// function of its inputs, recomputed by the BSF on every request to locate
/// the cached vector.
pub fn mint_btid(nonce: &str, username: &str, realm: &str) -> String {
    let mut h = Sha256::new();
    h.update(nonce.as_bytes());
    h.update(username.as_bytes());
    format!("{}@{realm}", STANDARD.encode(h.finalize()))
}

/// Packs an AKA challenge into the Digest nonce: `base64(RAND ‖ AUTN)`.
/// The BSF never mints independent nonces.
pub fn aka_nonce(rand: &[u8; 16], autn: &[u8; 16]) -> String {
    let mut raw = [0u8; 32];
    raw[..16].copy_from_slice(rand);
    raw[16..].copy_from_slice(autn);
    STANDARD.encode(raw)
}

/// Recovers `(RAND, AUTN)` from a BSF challenge nonce. The decoded form
/// must be exactly 32 octets, split at offset 16.
pub fn split_aka_nonce(nonce: &str) -> Result<([u8; 16], [u8; 16]), GbaError> {
    let raw = STANDARD
        .decode(nonce)
        .map_err(|_| GbaError::MalformedNonce(0))?;
    if raw.len() != 32 {
        return Err(GbaError::MalformedNonce(raw.len()));
    }
    let mut rand = [0u8; 16];
    let mut autn = [0u8; 16];
    rand.copy_from_slice(&raw[..16]);
    autn.copy_from_slice(&raw[16..]);
    Ok((rand, autn))
}
