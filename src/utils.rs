// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngExt;

/// Mints a random 16-octet token, base64-encoded. Used for Digest `opaque`,
/// `cnonce` and NAF nonces.
pub fn rand_text() -> String {
    let mut raw = [0u8; 16];
    rand::rng().fill(&mut raw);
    STANDARD.encode(raw)
}

/// Strips an optional `:port` suffix from an HTTP Host header value.
pub fn canonical_host(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
