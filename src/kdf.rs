// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Ks_NAF derivation per 3GPP TS 33.220 Annex B.
//!
//! `Ks_NAF = HMAC-SHA-256(CK ‖ IK, S)` with the S-string laid out as
//!
//! ```text
//! S = FC ‖ P0 ‖ L0 ‖ P1 ‖ L1 ‖ P2 ‖ L2 ‖ P3 ‖ L3
//! FC = 0x01
//! P0 = "gba-me"                   L0 = uint16-BE(6)
//! P1 = RAND                       L1 = uint16-BE(16)
//! P2 = IMPI                       L2 = uint16-BE(len(IMPI))
//! P3 = NAF_FQDN ‖ Ua-security-id  L3 = uint16-BE(len(NAF_FQDN) + 5)
//! Ua-security-id = uint8(org) ‖ uint32-BE(proto)
//! ```
//!
//! Field and byte ordering are part of the interop contract; both peers of
//! the Ua interface must feed identical inputs or authentication fails with
//! a bare 401.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// FC byte allocated to GBA key derivation.
const FC_GBA: u8 = 0x01;
/// GBA_ME key-family label.
const GBA_ME_LABEL: &[u8] = b"gba-me";

/// Default Ua organisation code (3GPP).
pub const UA_ORG_3GPP: u8 = 1;
/// Ua security-protocol id for plain HTTP (no TLS handshake completed).
pub const UA_PROTO_HTTP: u32 = 0x0001_0002;

/// Ua security-protocol id once a TLS handshake has completed:
/// `0x0100 | cipher_suite_id`.
pub fn ua_proto_for_cipher(cipher_suite: u16) -> u32 {
    0x0100 | u32::from(cipher_suite)
}

/// Derives the NAF-scoped key. Deterministic in every input; 32 octets out.
pub fn derive_ks_naf(
    ck: &[u8; 16],
    ik: &[u8; 16],
    rand: &[u8; 16],
    impi: &str,
    naf_fqdn: &str,
    org: u8,
    proto: u32,
) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(ck);
    key[16..].copy_from_slice(ik);

    let mut s = Vec::with_capacity(
        1 + GBA_ME_LABEL.len() + 2 + 16 + 2 + impi.len() + 2 + naf_fqdn.len() + 5 + 2,
    );
    s.push(FC_GBA);
    s.extend_from_slice(GBA_ME_LABEL);
    s.extend_from_slice(&(GBA_ME_LABEL.len() as u16).to_be_bytes());
    s.extend_from_slice(rand);
    s.extend_from_slice(&16u16.to_be_bytes());
    s.extend_from_slice(impi.as_bytes());
    s.extend_from_slice(&(impi.len() as u16).to_be_bytes());
    s.extend_from_slice(naf_fqdn.as_bytes());
    s.push(org);
    s.extend_from_slice(&proto.to_be_bytes());
    s.extend_from_slice(&((naf_fqdn.len() + 5) as u16).to_be_bytes());

    let mut mac =
        HmacSha256::new_from_slice(&key).expect("HMAC-SHA-256 accepts any key length");
    mac.update(&s);
    mac.finalize().into_bytes().into()
}
