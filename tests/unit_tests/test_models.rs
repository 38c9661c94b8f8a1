// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{TimeZone, Utc};
use gba_fabric::models::{
    av::{Av, AvError},
    bootstrap_info::BootstrappingInfo,
    btid::{aka_nonce, mint_btid, split_aka_nonce},
    errors::GbaError,
};
use hex_literal::hex;

const RAND: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");
const AUTN: [u8; 16] = hex!("101112131415161718191a1b1c1d1e1f");

fn sample_av() -> Av {
    Av {
        rand: RAND,
        autn: AUTN,
        res: vec![0xAA; 16],
        ik: [0x04; 16],
        ck: [0x05; 16],
        impi: "alice@mnc99.mcc999.pub.3gppnetwork.org".to_string(),
    }
}

#[test]
fn test_av_record_roundtrip() {
    let av = sample_av();
    let record = av.to_record();
    assert_eq!(
        record,
        "000102030405060708090a0b0c0d0e0f:101112131415161718191a1b1c1d1e1f:\
         aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:04040404040404040404040404040404:\
         05050505050505050505050505050505:alice@mnc99.mcc999.pub.3gppnetwork.org"
    );
    assert_eq!(Av::from_record(&record).expect("failed parse"), av);
}

#[test]
fn test_av_record_rejects_bad_material() {
    assert!(matches!(
        Av::from_record("zz:aa:bb:cc:dd:impi"),
        Err(AvError::MalformedRecord(_))
    ));
    // 15-octet RAND
    let short = format!(
        "{}:{}:{}:{}:{}:impi",
        hex::encode([0u8; 15]),
        hex::encode(AUTN),
        "aa",
        hex::encode([0u8; 16]),
        hex::encode([0u8; 16]),
    );
    assert_eq!(
        Av::from_record(&short),
        Err(AvError::InvalidLength {
            field: "RAND",
            expected: 16,
            got: 15
        })
    );
    // Empty XRES
    let empty = format!(
        "{}:{}::{}:{}:impi",
        hex::encode(RAND),
        hex::encode(AUTN),
        hex::encode([0u8; 16]),
        hex::encode([0u8; 16]),
    );
    assert_eq!(Av::from_record(&empty), Err(AvError::EmptyRes));
}

#[test]
fn test_av_json_uses_hex_fields() {
    let av = sample_av();
    let json = serde_json::to_string(&av).expect("failed serialize");
    assert!(json.contains("\"RAND\":\"000102030405060708090a0b0c0d0e0f\""));
    let back: Av = serde_json::from_str(&json).expect("failed deserialize");
    assert_eq!(back, av);
}

#[test]
fn test_auts_token_skips_the_amf() {
    // SQN⊕AK (6 octets) ‖ MAC-S (8 octets), AMF at offsets 6..8 dropped.
    assert_eq!(sample_av().auts_token(), "EBESExQVGBkaGxwdHh8=");
}

#[test]
fn test_aka_nonce_roundtrip_and_length_check() {
    let nonce = aka_nonce(&RAND, &AUTN);
    assert_eq!(nonce, "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=");
    let (rand, autn) = split_aka_nonce(&nonce).expect("failed split");
    assert_eq!(rand, RAND);
    assert_eq!(autn, AUTN);

    assert_eq!(
        split_aka_nonce("AAECAw=="),
        Err(GbaError::MalformedNonce(4))
    );
    assert_eq!(split_aka_nonce("!!!"), Err(GbaError::MalformedNonce(0)));
}

#[test]
fn test_btid_known_vector() {
    let nonce = aka_nonce(&RAND, &AUTN);
    let btid = mint_btid(
        &nonce,
        "alice@mnc99.mcc999.pub.3gppnetwork.org",
        "bsf.example",
    );
    assert_eq!(btid, "WnUVxib4Q4V2JsoJBOKDxT/C52eh3eff/ttXbCVCqYg=@bsf.example");

    // Stable function of its inputs.
    assert_eq!(
        btid,
        mint_btid(&nonce, "alice@mnc99.mcc999.pub.3gppnetwork.org", "bsf.example")
    );
    assert_ne!(
        btid,
        mint_btid(&nonce, "bob@mnc99.mcc999.pub.3gppnetwork.org", "bsf.example")
    );
}

#[test]
fn test_bootstrapping_info_xml_shape() {
    let lifetime = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("bad date");
    let info = BootstrappingInfo::new("abc@bsf.example".to_string(), lifetime);
    let xml = info.to_xml().expect("failed serialize");
    assert_eq!(
        xml,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <BootstrappingInfo xmlns=\"uri:3gpp-gba\">\
         <btid>abc@bsf.example</btid>\
         <lifetime>2026-08-01T12:00:00Z</lifetime>\
         </BootstrappingInfo>"
    );

    let back = BootstrappingInfo::from_xml(&xml).expect("failed parse");
    assert_eq!(back, info);
}
