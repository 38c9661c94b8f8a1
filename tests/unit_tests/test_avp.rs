// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use gba_fabric::{
    hss::{
        avp::{Avp, AvpError, RESULT_SUCCESS, decode, encode},
        mar::{
            AVP_DESTINATION_REALM, AVP_ORIGIN_HOST, AVP_ORIGIN_REALM, AVP_RESULT_CODE,
            AVP_SESSION_ID, AVP_SIP_AUTH_DATA_ITEM, AVP_USER_NAME,
            AVP_VENDOR_SPECIFIC_APP_ID, RESULT_IDENTITY_UNKNOWN, SipAuthDataItem,
            VENDOR_3GPP, build_mar, parse_maa, vendor_specific_app_id,
        },
    },
    models::{av::Av, errors::GbaError},
};

fn sample_av() -> Av {
    Av {
        rand: [0x01; 16],
        autn: [0x02; 16],
        res: vec![0x03; 16],
        ik: [0x04; 16],
        ck: [0x05; 16],
        impi: "alice@realm".to_string(),
    }
}

#[test]
fn test_avp_wire_layout() {
    // Unpadded UTF-8 AVP: 8-byte header + 4 data octets.
    let avp = Avp::utf8(AVP_USER_NAME, 0, true, "user");
    let raw = encode(std::slice::from_ref(&avp));
    assert_eq!(
        raw.as_ref(),
        &[
            0x00, 0x00, 0x00, 0x01, // code
            0x40, 0x00, 0x00, 0x0c, // M flag, length 12
            b'u', b's', b'e', b'r',
        ]
    );

    // Vendor AVP: 12-byte header, one data octet, three octets of padding.
    let avp = Avp::octets(AVP_SIP_AUTH_DATA_ITEM, VENDOR_3GPP, true, &[0xFF]);
    let raw = encode(std::slice::from_ref(&avp));
    assert_eq!(raw.len(), 16);
    assert_eq!(raw[4], 0xC0); // V|M
    assert_eq!(&raw[5..8], &[0x00, 0x00, 0x0d]); // length 13, pad excluded
    assert_eq!(&raw[8..12], &[0x00, 0x00, 0x28, 0xaf]); // vendor 10415
    assert_eq!(&raw[13..16], &[0, 0, 0]);
}

#[test]
fn test_avp_roundtrip_sequence() {
    let avps = vec![
        Avp::utf8(AVP_SESSION_ID, 0, true, "bsf.example;123;1"),
        vendor_specific_app_id(),
        Avp::uint32(AVP_RESULT_CODE, 0, true, RESULT_SUCCESS),
        Avp::octets(AVP_SIP_AUTH_DATA_ITEM, VENDOR_3GPP, true, &[1, 2, 3]),
    ];
    let mut raw = encode(&avps);
    let decoded = decode(&mut raw).expect("failed decode");
    assert_eq!(decoded, avps);
}

#[test]
fn test_avp_truncation_is_detected() {
    let avp = Avp::utf8(AVP_SESSION_ID, 0, true, "session");
    let raw = encode(std::slice::from_ref(&avp));
    let mut cut = Bytes::copy_from_slice(&raw[..raw.len() - 4]);
    assert!(matches!(decode(&mut cut), Err(AvpError::Truncated)));
}

#[test]
fn test_sip_auth_data_item_answer_roundtrip() {
    let av = sample_av();
    let avp = SipAuthDataItem::answer(&av).to_avp();
    let item = SipAuthDataItem::from_avp(&avp).expect("failed decode");
    assert_eq!(item.rand, Some(av.rand));
    assert_eq!(item.autn, Some(av.autn));
    assert_eq!(item.xres, Some(av.res));
    assert_eq!(item.ck, Some(av.ck));
    assert_eq!(item.ik, Some(av.ik));
    assert_eq!(item.auts, None);
}

#[test]
fn test_sip_auth_data_item_resync_roundtrip() {
    // Request direction: 610 carries RAND ‖ AUTS, 30 octets.
    let avp = SipAuthDataItem::resync([0x0A; 16], [0x0B; 14]).to_avp();
    let item = SipAuthDataItem::from_avp(&avp).expect("failed decode");
    assert_eq!(item.rand, Some([0x0A; 16]));
    assert_eq!(item.auts, Some([0x0B; 14]));
    assert_eq!(item.xres, None);
    assert_eq!(item.autn, None);
}

#[test]
fn test_sip_auth_data_item_rejects_bad_bits() {
    let av = sample_av();
    let mut avp = SipAuthDataItem::answer(&av).to_avp();
    avp.vendor_id = 0;
    assert!(matches!(
        SipAuthDataItem::from_avp(&avp),
        Err(AvpError::InvalidBits { .. })
    ));
}

#[test]
fn test_mar_order_and_resync_payload() {
    let mar = build_mar(
        "bsf.example;1;1",
        "bsf.example",
        "realm.example",
        "hss.realm.example",
        "alice@realm",
        Some(([0x0A; 16], [0x0B; 14])),
    );
    let codes: Vec<u32> = mar.iter().map(|a| a.code).collect();
    assert_eq!(
        codes,
        vec![
            AVP_SESSION_ID,
            AVP_VENDOR_SPECIFIC_APP_ID,
            277, // Auth-Session-State
            AVP_ORIGIN_HOST,
            AVP_ORIGIN_REALM,
            AVP_DESTINATION_REALM,
            AVP_USER_NAME,
            AVP_SIP_AUTH_DATA_ITEM,
        ]
    );

    let last = mar.last().expect("no AVPs");
    let item = SipAuthDataItem::from_avp(last).expect("failed decode");
    assert_eq!(item.rand, Some([0x0A; 16]));
    assert_eq!(item.auts, Some([0x0B; 14]));
}

#[test]
fn test_parse_maa_success() {
    let av = sample_av();
    let answer = vec![
        Avp::utf8(AVP_SESSION_ID, 0, true, "s"),
        Avp::uint32(AVP_RESULT_CODE, 0, true, RESULT_SUCCESS),
        SipAuthDataItem::answer(&av).to_avp(),
    ];
    let out = parse_maa(&answer).expect("failed parse");
    assert_eq!(out.result_code, RESULT_SUCCESS);
    let got = out.av.expect("no AV");
    assert_eq!(got.rand, av.rand);
    assert_eq!(got.res, av.res);
}

#[test]
fn test_parse_maa_identity_unknown() {
    let answer = vec![Avp::uint32(AVP_RESULT_CODE, 0, true, RESULT_IDENTITY_UNKNOWN)];
    let out = parse_maa(&answer).expect("failed parse");
    assert_eq!(out.result_code, RESULT_IDENTITY_UNKNOWN);
    assert!(out.av.is_none());
}

#[test]
fn test_parse_maa_requires_result_and_vector() {
    assert!(matches!(
        parse_maa(&[]),
        Err(GbaError::HssMalformed(_))
    ));
    let answer = vec![Avp::uint32(AVP_RESULT_CODE, 0, true, RESULT_SUCCESS)];
    assert!(matches!(parse_maa(&answer), Err(GbaError::HssMalformed(_))));
}
