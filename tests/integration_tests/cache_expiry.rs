// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! AV cache TTL semantics: strict expiry, stale entries never served.

use std::time::Duration;

use gba_fabric::models::{
    btid::mint_btid,
    digest::{Authorization, WwwAuthenticate},
};
use gba_fabric::utils::rand_text;
use serial_test::serial;

use crate::integration_tests::{
    bsf_exchange,
    common::{digest_request, fixed_av},
};

const IMPI: &str = "alice@mnc99.mcc999.pub.3gppnetwork.org";
const HOST: &str = "bsf.example";

fn challenge_answer(nonce: &str, res: &[u8]) -> Authorization {
    let mut auth = Authorization {
        username: IMPI.to_string(),
        realm: HOST.to_string(),
        uri: "/".to_string(),
        nonce: nonce.to_string(),
        cnonce: rand_text(),
        qop: "auth-int".to_string(),
        nc: 1,
        ..Authorization::default()
    };
    auth.set_response("GET", res, b"");
    auth
}

#[tokio::test]
#[serial]
async fn test_expired_entry_is_a_miss() {
    let av = fixed_av(IMPI);
    let (bsf, cache, _cancel) =
        bsf_exchange::make_bsf(&av, Duration::from_secs(1)).await;

    // Bootstrap once.
    let anonymous = Authorization {
        username: IMPI.to_string(),
        realm: HOST.to_string(),
        uri: "/".to_string(),
        ..Authorization::default()
    };
    let resp = bsf.handle(digest_request(HOST, Some(&anonymous))).await;
    assert_eq!(resp.status(), 401);
    let www = WwwAuthenticate::parse(
        resp.headers()["www-authenticate"]
            .to_str()
            .expect("header not a string"),
    )
    .expect("failed to parse challenge");

    let answer = challenge_answer(&www.nonce, &av.res);
    let resp = bsf.handle(digest_request(HOST, Some(&answer))).await;
    assert_eq!(resp.status(), 200);

    let btid = mint_btid(&www.nonce, IMPI, HOST);
    assert!(
        cache
            .get(&btid)
            .await
            .expect("cache error")
            .is_some(),
        "entry must be present before the TTL elapses"
    );

    // Let the one-second lifetime elapse.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(
        cache.get(&btid).await.expect("cache error").is_none(),
        "stale entry must not be returned"
    );

    // Citing the stale B-TID with a response now draws a 400, forcing a
    // fresh bootstrap.
    let replay = challenge_answer(&www.nonce, &av.res);
    let resp = bsf.handle(digest_request(HOST, Some(&replay))).await;
    assert_eq!(resp.status(), 400);

    // An anonymous retry recovers: fresh AV from the HSS, fresh challenge.
    let resp = bsf.handle(digest_request(HOST, Some(&anonymous))).await;
    assert_eq!(resp.status(), 401);
}
