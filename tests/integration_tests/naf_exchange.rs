// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! NAF digest exchange at the handler level, including the cipher-aware
//! key derivation both peers must agree on.

use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use gba_fabric::{
    cache::AvCache,
    handlers::naf::NafServer,
    kdf::{UA_ORG_3GPP, UA_PROTO_HTTP, derive_ks_naf, ua_proto_for_cipher},
    models::{
        av::Av,
        digest::{Authorization, AuthenticationInfo, WwwAuthenticate},
    },
    utils::rand_text,
};
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{PRODUCT, digest_request, fixed_av, spawn_resp};

const IMPI: &str = "alice@mnc99.mcc999.pub.3gppnetwork.org";
const HOST: &str = "naf.example";
const BTID: &str = "c2FtcGxlLWJ0aWQ=@bsf.example";

async fn make_naf(av: &Av) -> (NafServer, Arc<AvCache>, CancellationToken) {
    let cancel = CancellationToken::new();
    let resp_addr = spawn_resp(cancel.child_token())
        .await
        .expect("failed to start RESP store");
    let cache = Arc::new(AvCache::new(
        resp_addr,
        Duration::from_secs(3),
        cancel.child_token(),
    ));
    cache
        .set(BTID, av, Utc::now() + Duration::from_secs(60))
        .await
        .expect("failed to prime cache");

    let naf = NafServer::new(cache.clone(), PRODUCT.to_string());
    (naf, cache, cancel)
}

fn authorized(av: &Av, nonce: &str, nc: u64, proto: u32) -> Authorization {
    let ks_naf = STANDARD.encode(derive_ks_naf(
        &av.ck,
        &av.ik,
        &av.rand,
        &av.impi,
        HOST,
        UA_ORG_3GPP,
        proto,
    ));
    let mut auth = Authorization {
        username: BTID.to_string(),
        realm: format!("3GPP-bootstrapping@{HOST}"),
        uri: "/".to_string(),
        nonce: nonce.to_string(),
        cnonce: rand_text(),
        qop: "auth-int".to_string(),
        nc,
        ..Authorization::default()
    };
    auth.set_response("GET", ks_naf.as_bytes(), b"");
    auth
}

#[tokio::test]
async fn test_first_contact_draws_a_challenge() {
    let av = fixed_av(IMPI);
    let (naf, _cache, _cancel) = make_naf(&av).await;

    let resp = naf.handle(digest_request(HOST, None), None).await;
    assert_eq!(resp.status(), 401);

    let www = WwwAuthenticate::parse(
        resp.headers()["www-authenticate"]
            .to_str()
            .expect("header not a string"),
    )
    .expect("failed to parse challenge");
    assert_eq!(www.realm, format!("3GPP-bootstrapping@{HOST}"));
    assert_eq!(www.algorithm, "MD5");
    assert!(!www.nonce.is_empty());
    assert!(!www.opaque.is_empty());
}

#[tokio::test]
async fn test_plaintext_authentication_succeeds() {
    let av = fixed_av(IMPI);
    let (naf, _cache, _cancel) = make_naf(&av).await;

    let auth = authorized(&av, &rand_text(), 1, UA_PROTO_HTTP);
    let resp = naf.handle(digest_request(HOST, Some(&auth)), None).await;
    assert_eq!(resp.status(), 200);

    let auth_info = AuthenticationInfo::parse(
        resp.headers()["authentication-info"]
            .to_str()
            .expect("header not a string"),
    )
    .expect("failed to parse Authentication-Info");
    assert!(!auth_info.nextnonce.is_empty());
    assert_eq!(auth_info.qop, "auth-int");
    assert_eq!(auth_info.nc, 1);

    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("failed to read body");
    assert_eq!(body.as_ref(), b"result");

    // rspauth over the response body, empty method.
    let ks_naf = STANDARD.encode(derive_ks_naf(
        &av.ck,
        &av.ik,
        &av.rand,
        &av.impi,
        HOST,
        UA_ORG_3GPP,
        UA_PROTO_HTTP,
    ));
    assert_eq!(
        auth_info.rspauth,
        Some(auth.compute_response("", ks_naf.as_bytes(), &body))
    );
}

#[tokio::test]
async fn test_tls_cipher_id_binds_the_key() {
    let av = fixed_av(IMPI);
    let (naf, _cache, _cancel) = make_naf(&av).await;

    // Both peers fold the negotiated cipher suite into the protocol id.
    let auth = authorized(&av, &rand_text(), 1, ua_proto_for_cipher(0xC02F));
    let resp = naf
        .handle(digest_request(HOST, Some(&auth)), Some(0xC02F))
        .await;
    assert_eq!(resp.status(), 200);

    // Divergent observations make the derivations disagree: bare 401.
    let auth = authorized(&av, &rand_text(), 2, ua_proto_for_cipher(0xC02F));
    let resp = naf
        .handle(digest_request(HOST, Some(&auth)), Some(0xC030))
        .await;
    assert_eq!(resp.status(), 401);

    // A plaintext derivation offered over TLS fails the same way.
    let auth = authorized(&av, &rand_text(), 3, UA_PROTO_HTTP);
    let resp = naf
        .handle(digest_request(HOST, Some(&auth)), Some(0xC02F))
        .await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_unknown_btid_is_rechallenged() {
    let av = fixed_av(IMPI);
    let (naf, _cache, _cancel) = make_naf(&av).await;

    let mut auth = authorized(&av, &rand_text(), 1, UA_PROTO_HTTP);
    auth.username = "bm90LWEtYnRpZA==@bsf.example".to_string();
    let resp = naf.handle(digest_request(HOST, Some(&auth)), None).await;
    assert_eq!(resp.status(), 401);
    assert!(resp.headers().contains_key("www-authenticate"));
}

#[tokio::test]
async fn test_wrong_realm_is_forbidden() {
    let av = fixed_av(IMPI);
    let (naf, _cache, _cancel) = make_naf(&av).await;

    let mut auth = authorized(&av, &rand_text(), 1, UA_PROTO_HTTP);
    auth.realm = "3GPP-bootstrapping@other.example".to_string();
    auth.set_response("GET", b"irrelevant", b"");
    let resp = naf.handle(digest_request(HOST, Some(&auth)), None).await;
    assert_eq!(resp.status(), 403);
}
