// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-process test fabric: a miniature RESP store, the loopback HSS, and
//! BSF/NAF listeners on ephemeral ports.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use gba_fabric::{
    cache::AvCache,
    cfg::config::{HssConfig, MeConfig},
    client::application::GbaClient,
    handlers::{bsf::BsfServer, naf::NafServer, serve::serve_plain},
    hss::{
        client::HssClient,
        server::{LoopbackPeer, SubscriberDb},
    },
    models::{av::Av, digest::Authorization},
};
use hyper::{Body, Request, header};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

pub const PRODUCT: &str = "gba-fabric";

pub fn fixed_av(impi: &str) -> Av {
    Av {
        rand: [0x10; 16],
        autn: [0x20; 16],
        res: vec![0x30; 16],
        ik: [0x40; 16],
        ck: [0x50; 16],
        impi: impi.to_string(),
    }
}

pub fn hss_config() -> HssConfig {
    HssConfig {
        origin_host: "bsf.test".to_string(),
        origin_realm: "test".to_string(),
        destination_realm: "test".to_string(),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn me_config(bsf_url: &str) -> MeConfig {
    MeConfig {
        bsf_url: bsf_url.to_string(),
        auth_retransmit: 3,
        expire: Duration::from_secs(10),
        insecure_skip_verify: false,
        ca_file: None,
        ua_prefix: String::new(),
    }
}

/// Builds an HTTP request against a BSF/NAF handler, the way the fabric's
/// accept loop would deliver it.
pub fn digest_request(host: &str, auth: Option<&Authorization>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri("/")
        .header(header::HOST, host);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth.to_string());
    }
    builder.body(Body::empty()).expect("failed to build request")
}

// ── miniature RESP store ────────────────────────────────────────────────

type RespStore = Arc<Mutex<HashMap<String, (Vec<u8>, i64)>>>;

/// Speaks just enough RESP for the AV cache: GET, TTL, SET .. EXAT.
pub async fn spawn_resp(cancel: CancellationToken) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let store: RespStore = Arc::default();

    tokio::spawn(async move {
        loop {
            let stream = tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = listener.accept() => match accepted {
                    Ok((s, _)) => s,
                    Err(_) => return,
                },
            };
            let store = store.clone();
            tokio::spawn(async move {
                let _ = serve_resp_conn(stream, store).await;
            });
        }
    });

    Ok(addr)
}

async fn serve_resp_conn(stream: TcpStream, store: RespStore) -> Result<()> {
    let mut conn = BufStream::new(stream);
    loop {
        let mut line = String::new();
        if conn.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let argc: usize = line.trim_start_matches('*').trim().parse()?;

        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            let mut l = String::new();
            conn.read_line(&mut l).await?;
            let len: usize = l.trim_start_matches('$').trim().parse()?;
            let mut data = vec![0u8; len + 2];
            conn.read_exact(&mut data).await?;
            data.truncate(len);
            args.push(String::from_utf8(data)?);
        }

        let reply = dispatch(&store, &args).await;
        conn.write_all(reply.as_bytes()).await?;
        conn.flush().await?;
    }
}

async fn dispatch(store: &RespStore, args: &[String]) -> String {
    let now = Utc::now().timestamp();
    let mut map = store.lock().await;
    match args {
        [cmd, key] if cmd == "GET" => match map.get(key) {
            Some((v, exp)) if *exp > now => {
                format!("${}\r\n{}\r\n", v.len(), String::from_utf8_lossy(v))
            },
            _ => "_\r\n".to_string(),
        },
        [cmd, key] if cmd == "TTL" => match map.get(key) {
            Some((_, exp)) if *exp > now => format!(":{}\r\n", exp - now),
            _ => ":-2\r\n".to_string(),
        },
        [cmd, key, value, exat, t] if cmd == "SET" && exat == "EXAT" => {
            match t.parse::<i64>() {
                Ok(exp) => {
                    map.insert(key.clone(), (value.clone().into_bytes(), exp));
                    "+OK\r\n".to_string()
                },
                Err(_) => "-ERR invalid EXAT\r\n".to_string(),
            }
        },
        _ => "-ERR unknown command\r\n".to_string(),
    }
}

// ── full fabric ─────────────────────────────────────────────────────────

pub struct Fabric {
    pub cancel: CancellationToken,
    pub cache: Arc<AvCache>,
    pub bsf_url: String,
    pub naf_url: String,
}

/// Boots the RESP store, the loopback HSS over `hss_db`, and plaintext
/// BSF/NAF listeners. Everything dies with the returned token.
pub async fn start_fabric<D>(hss_db: Arc<D>, lifetime: Duration) -> Result<Fabric>
where
    D: SubscriberDb + 'static,
{
    let cancel = CancellationToken::new();

    let resp_addr = spawn_resp(cancel.child_token()).await?;
    let cache = Arc::new(AvCache::new(
        resp_addr,
        Duration::from_secs(3),
        cancel.child_token(),
    ));

    let cfg = hss_config();
    let hss = HssClient::new(
        LoopbackPeer::new(hss_db, cfg.origin_host.clone(), cfg.origin_realm.clone()),
        cfg,
    );

    let bsf = Arc::new(BsfServer::new(
        cache.clone(),
        hss,
        lifetime,
        PRODUCT.to_string(),
    ));
    let naf = Arc::new(NafServer::new(cache.clone(), PRODUCT.to_string()));

    let bsf_listener = TcpListener::bind("127.0.0.1:0").await?;
    let bsf_url = format!("http://{}", bsf_listener.local_addr()?);
    let naf_listener = TcpListener::bind("127.0.0.1:0").await?;
    let naf_url = format!("http://{}", naf_listener.local_addr()?);

    tokio::spawn(serve_plain(
        bsf_listener,
        cancel.child_token(),
        move |req, _cipher| {
            let bsf = bsf.clone();
            async move { bsf.handle(req).await }
        },
    ));
    tokio::spawn(serve_plain(
        naf_listener,
        cancel.child_token(),
        move |req, cipher| {
            let naf = naf.clone();
            async move { naf.handle(req, cipher).await }
        },
    ));

    Ok(Fabric {
        cancel,
        cache,
        bsf_url,
        naf_url,
    })
}

pub fn me_client<D: SubscriberDb>(fabric: &Fabric, db: Arc<D>) -> GbaClient<D> {
    GbaClient::new(
        me_config(&fabric.bsf_url),
        Duration::from_secs(3),
        db,
        fabric.cancel.child_token(),
    )
    .expect("failed to build GbaClient")
}
