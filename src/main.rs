// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use gba_fabric::{
    cache::AvCache,
    cfg::{
        cli::{config_arg_or, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    handlers::{
        bsf::BsfServer,
        naf::NafServer,
        serve::{load_tls_acceptor, serve_plain, serve_tls},
    },
    hss::{
        client::HssClient,
        server::{LoopbackPeer, MemoryDb},
    },
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("config/logger.yaml")?;

    // Load config
    let cfg = resolve_config_path(&config_arg_or("config/gateway.yaml"))
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let cancel = CancellationToken::new();

    // Subscriber store; in this standalone gateway the HSS is in-process
    // behind the loopback Diameter peer.
    let db = Arc::new(MemoryDb::new());
    for seed in &cfg.subscribers {
        let av = db.provision(seed)?;
        info!(impi = %av.impi, "provisioned subscriber");
    }

    let cache = Arc::new(AvCache::new(
        cfg.cache.address.clone(),
        cfg.cache.timeout,
        cancel.child_token(),
    ));
    let hss = HssClient::new(
        LoopbackPeer::new(
            db.clone(),
            cfg.hss.origin_host.clone(),
            cfg.hss.origin_realm.clone(),
        ),
        cfg.hss.clone(),
    );

    let bsf = Arc::new(BsfServer::new(
        cache.clone(),
        hss,
        cfg.bsf.lifetime,
        cfg.runtime.product_name.clone(),
    ));
    let naf = Arc::new(NafServer::new(cache, cfg.runtime.product_name.clone()));

    let bsf_listener = TcpListener::bind(&cfg.bsf.listen)
        .await
        .with_context(|| format!("failed to bind BSF on {}", cfg.bsf.listen))?;
    let naf_listener = TcpListener::bind(&cfg.naf.listen)
        .await
        .with_context(|| format!("failed to bind NAF on {}", cfg.naf.listen))?;
    info!(bsf = %cfg.bsf.listen, naf = %cfg.naf.listen, "gateway listening");

    let bsf_task = tokio::spawn(serve_plain(
        bsf_listener,
        cancel.child_token(),
        move |req, _cipher| {
            let bsf = bsf.clone();
            async move { bsf.handle(req).await }
        },
    ));

    let naf_handler = move |req, cipher| {
        let naf = naf.clone();
        async move { naf.handle(req, cipher).await }
    };
    let naf_task = match &cfg.naf.tls {
        Some(tls) => {
            let acceptor = load_tls_acceptor(&tls.cert_file, &tls.key_file)?;
            tokio::spawn(serve_tls(
                naf_listener,
                acceptor,
                cancel.child_token(),
                naf_handler,
            ))
        },
        None => tokio::spawn(serve_plain(
            naf_listener,
            cancel.child_token(),
            naf_handler,
        )),
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("caught interrupt, shutting down");
            cancel.cancel();
        },
        r = bsf_task => r.context("BSF task panicked")??,
        r = naf_task => r.context("NAF task panicked")??,
    }

    Ok(())
}
