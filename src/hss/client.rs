// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    cfg::config::HssConfig,
    hss::{
        avp::{Avp, RESULT_SUCCESS},
        mar::{RESULT_IDENTITY_UNKNOWN, build_mar, parse_maa},
    },
    models::{av::Av, errors::GbaError},
};

/// The on-wire Diameter runtime, reduced to the capability the BSF needs:
/// send an MAR AVP tree, receive the matching MAA AVP tree. Peer discovery,
/// CER/CEA and watchdog handling stay behind this seam.
pub trait DiameterPeer: Send + Sync {
    fn exchange(
        &self,
        request: Vec<Avp>,
    ) -> impl Future<Output = anyhow::Result<Vec<Avp>>> + Send;
}

/// Zh-interface client: fetches authentication vectors by IMPI, optionally
/// carrying the UE's resynchronisation token.
pub struct HssClient<P> {
    peer: P,
    cfg: HssConfig,
    session_seq: AtomicU32,
}

impl<P: DiameterPeer> HssClient<P> {
    pub fn new(peer: P, cfg: HssConfig) -> Self {
        Self {
            peer,
            cfg,
            session_seq: AtomicU32::new(1),
        }
    }

    fn next_session_id(&self) -> String {
        // host;high;low per RFC 6733 §8.8; the high word is the process
        // epoch supplied by the collaborator in a full deployment.
        format!(
            "{};{};{}",
            self.cfg.origin_host,
            std::process::id(),
            self.session_seq.fetch_add(1, Ordering::Relaxed)
        )
    }

    /// One MAR/MAA round. `resync` carries the offending RAND plus the AUTS
    /// token when the UE reported a sequence-number failure.
    pub async fn fetch_av(
        &self,
        impi: &str,
        resync: Option<([u8; 16], [u8; 14])>,
    ) -> Result<Av, GbaError> {
        let session_id = self.next_session_id();
        let mar = build_mar(
            &session_id,
            &self.cfg.origin_host,
            &self.cfg.origin_realm,
            &self.cfg.destination_realm,
            impi,
            resync,
        );

        debug!(impi, session_id = %session_id, resync = resync.is_some(), "issuing MAR");
        let answer = timeout(self.cfg.request_timeout, self.peer.exchange(mar))
            .await
            .map_err(|_| GbaError::HssUnavailable("MAR timed out".to_string()))?
            .map_err(|e| GbaError::HssUnavailable(e.to_string()))?;

        let outcome = parse_maa(&answer)?;
        match outcome.result_code {
            RESULT_SUCCESS => {
                let mut av = outcome.av.ok_or_else(|| {
                    GbaError::HssMalformed("success without vector".to_string())
                })?;
                av.impi = impi.to_string();
                av.validate()
                    .map_err(|e| GbaError::HssMalformed(e.to_string()))?;
                Ok(av)
            },
            RESULT_IDENTITY_UNKNOWN => {
                warn!(impi, "HSS does not know this identity");
                Err(GbaError::HssUnknownIdentity)
            },
            code => Err(GbaError::HssUnavailable(format!(
                "MAA result code {code}"
            ))),
        }
    }
}
