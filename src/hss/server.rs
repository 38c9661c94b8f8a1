// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Server half of the Multimedia-Auth exchange: the MAR handler an HSS
//! mounts on its Diameter runtime, plus the in-memory subscriber store and
//! the loopback peer used when everything runs in one process.

use std::sync::Arc;

use dashmap::DashMap;
use rand::RngExt;
use tracing::{debug, warn};

use crate::{
    cfg::config::SubscriberSeed,
    hss::{
        avp::{Avp, AvpError, RESULT_SUCCESS},
        client::DiameterPeer,
        mar::{
            AUTH_SESSION_STATE_NO_STATE, AVP_AUTH_SESSION_STATE, AVP_DESTINATION_HOST,
            AVP_DESTINATION_REALM, AVP_GUSS_TIMESTAMP, AVP_ORIGIN_HOST,
            AVP_ORIGIN_REALM, AVP_PROXY_INFO, AVP_PUBLIC_IDENTITY, AVP_RESULT_CODE,
            AVP_ROUTE_RECORD, AVP_SESSION_ID, AVP_SIP_AUTH_DATA_ITEM, AVP_USER_NAME,
            AVP_VENDOR_SPECIFIC_APP_ID, RESULT_IDENTITY_UNKNOWN, SipAuthDataItem,
            vendor_specific_app_id,
        },
    },
    models::av::Av,
};

/// Authoritative store of long-term subscriber credentials.
pub trait SubscriberDb: Send + Sync {
    fn lookup(&self, impi: &str) -> impl Future<Output = Option<Av>> + Send;

    /// Called when the MAR carries RAND ‖ AUTS. Answers with the vector to
    /// use after resequencing.
    fn resync(
        &self,
        impi: &str,
        rand: [u8; 16],
        auts: [u8; 14],
    ) -> impl Future<Output = Option<Av>> + Send;
}

/// In-memory subscriber store. Provisioned records with absent fields are
/// filled with random octets, matching the vector DB's PUT behavior.
#[derive(Default)]
pub struct MemoryDb {
    avs: DashMap<String, Av>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, av: Av) {
        self.avs.insert(av.impi.clone(), av);
    }

    pub fn remove(&self, impi: &str) -> bool {
        self.avs.remove(impi).is_some()
    }

    pub fn provision(&self, seed: &SubscriberSeed) -> anyhow::Result<Av> {
        let av = Av {
            rand: seed_field(&seed.rand, "Rand")?,
            autn: seed_field(&seed.autn, "Autn")?,
            res: match &seed.res {
                Some(v) => hex::decode(v)
                    .map_err(|e| anyhow::anyhow!("Res for {}: {e}", seed.impi))?,
                None => rand_octets::<16>().to_vec(),
            },
            ik: seed_field(&seed.ik, "Ik")?,
            ck: seed_field(&seed.ck, "Ck")?,
            impi: seed.impi.clone(),
        };
        av.validate()?;
        self.insert(av.clone());
        Ok(av)
    }
}

impl SubscriberDb for MemoryDb {
    async fn lookup(&self, impi: &str) -> Option<Av> {
        self.avs.get(impi).map(|e| e.clone())
    }

    async fn resync(&self, impi: &str, _rand: [u8; 16], _auts: [u8; 14]) -> Option<Av> {
        // Sequence numbers live with the credential owner; answering with
        // the current vector is the whole resynchronisation here.
        self.lookup(impi).await
    }
}

fn rand_octets<const N: usize>() -> [u8; N] {
    let mut raw = [0u8; N];
    rand::rng().fill(&mut raw);
    raw
}

fn seed_field(v: &Option<String>, field: &str) -> anyhow::Result<[u8; 16]> {
    match v {
        None => Ok(rand_octets::<16>()),
        Some(s) => {
            let raw = hex::decode(s).map_err(|e| anyhow::anyhow!("{field}: {e}"))?;
            raw.try_into()
                .map_err(|raw: Vec<u8>| anyhow::anyhow!("{field}: expected 16 octets, got {}", raw.len()))
        },
    }
}

/// Handles one MAR AVP tree and produces the MAA AVP tree.
pub async fn handle_mar<D: SubscriberDb>(
    db: &D,
    origin_host: &str,
    origin_realm: &str,
    request: &[Avp],
) -> Vec<Avp> {
    let mut impi = String::new();
    let mut session = String::new();
    let mut resync = None;
    let mut violation: Option<AvpError> = None;

    for avp in request {
        let r = match avp.code {
            AVP_SESSION_ID => {
                if session.is_empty() {
                    avp.as_utf8().map(|v| session = v)
                } else {
                    Err(AvpError::TooMany { code: avp.code })
                }
            },
            AVP_USER_NAME => {
                if impi.is_empty() {
                    avp.as_utf8().map(|v| impi = v)
                } else {
                    Err(AvpError::TooMany { code: avp.code })
                }
            },
            AVP_SIP_AUTH_DATA_ITEM => SipAuthDataItem::from_avp(avp).map(|item| {
                if let (Some(rand), Some(auts)) = (item.rand, item.auts) {
                    resync = Some((rand, auts));
                }
            }),
            AVP_VENDOR_SPECIFIC_APP_ID | AVP_AUTH_SESSION_STATE | AVP_ORIGIN_HOST
            | AVP_ORIGIN_REALM | AVP_DESTINATION_HOST | AVP_DESTINATION_REALM
            | AVP_PUBLIC_IDENTITY | AVP_GUSS_TIMESTAMP | AVP_PROXY_INFO
            | AVP_ROUTE_RECORD => Ok(()),
            code if avp.is_mandatory() => Err(AvpError::Unsupported { code }),
            _ => Ok(()),
        };
        if let Err(e) = r {
            violation = Some(e);
            break;
        }
    }

    let mut result = RESULT_SUCCESS;
    let mut auth_item = None;

    if let Some(e) = violation {
        warn!("MAR validation failed: {e}");
        result = e.result_code();
    } else if impi.is_empty() {
        warn!("MAR without User-Name");
        result = AvpError::Missing { code: AVP_USER_NAME }.result_code();
    } else if session.is_empty() {
        warn!("MAR without Session-Id");
        result = AvpError::Missing {
            code: AVP_SESSION_ID,
        }
        .result_code();
    } else {
        let av = match resync {
            Some((rand, auts)) => db.resync(&impi, rand, auts).await,
            None => db.lookup(&impi).await,
        };
        match av {
            Some(av) => {
                debug!(impi = %impi, "MAR handling success");
                auth_item = Some(SipAuthDataItem::answer(&av).to_avp());
            },
            None => {
                warn!(impi = %impi, "identity not found");
                result = RESULT_IDENTITY_UNKNOWN;
            },
        }
    }

    let mut answer = Vec::new();
    if !session.is_empty() {
        answer.push(Avp::utf8(AVP_SESSION_ID, 0, true, &session));
        answer.push(Avp::uint32(
            AVP_AUTH_SESSION_STATE,
            0,
            true,
            AUTH_SESSION_STATE_NO_STATE,
        ));
    }
    answer.push(vendor_specific_app_id());
    answer.push(Avp::uint32(AVP_RESULT_CODE, 0, true, result));
    answer.push(Avp::utf8(AVP_ORIGIN_HOST, 0, true, origin_host));
    answer.push(Avp::utf8(AVP_ORIGIN_REALM, 0, true, origin_realm));
    if let Some(item) = auth_item {
        answer.push(item);
    }
    if !impi.is_empty() {
        answer.push(Avp::utf8(AVP_USER_NAME, 0, true, &impi));
    }
    answer
}

/// A `DiameterPeer` that short-circuits into a local MAR handler, the
/// in-process stand-in for the external Diameter runtime.
pub struct LoopbackPeer<D> {
    db: Arc<D>,
    origin_host: String,
    origin_realm: String,
}

impl<D> LoopbackPeer<D> {
    pub fn new(db: Arc<D>, origin_host: String, origin_realm: String) -> Self {
        Self {
            db,
            origin_host,
            origin_realm,
        }
    }
}

impl<D: SubscriberDb> DiameterPeer for LoopbackPeer<D> {
    async fn exchange(&self, request: Vec<Avp>) -> anyhow::Result<Vec<Avp>> {
        Ok(handle_mar(&*self.db, &self.origin_host, &self.origin_realm, &request).await)
    }
}
