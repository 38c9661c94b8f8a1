// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Multimedia-Auth request/answer AVP trees (command 303, application
//! 16777221, vendor 10415).
//!
//! ```text
//! <MAR> ::= < Diameter Header: 303, REQ, PXY, 16777221 >
//!            < Session-Id >
//!            { Vendor-Specific-Application-Id }
//!            { Auth-Session-State }  ; NO_STATE_MAINTAINED
//!            { Origin-Host }
//!            { Origin-Realm }
//!            { Destination-Realm }
//!            [ User-Name ]           ; IMPI from UE
//!            [ SIP-Auth-Data-Item ]  ; synchronisation failure
//! ```

use crate::{
    hss::avp::{Avp, AvpError, RESULT_SUCCESS},
    models::{av::Av, errors::GbaError},
};

pub const CMD_MULTIMEDIA_AUTH: u32 = 303;
pub const APP_ID_ZH: u32 = 16777221;
pub const VENDOR_3GPP: u32 = 10415;

pub const AVP_USER_NAME: u32 = 1;
pub const AVP_VENDOR_SPECIFIC_APP_ID: u32 = 260;
pub const AVP_SESSION_ID: u32 = 263;
pub const AVP_ORIGIN_HOST: u32 = 264;
pub const AVP_VENDOR_ID: u32 = 266;
pub const AVP_RESULT_CODE: u32 = 268;
pub const AVP_AUTH_SESSION_STATE: u32 = 277;
pub const AVP_ROUTE_RECORD: u32 = 282;
pub const AVP_DESTINATION_REALM: u32 = 283;
pub const AVP_PROXY_INFO: u32 = 284;
pub const AVP_DESTINATION_HOST: u32 = 293;
pub const AVP_ORIGIN_REALM: u32 = 296;
pub const AVP_EXPERIMENTAL_RESULT: u32 = 297;
pub const AVP_EXPERIMENTAL_RESULT_CODE: u32 = 298;
pub const AVP_AUTH_APPLICATION_ID: u32 = 258;
pub const AVP_GUSS_TIMESTAMP: u32 = 409;
pub const AVP_PUBLIC_IDENTITY: u32 = 601;
pub const AVP_SIP_AUTH_SCHEME: u32 = 608;
pub const AVP_SIP_AUTHENTICATE: u32 = 609;
pub const AVP_SIP_AUTHORIZATION: u32 = 610;
pub const AVP_SIP_AUTH_DATA_ITEM: u32 = 612;
pub const AVP_CONFIDENTIALITY_KEY: u32 = 625;
pub const AVP_INTEGRITY_KEY: u32 = 626;

/// NO_STATE_MAINTAINED
pub const AUTH_SESSION_STATE_NO_STATE: u32 = 1;
pub const AUTH_SCHEME_AKAV1_MD5: &str = "Digest-AKAv1-MD5";

/// Experimental-Result-Code for DIAMETER_ERROR_IDENTITY_UNKNOWN, folded
/// with the 3GPP vendor prefix.
pub const RESULT_IDENTITY_UNKNOWN: u32 = VENDOR_3GPP * 10000 + 5401;

/// The SIP-Auth-Data-Item grouped AVP (612), both directions.
///
/// On requests it carries RAND ‖ AUTS (30 octets) in SIP-Authorization; on
/// answers SIP-Authenticate is RAND ‖ AUTN (32 octets) and
/// SIP-Authorization is the 16-octet XRES.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipAuthDataItem {
    pub rand: Option<[u8; 16]>,
    pub autn: Option<[u8; 16]>,
    pub auts: Option<[u8; 14]>,
    pub xres: Option<Vec<u8>>,
    pub ck: Option<[u8; 16]>,
    pub ik: Option<[u8; 16]>,
}

impl SipAuthDataItem {
    pub fn answer(av: &Av) -> Self {
        Self {
            rand: Some(av.rand),
            autn: Some(av.autn),
            auts: None,
            xres: Some(av.res.clone()),
            ck: Some(av.ck),
            ik: Some(av.ik),
        }
    }

    pub fn resync(rand: [u8; 16], auts: [u8; 14]) -> Self {
        Self {
            rand: Some(rand),
            auts: Some(auts),
            ..Self::default()
        }
    }

    pub fn to_avp(&self) -> Avp {
        let mut members = Vec::new();
        if self.xres.as_ref().is_some_and(|x| x.len() == 16) {
            members.push(Avp::utf8(
                AVP_SIP_AUTH_SCHEME,
                VENDOR_3GPP,
                true,
                AUTH_SCHEME_AKAV1_MD5,
            ));
        }
        if let (Some(rand), Some(autn)) = (&self.rand, &self.autn) {
            let mut raw = [0u8; 32];
            raw[..16].copy_from_slice(rand);
            raw[16..].copy_from_slice(autn);
            members.push(Avp::octets(AVP_SIP_AUTHENTICATE, VENDOR_3GPP, true, &raw));
        }
        if let (Some(rand), Some(auts)) = (&self.rand, &self.auts) {
            let mut raw = [0u8; 30];
            raw[..16].copy_from_slice(rand);
            raw[16..].copy_from_slice(auts);
            members.push(Avp::octets(AVP_SIP_AUTHORIZATION, VENDOR_3GPP, true, &raw));
        } else if let Some(xres) = self.xres.as_ref().filter(|x| x.len() == 16) {
            members.push(Avp::octets(AVP_SIP_AUTHORIZATION, VENDOR_3GPP, true, xres));
        }
        if let Some(ck) = &self.ck {
            members.push(Avp::octets(AVP_CONFIDENTIALITY_KEY, VENDOR_3GPP, true, ck));
        }
        if let Some(ik) = &self.ik {
            members.push(Avp::octets(AVP_INTEGRITY_KEY, VENDOR_3GPP, true, ik));
        }
        Avp::grouped(AVP_SIP_AUTH_DATA_ITEM, VENDOR_3GPP, true, &members)
    }

    pub fn from_avp(avp: &Avp) -> Result<Self, AvpError> {
        avp.require_vendor(VENDOR_3GPP)?;

        let mut item = Self::default();
        for a in avp.as_grouped()? {
            match a.code {
                AVP_SIP_AUTHENTICATE => {
                    a.require_vendor(VENDOR_3GPP)?;
                    if a.data.len() != 32 {
                        return Err(AvpError::InvalidLength {
                            code: a.code,
                            len: a.data.len(),
                        });
                    }
                    let mut rand = [0u8; 16];
                    let mut autn = [0u8; 16];
                    rand.copy_from_slice(&a.data[..16]);
                    autn.copy_from_slice(&a.data[16..]);
                    item.rand = Some(rand);
                    item.autn = Some(autn);
                },
                AVP_SIP_AUTHORIZATION => {
                    a.require_vendor(VENDOR_3GPP)?;
                    match a.data.len() {
                        30 => {
                            let mut rand = [0u8; 16];
                            let mut auts = [0u8; 14];
                            rand.copy_from_slice(&a.data[..16]);
                            auts.copy_from_slice(&a.data[16..]);
                            item.rand = Some(rand);
                            item.auts = Some(auts);
                        },
                        16 => item.xres = Some(a.data.to_vec()),
                        len => {
                            return Err(AvpError::InvalidLength { code: a.code, len });
                        },
                    }
                },
                AVP_CONFIDENTIALITY_KEY => {
                    a.require_vendor(VENDOR_3GPP)?;
                    item.ck = Some(fixed16(&a)?);
                },
                AVP_INTEGRITY_KEY => {
                    a.require_vendor(VENDOR_3GPP)?;
                    item.ik = Some(fixed16(&a)?);
                },
                _ => {},
            }
        }
        Ok(item)
    }
}

fn fixed16(a: &Avp) -> Result<[u8; 16], AvpError> {
    a.data
        .as_ref()
        .try_into()
        .map_err(|_| AvpError::InvalidLength {
            code: a.code,
            len: a.data.len(),
        })
}

/// Vendor-Specific-Application-Id for the Zh application.
pub fn vendor_specific_app_id() -> Avp {
    Avp::grouped(
        AVP_VENDOR_SPECIFIC_APP_ID,
        0,
        true,
        &[
            Avp::uint32(AVP_VENDOR_ID, 0, true, VENDOR_3GPP),
            Avp::uint32(AVP_AUTH_APPLICATION_ID, 0, true, APP_ID_ZH),
        ],
    )
}

/// Builds the MAR AVP list in command-ABNF order.
pub fn build_mar(
    session_id: &str,
    origin_host: &str,
    origin_realm: &str,
    destination_realm: &str,
    impi: &str,
    resync: Option<([u8; 16], [u8; 14])>,
) -> Vec<Avp> {
    let mut avps = vec![
        Avp::utf8(AVP_SESSION_ID, 0, true, session_id),
        vendor_specific_app_id(),
        Avp::uint32(AVP_AUTH_SESSION_STATE, 0, true, AUTH_SESSION_STATE_NO_STATE),
        Avp::utf8(AVP_ORIGIN_HOST, 0, true, origin_host),
        Avp::utf8(AVP_ORIGIN_REALM, 0, true, origin_realm),
        Avp::utf8(AVP_DESTINATION_REALM, 0, true, destination_realm),
        Avp::utf8(AVP_USER_NAME, 0, true, impi),
    ];
    if let Some((rand, auts)) = resync {
        avps.push(SipAuthDataItem::resync(rand, auts).to_avp());
    }
    avps
}

/// What a Multimedia-Auth-Answer boils down to.
#[derive(Debug)]
pub struct MaaOutcome {
    pub result_code: u32,
    pub av: Option<Av>,
}

/// Validates an MAA AVP list and extracts the vector on success.
pub fn parse_maa(avps: &[Avp]) -> Result<MaaOutcome, GbaError> {
    let mut result_code = None;
    let mut auth_item = None;

    for a in avps {
        match a.code {
            AVP_RESULT_CODE => {
                result_code = Some(
                    a.as_u32()
                        .map_err(|e| GbaError::HssMalformed(e.to_string()))?,
                );
            },
            AVP_EXPERIMENTAL_RESULT => {
                for m in a
                    .as_grouped()
                    .map_err(|e| GbaError::HssMalformed(e.to_string()))?
                {
                    if m.code == AVP_EXPERIMENTAL_RESULT_CODE {
                        result_code = Some(
                            m.as_u32()
                                .map_err(|e| GbaError::HssMalformed(e.to_string()))?,
                        );
                    }
                }
            },
            AVP_SIP_AUTH_DATA_ITEM => auth_item = Some(a),
            _ => {},
        }
    }

    let result_code = result_code
        .ok_or_else(|| GbaError::HssMalformed("answer carries no result".to_string()))?;
    if result_code != RESULT_SUCCESS {
        return Ok(MaaOutcome {
            result_code,
            av: None,
        });
    }

    let item = auth_item
        .ok_or_else(|| {
            GbaError::HssMalformed("success answer without SIP-Auth-Data-Item".to_string())
        })
        .and_then(|a| {
            SipAuthDataItem::from_avp(a).map_err(|e| GbaError::HssMalformed(e.to_string()))
        })?;

    let (Some(rand), Some(autn), Some(xres), Some(ck), Some(ik)) =
        (item.rand, item.autn, item.xres, item.ck, item.ik)
    else {
        return Err(GbaError::HssMalformed(
            "SIP-Auth-Data-Item is missing vector material".to_string(),
        ));
    };

    Ok(MaaOutcome {
        result_code,
        av: Some(Av {
            rand,
            autn,
            res: xres,
            ik,
            ck,
            impi: String::new(),
        }),
    })
}
