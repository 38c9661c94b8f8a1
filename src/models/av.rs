// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An AKA authentication vector as delivered by the HSS.
///
/// RAND/AUTN/IK/CK are exactly 128 bit; XRES is variable-length and must be
/// non-empty. The vector is owned by the AV cache once bootstrapped; every
/// reader works on a copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Av {
    /// 128 bit AKA RAND
    #[serde(rename = "RAND", with = "serde_hex16")]
    pub rand: [u8; 16],
    /// SQN(48)+AMF(16)+MAC(64) = 128 bit AKA AUTN
    #[serde(rename = "AUTN", with = "serde_hex16")]
    pub autn: [u8; 16],
    /// Expected response, variable length
    #[serde(rename = "RES", with = "serde_hex")]
    pub res: Vec<u8>,
    /// 128 bit integrity key
    #[serde(rename = "IK", with = "serde_hex16")]
    pub ik: [u8; 16],
    /// 128 bit confidentiality key
    #[serde(rename = "CK", with = "serde_hex16")]
    pub ck: [u8; 16],
    /// IP Multimedia Private Identity the vector was issued for
    #[serde(rename = "IMPI", default)]
    pub impi: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvError {
    #[error("AV field {field} must be {expected} octets, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("AV XRES must not be empty")]
    EmptyRes,
    #[error("malformed AV record: {0}")]
    MalformedRecord(String),
}

impl Av {
    pub fn validate(&self) -> Result<(), AvError> {
        if self.res.is_empty() {
            return Err(AvError::EmptyRes);
        }
        Ok(())
    }

    /// AUTS resynchronisation token: SQN⊕AK concatenated with MAC-S, the
    /// 2-octet AMF omitted, base64-encoded.
    pub fn auts_token(&self) -> String {
        let mut raw = [0u8; 14];
        raw[..6].copy_from_slice(&self.autn[..6]);
        raw[6..].copy_from_slice(&self.autn[8..]);
        STANDARD.encode(raw)
    }

    /// Cache record: `hex(RAND):hex(AUTN):hex(RES):hex(IK):hex(CK):IMPI`.
    pub fn to_record(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            hex::encode(self.rand),
            hex::encode(self.autn),
            hex::encode(&self.res),
            hex::encode(self.ik),
            hex::encode(self.ck),
            self.impi
        )
    }

    pub fn from_record(s: &str) -> Result<Self, AvError> {
        let mut parts = s.splitn(6, ':');
        let mut next = |field: &'static str| {
            parts
                .next()
                .ok_or_else(|| AvError::MalformedRecord(format!("missing {field}")))
        };

        let rand = decode16("RAND", next("RAND")?)?;
        let autn = decode16("AUTN", next("AUTN")?)?;
        let res = hex::decode(next("RES")?)
            .map_err(|e| AvError::MalformedRecord(format!("RES: {e}")))?;
        let ik = decode16("IK", next("IK")?)?;
        let ck = decode16("CK", next("CK")?)?;
        let impi = next("IMPI")?.to_string();

        let av = Self {
            rand,
            autn,
            res,
            ik,
            ck,
            impi,
        };
        av.validate()?;
        Ok(av)
    }
}

impl fmt::Display for Av {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RAND={}, AUTN={}, RES={}, IK={}, CK={}, IMPI={}",
            hex::encode(self.rand),
            hex::encode(self.autn),
            hex::encode(&self.res),
            hex::encode(self.ik),
            hex::encode(self.ck),
            self.impi
        )
    }
}

fn decode16(field: &'static str, v: &str) -> Result<[u8; 16], AvError> {
    let raw =
        hex::decode(v).map_err(|e| AvError::MalformedRecord(format!("{field}: {e}")))?;
    raw.try_into().map_err(|raw: Vec<u8>| AvError::InvalidLength {
        field,
        expected: 16,
        got: raw.len(),
    })
}

/// Serde helpers representing fixed 16-octet fields as hex strings.
mod serde_hex16 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(v: &[u8; 16], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 16], D::Error> {
        let s = String::deserialize(d)?;
        let raw = hex::decode(&s).map_err(D::Error::custom)?;
        raw.try_into()
            .map_err(|raw: Vec<u8>| D::Error::custom(format!("expected 16 octets, got {}", raw.len())))
    }
}

/// Serde helpers representing variable-length octet fields as hex strings.
mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(D::Error::custom)
    }
}
