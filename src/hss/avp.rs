// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Diameter AVP TLV codec.
//!
//! Only what the Zh interface needs: flat and grouped AVPs, the V/M/P flag
//! bits, vendor-id, 24-bit length and 4-octet padding. Message framing,
//! routing and peer state live in the external Diameter runtime.

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

bitflags! {
    /// AVP header flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AvpFlags: u8 {
        const VENDOR    = 0x80;
        const MANDATORY = 0x40;
        const PROTECTED = 0x20;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvpError {
    #[error("truncated AVP stream")]
    Truncated,
    #[error("AVP {code} carries an invalid length {len}")]
    InvalidLength { code: u32, len: usize },
    #[error("AVP {code} carries invalid flag/vendor bits")]
    InvalidBits { code: u32 },
    #[error("AVP {code} carries an invalid value")]
    InvalidValue { code: u32 },
    #[error("unsupported mandatory AVP {code}")]
    Unsupported { code: u32 },
    #[error("mandatory AVP {code} is missing")]
    Missing { code: u32 },
    #[error("AVP {code} occurs too many times")]
    TooMany { code: u32 },
}

/// Diameter result codes the Zh exchange produces.
pub const RESULT_SUCCESS: u32 = 2001;
pub const RESULT_AVP_UNSUPPORTED: u32 = 5001;
pub const RESULT_INVALID_AVP_VALUE: u32 = 5004;
pub const RESULT_MISSING_AVP: u32 = 5005;
pub const RESULT_AVP_OCCURS_TOO_MANY_TIMES: u32 = 5009;
pub const RESULT_INVALID_AVP_BITS: u32 = 3009;

impl AvpError {
    /// The answer Result-Code this validation failure maps to.
    pub fn result_code(&self) -> u32 {
        match self {
            AvpError::InvalidBits { .. } => RESULT_INVALID_AVP_BITS,
            AvpError::Unsupported { .. } => RESULT_AVP_UNSUPPORTED,
            AvpError::Missing { .. } => RESULT_MISSING_AVP,
            AvpError::TooMany { .. } => RESULT_AVP_OCCURS_TOO_MANY_TIMES,
            _ => RESULT_INVALID_AVP_VALUE,
        }
    }
}

/// One attribute-value pair. `vendor_id == 0` means no Vendor-Id field
/// (and the VENDOR flag bit clear).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub flags: AvpFlags,
    pub vendor_id: u32,
    pub data: Bytes,
}

impl Avp {
    pub fn new(code: u32, vendor_id: u32, mandatory: bool, data: Bytes) -> Self {
        let mut flags = AvpFlags::empty();
        if vendor_id != 0 {
            flags |= AvpFlags::VENDOR;
        }
        if mandatory {
            flags |= AvpFlags::MANDATORY;
        }
        Self {
            code,
            flags,
            vendor_id,
            data,
        }
    }

    pub fn utf8(code: u32, vendor_id: u32, mandatory: bool, v: &str) -> Self {
        Self::new(code, vendor_id, mandatory, Bytes::copy_from_slice(v.as_bytes()))
    }

    pub fn uint32(code: u32, vendor_id: u32, mandatory: bool, v: u32) -> Self {
        Self::new(code, vendor_id, mandatory, Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn octets(code: u32, vendor_id: u32, mandatory: bool, v: &[u8]) -> Self {
        Self::new(code, vendor_id, mandatory, Bytes::copy_from_slice(v))
    }

    pub fn grouped(code: u32, vendor_id: u32, mandatory: bool, members: &[Avp]) -> Self {
        Self::new(code, vendor_id, mandatory, encode(members))
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags.contains(AvpFlags::MANDATORY)
    }

    /// Checks the 3GPP vendor framing (vendor-id set, M flag on).
    pub fn require_vendor(&self, vendor_id: u32) -> Result<(), AvpError> {
        if self.vendor_id != vendor_id || !self.is_mandatory() {
            return Err(AvpError::InvalidBits { code: self.code });
        }
        Ok(())
    }

    pub fn as_u32(&self) -> Result<u32, AvpError> {
        let raw: [u8; 4] = self
            .data
            .as_ref()
            .try_into()
            .map_err(|_| AvpError::InvalidLength {
                code: self.code,
                len: self.data.len(),
            })?;
        Ok(u32::from_be_bytes(raw))
    }

    pub fn as_utf8(&self) -> Result<String, AvpError> {
        String::from_utf8(self.data.to_vec())
            .map_err(|_| AvpError::InvalidValue { code: self.code })
    }

    pub fn as_grouped(&self) -> Result<Vec<Avp>, AvpError> {
        decode(&mut self.data.clone())
    }

    fn encode_to(&self, out: &mut BytesMut) {
        let header_len = if self.flags.contains(AvpFlags::VENDOR) {
            12
        } else {
            8
        };
        let len = header_len + self.data.len();

        out.put_u32(self.code);
        out.put_u8(self.flags.bits());
        out.put_uint(len as u64, 3);
        if self.flags.contains(AvpFlags::VENDOR) {
            out.put_u32(self.vendor_id);
        }
        out.put_slice(&self.data);
        for _ in 0..(4 - len % 4) % 4 {
            out.put_u8(0);
        }
    }
}

/// Serialises a sequence of AVPs, padding included.
pub fn encode(avps: &[Avp]) -> Bytes {
    let mut out = BytesMut::with_capacity(
        avps.iter().map(|a| 12 + a.data.len() + 3).sum::<usize>(),
    );
    for a in avps {
        a.encode_to(&mut out);
    }
    out.freeze()
}

/// Parses a sequence of AVPs until the buffer is exhausted.
pub fn decode(buf: &mut Bytes) -> Result<Vec<Avp>, AvpError> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        out.push(decode_one(buf)?);
    }
    Ok(out)
}

fn decode_one(buf: &mut Bytes) -> Result<Avp, AvpError> {
    if buf.len() < 8 {
        return Err(AvpError::Truncated);
    }
    let code = buf.get_u32();
    let flags =
        AvpFlags::from_bits(buf.get_u8()).ok_or(AvpError::InvalidBits { code })?;
    let len = buf.get_uint(3) as usize;

    let header_len = if flags.contains(AvpFlags::VENDOR) { 12 } else { 8 };
    if len < header_len {
        return Err(AvpError::InvalidLength { code, len });
    }

    let vendor_id = if flags.contains(AvpFlags::VENDOR) {
        if buf.len() < 4 {
            return Err(AvpError::Truncated);
        }
        buf.get_u32()
    } else {
        0
    };

    let data_len = len - header_len;
    if buf.len() < data_len {
        return Err(AvpError::Truncated);
    }
    let data = buf.split_to(data_len);

    let pad = (4 - len % 4) % 4;
    if buf.len() < pad {
        return Err(AvpError::Truncated);
    }
    buf.advance(pad);

    Ok(Avp {
        code,
        flags,
        vendor_id,
        data,
    })
}
