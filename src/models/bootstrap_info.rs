// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
pub const GBA_XMLNS: &str = "uri:3gpp-gba";

/// The BSF success body: `application/vnd.3gpp.bsf+xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "BootstrappingInfo")]
pub struct BootstrappingInfo {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    pub btid: String,
    /// Bootstrapped key lifetime, RFC 3339 UTC.
    pub lifetime: String,
}

impl BootstrappingInfo {
    pub fn new(btid: String, lifetime: DateTime<Utc>) -> Self {
        Self {
            xmlns: GBA_XMLNS.to_string(),
            btid,
            lifetime: lifetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        Ok(format!("{XML_DECLARATION}{}", quick_xml::se::to_string(self)?))
    }

    pub fn from_xml(s: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(s)
    }
}
