// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Bootstrapping Server Function endpoint.
    pub bsf: BsfConfig,
    /// Network Application Function endpoint.
    pub naf: NafConfig,
    /// GBA_ME client settings.
    pub me: MeConfig,
    /// AV cache (RESP backend) settings.
    pub cache: CacheConfig,
    /// Zh interface (Diameter Multimedia-Auth) identities.
    pub hss: HssConfig,
    /// Implementation/runtime parameters outside the protocol.
    pub runtime: RuntimeConfig,
    /// Subscribers provisioned into the in-memory DB at startup.
    #[serde(default)]
    pub subscribers: Vec<SubscriberSeed>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BsfConfig {
    #[serde(rename = "Listen")]
    /// BSF HTTP listen address, `host:port`.
    pub listen: String,

    #[serde(rename = "Lifetime", with = "serde_secs")]
    /// Bootstrapped key lifetime; also the AV cache TTL.
    pub lifetime: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NafConfig {
    #[serde(rename = "Listen")]
    /// NAF HTTP listen address, `host:port`.
    pub listen: String,

    #[serde(default, rename = "Tls")]
    /// Optional TLS material; plaintext when absent.
    pub tls: Option<TlsConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// PEM certificate chain and key for a TLS listener.
pub struct TlsConfig {
    #[serde(rename = "CertFile")]
    pub cert_file: String,
    #[serde(rename = "KeyFile")]
    pub key_file: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MeConfig {
    #[serde(rename = "BsfUrl")]
    /// HTTP URL of the BSF.
    pub bsf_url: String,

    #[serde(default = "default_auth_retransmit", rename = "AuthRetransmit")]
    /// Challenge retry budget for both the NAF loop and the bootstrap.
    pub auth_retransmit: u32,

    #[serde(default = "default_expire", rename = "Expire", with = "serde_secs")]
    /// Deadline for one outbound application request, retries included.
    pub expire: Duration,

    #[serde(default, rename = "InsecureSkipVerify")]
    /// Accept any NAF/BSF certificate (test deployments).
    pub insecure_skip_verify: bool,

    #[serde(default, rename = "CaFile")]
    /// PEM bundle of trusted roots for NAF/BSF TLS.
    pub ca_file: Option<String>,

    #[serde(default, rename = "UserAgentPrefix")]
    /// Prepended to the mandated `3gpp-gba` User-Agent product.
    pub ua_prefix: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(rename = "Address")]
    /// RESP backend address, `host:port`.
    pub address: String,

    #[serde(default = "default_expire", rename = "Timeout", with = "serde_secs")]
    /// Per-command I/O timeout.
    pub timeout: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HssConfig {
    #[serde(rename = "OriginHost")]
    pub origin_host: String,
    #[serde(rename = "OriginRealm")]
    pub origin_realm: String,
    #[serde(rename = "DestinationRealm")]
    pub destination_realm: String,

    #[serde(
        default = "default_hss_timeout",
        rename = "RequestTimeout",
        with = "serde_secs"
    )]
    /// MAR/MAA exchange deadline.
    pub request_timeout: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_product", rename = "ProductName")]
    /// Product token reported in `Server` headers.
    pub product_name: String,

    #[serde(
        default = "default_expire",
        rename = "TimeoutConnection",
        with = "serde_secs"
    )]
    /// Timeout for establishing outbound TCP connections.
    pub timeout_connection: Duration,
}

/// One provisioned subscriber; absent AV fields are filled with random
/// octets at load, the way the vector DB provisions partial records.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SubscriberSeed {
    #[serde(rename = "Impi")]
    pub impi: String,
    #[serde(default, rename = "Rand")]
    pub rand: Option<String>,
    #[serde(default, rename = "Autn")]
    pub autn: Option<String>,
    #[serde(default, rename = "Res")]
    pub res: Option<String>,
    #[serde(default, rename = "Ik")]
    pub ik: Option<String>,
    #[serde(default, rename = "Ck")]
    pub ck: Option<String>,
}

fn default_auth_retransmit() -> u32 {
    3
}
fn default_expire() -> Duration {
    Duration::from_secs(3)
}
fn default_hss_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_product() -> String {
    "gba-fabric".to_string()
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.bsf.listen.is_empty(), "Bsf.Listen must not be empty");
        ensure!(!self.naf.listen.is_empty(), "Naf.Listen must not be empty");
        ensure!(
            self.bsf.lifetime >= Duration::from_secs(1),
            "Bsf.Lifetime must be at least one second"
        );
        ensure!(
            self.me.auth_retransmit >= 1,
            "Me.AuthRetransmit must be >= 1"
        );

        let url = Url::parse(&self.me.bsf_url).context("invalid Me.BsfUrl")?;
        ensure!(
            matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
            "Me.BsfUrl must be an absolute http(s) URL"
        );

        ensure!(
            !self.cache.address.is_empty(),
            "Cache.Address must not be empty"
        );
        ensure!(
            !self.hss.origin_host.is_empty()
                && !self.hss.origin_realm.is_empty()
                && !self.hss.destination_realm.is_empty(),
            "Hss identities must not be empty"
        );

        for sub in &self.subscribers {
            ensure!(!sub.impi.is_empty(), "Subscribers[].Impi must not be empty");
        }
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
