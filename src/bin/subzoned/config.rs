// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the configuration file.

use std::fmt::{self, Write};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use subzone::api::{Authoritative, HttpAuthoritative, HttpConfig, MemoryAuthoritative, ZoneKey};
use subzone::client::{Algorithm, TsigKey};
use subzone::name::{self, normalize, validate_domain_name};
use subzone::policy::{
    FixedProvider, FixedZone, ScriptProvider, WebhookConfig, WebhookProvider, ZoneProvider,
};
use subzone::rr::Type;
use subzone::store::{MemoryStore, ZoneStore};
use subzone::upstream::UpdaterConfig;
use subzone::zone::{DefaultRecord, SoaTimers, ZoneConfig};

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration from the file given by `path`.
///
/// A relative script path is interpreted relative to the configuration
/// file's directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let dir = match path.as_ref().parent() {
        Some(p) => p,
        None => return Err(anyhow!("the configuration file path has no parent")),
    };
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let mut config: Config =
        toml::from_str(&raw_config).context("failed to parse the configuration file")?;

    if let ProviderConfig::Script(ref mut script) = config.policy.provider {
        if script.path.is_relative() {
            script.path = dir.join(&script.path);
        }
    }

    log_config_summary(&config);
    Ok(config)
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let upstream = match config.upstream {
        Some(ref upstream) => format!(
            "{} in {} via {}",
            name::qualify(&upstream.name, &upstream.zone.0),
            upstream.zone.0,
            upstream.server,
        ),
        None => String::from("disabled"),
    };
    let reconcile = if config.reconcile.enabled {
        format!("every {} s", config.reconcile.interval)
    } else {
        String::from("disabled")
    };

    let mut message = format!(
        "Configuration loaded:\n         Authoritative: {}\n         Policy:        {}\n         Reconcile:     {}\n         Upstream:      {}\n         Nameservers:   ",
        config.authoritative.name(),
        config.policy.provider.name(),
        reconcile,
        upstream,
    );
    for (i, nameserver) in config.zones.nameservers.iter().enumerate() {
        if i > 0 {
            message.push_str(", ");
        }
        write!(message, "{}", nameserver.0).unwrap();
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub authoritative: AuthoritativeConfig,
    pub zones: ZonesConfig,
    pub policy: PolicyConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub upstream: Option<UpstreamConfig>,
    #[serde(default = "default_store_config")]
    pub store: StoreConfig,
}

/// A shared-secret key, with its secret base64-encoded.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    pub name: String,
    #[serde(default = "default_key_algorithm")]
    pub algorithm: ConfigAlgorithm,
    pub secret: String,
}

fn default_key_algorithm() -> ConfigAlgorithm {
    ConfigAlgorithm(Algorithm::HmacSha256)
}

impl KeyConfig {
    pub fn to_tsig_key(&self) -> Result<TsigKey> {
        TsigKey::from_base64(&self.name, self.algorithm.0.name(), &self.secret)
            .with_context(|| format!("invalid key {}", self.name))
    }

    /// Returns the key in the form the management API takes. The secret
    /// is checked first.
    pub fn to_zone_key(&self) -> Result<ZoneKey> {
        self.to_tsig_key()?;
        Ok(ZoneKey {
            name: normalize(&self.name),
            algorithm: self.algorithm.0.name().to_owned(),
            secret: self.secret.trim().to_owned(),
        })
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: AUTHORITATIVE SERVER                        //
////////////////////////////////////////////////////////////////////////

/// The selection of the authoritative server's management API.
#[derive(Debug, Deserialize)]
#[serde(tag = "backend")]
pub enum AuthoritativeConfig {
    #[serde(rename = "powerdns")]
    PowerDns(PowerDnsConfig),
    #[serde(rename = "memory")]
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerDnsConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

fn default_server_id() -> String {
    String::from("localhost")
}

impl AuthoritativeConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerDns(_) => "powerdns",
            Self::Memory => "memory",
        }
    }

    pub fn build(&self) -> Result<Arc<dyn Authoritative>> {
        match self {
            Self::PowerDns(config) => {
                let http_config = HttpConfig {
                    url: config.url.clone(),
                    api_key: config.api_key.clone(),
                    server_id: config.server_id.clone(),
                };
                let api = HttpAuthoritative::new(&http_config)
                    .context("failed to set up the management API client")?;
                Ok(Arc::new(api))
            }
            Self::Memory => Ok(Arc::new(MemoryAuthoritative::new())),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: ZONES                                       //
////////////////////////////////////////////////////////////////////////

/// How zones are created.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonesConfig {
    pub nameservers: Vec<ConfigName>,
    pub hostmaster: ConfigName,
    #[serde(default = "default_zone_ttl")]
    pub ttl: u32,
    #[serde(default)]
    pub soa: SoaConfig,
    #[serde(default = "default_key_algorithm")]
    pub key_algorithm: ConfigAlgorithm,
    #[serde(default)]
    pub default_records: Vec<DefaultRecordConfig>,
    pub admin_key: Option<KeyConfig>,
}

fn default_zone_ttl() -> u32 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoaConfig {
    #[serde(default = "default_refresh")]
    pub refresh: u32,
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default = "default_expire")]
    pub expire: u32,
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

fn default_refresh() -> u32 {
    SoaTimers::default().refresh
}

fn default_retry() -> u32 {
    SoaTimers::default().retry
}

fn default_expire() -> u32 {
    SoaTimers::default().expire
}

fn default_minimum() -> u32 {
    SoaTimers::default().minimum
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}

/// A record set added to every new leaf zone.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultRecordConfig {
    #[serde(default = "default_record_name")]
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: ConfigType,
    #[serde(default = "default_zone_ttl")]
    pub ttl: u32,
    pub contents: Vec<String>,
}

fn default_record_name() -> String {
    String::from("@")
}

impl ZonesConfig {
    pub fn to_zone_config(&self) -> Result<ZoneConfig> {
        if self.nameservers.is_empty() {
            return Err(anyhow!("at least one nameserver must be configured"));
        }
        let mut config = ZoneConfig::new(
            self.nameservers.iter().map(|ns| ns.0.clone()).collect(),
            self.hostmaster.0.clone(),
        );
        config.ttl = self.ttl;
        config.soa = SoaTimers {
            refresh: self.soa.refresh,
            retry: self.soa.retry,
            expire: self.soa.expire,
            minimum: self.soa.minimum,
        };
        config.key_algorithm = self.key_algorithm.0;
        config.default_records = self
            .default_records
            .iter()
            .map(|record| DefaultRecord {
                name: record.name.clone(),
                rr_type: record.rr_type.0.to_string(),
                ttl: record.ttl,
                contents: record.contents.clone(),
            })
            .collect();
        config.admin_key = match self.admin_key {
            Some(ref key) => Some(key.to_zone_key().context("invalid admin key")?),
            None => None,
        };
        Ok(config)
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: POLICY                                      //
////////////////////////////////////////////////////////////////////////

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// The email addresses of the super-administrators.
    #[serde(default)]
    pub super_admins: Vec<String>,
    pub provider: ProviderConfig,
}

/// The selection of zone provider and its configuration.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderConfig {
    #[serde(rename = "fixed")]
    Fixed(FixedConfig),
    #[serde(rename = "webhook")]
    Webhook(WebhookProviderConfig),
    #[serde(rename = "script")]
    Script(ScriptConfig),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedConfig {
    pub zones: Vec<FixedZoneConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedZoneConfig {
    pub suffix: ConfigName,
    pub zone_soa: ConfigName,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookProviderConfig {
    pub url: String,
    pub token: String,
    /// How long answers are cached, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    /// The request timeout, in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_size() -> u64 {
    10_000
}

fn default_webhook_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    pub path: PathBuf,
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Webhook(_) => "webhook",
            Self::Script(_) => "script",
        }
    }

    /// Creates the provider. This must be called within a Tokio
    /// runtime.
    pub fn build(&self) -> Result<ZoneProvider> {
        match self {
            Self::Fixed(config) => Ok(ZoneProvider::Fixed(FixedProvider::new(
                config
                    .zones
                    .iter()
                    .map(|zone| FixedZone {
                        suffix: zone.suffix.0.clone(),
                        zone_soa: zone.zone_soa.0.clone(),
                    })
                    .collect(),
            ))),
            Self::Webhook(config) => {
                let provider = WebhookProvider::new(WebhookConfig {
                    url: config.url.clone(),
                    token: config.token.clone(),
                    ttl: Duration::from_secs(config.cache_ttl),
                    max_entries: config.cache_size,
                    timeout: Duration::from_secs(config.timeout),
                })
                .context("failed to set up the policy webhook client")?;
                Ok(ZoneProvider::Webhook(provider))
            }
            Self::Script(config) => {
                let source = fs::read_to_string(&config.path).with_context(|| {
                    format!("failed to read the policy script {}", config.path.display())
                })?;
                let provider =
                    ScriptProvider::new(&source).context("failed to load the policy script")?;
                Ok(ZoneProvider::Script(provider))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: BACKGROUND TASKS                            //
////////////////////////////////////////////////////////////////////////

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_enabled")]
    pub enabled: bool,
    /// The time between passes, in seconds.
    #[serde(default = "default_reconcile_interval")]
    pub interval: u64,
}

fn default_reconcile_enabled() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    600
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconcile_enabled(),
            interval: default_reconcile_interval(),
        }
    }
}

/// Self-registration with an upstream nameserver.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// The upstream server, as `host:port`.
    pub server: String,
    pub zone: ConfigName,
    pub name: String,
    pub address: IpAddr,
    #[serde(default = "default_upstream_ttl")]
    pub ttl: u32,
    /// The time between iterations, in seconds.
    #[serde(default = "default_upstream_interval")]
    pub interval: u64,
    pub key: KeyConfig,
}

fn default_upstream_ttl() -> u32 {
    300
}

fn default_upstream_interval() -> u64 {
    300
}

impl UpstreamConfig {
    pub fn to_updater_config(&self) -> Result<UpdaterConfig> {
        Ok(UpdaterConfig {
            zone: self.zone.0.clone(),
            name: self.name.clone(),
            address: self.address,
            ttl: self.ttl,
            interval: Duration::from_secs(self.interval),
            key: self.key.to_tsig_key().context("invalid upstream key")?,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: STORE                                       //
////////////////////////////////////////////////////////////////////////

/// The selection of the record store.
#[derive(Debug, Deserialize)]
#[serde(tag = "backend")]
pub enum StoreConfig {
    #[serde(rename = "memory")]
    Memory,
}

fn default_store_config() -> StoreConfig {
    StoreConfig::Memory
}

impl StoreConfig {
    pub fn build(&self) -> Arc<dyn ZoneStore> {
        match self {
            Self::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER SUBZONE TYPES FOR SERDE                              //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type,
/// parsed from a string by `$parse`.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $parse:expr, $description:literal) => {
        /// A macro-generated deserializable wrapper.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                ($parse)(value)
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

/// Parses a domain name into its normalized form.
fn parse_name(text: &str) -> Result<String, name::Error> {
    validate_domain_name(text.trim())?;
    Ok(normalize(text))
}

make_serde_wrapper!(ConfigName, String, parse_name, "domain name");
make_serde_wrapper!(ConfigType, Type, str::parse::<Type>, "RR type");
make_serde_wrapper!(
    ConfigAlgorithm,
    Algorithm,
    str::parse::<Algorithm>,
    "TSIG algorithm"
);
