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

//! The zone manager.
//!
//! The [`ZoneManager`] provisions zones on the authoritative server
//! through its management API: it creates the intermediate zones of a
//! delegation chain along with their NS delegations, creates leaf zones
//! with a fresh user-scoped TSIG key, and installs keys and the
//! metadata that lets them transfer and update the zone.
//!
//! Operations on different zones may run concurrently. Operations on
//! the same zone are not serialized: each API call is atomic, but a
//! racing create and delete of one zone end in whichever state the
//! server applies last. In particular, metadata lists are extended with
//! a read-modify-write ([`ZoneManager::add_key_to_zone`]), and two
//! concurrent appenders to the same list may lose one of the entries.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::api::{
    self, Authoritative, NewZone, RrSet, ZoneKey, ALLOW_DNSUPDATE_FROM, ANY_SOURCE,
    TSIG_ALLOW_AXFR, TSIG_ALLOW_DNSUPDATE,
};
use crate::message::tsig::Algorithm;
use crate::name::{self, fqdn, normalize, trim_root};
use crate::secret::{deterministic_key_name, generate_shared_secret, is_user_key};
use crate::util::unix_now;

mod error;
pub use error::Error;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// The SOA timers of created zones, in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SoaTimers {
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Default for SoaTimers {
    fn default() -> Self {
        Self {
            refresh: 10800,
            retry: 3600,
            expire: 604800,
            minimum: 3600,
        }
    }
}

/// A record set added to every leaf zone when it is created. The name
/// is relative to the zone (`@` for the apex).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DefaultRecord {
    pub name: String,
    pub rr_type: String,
    pub ttl: u32,
    pub contents: Vec<String>,
}

/// The configuration of a [`ZoneManager`].
#[derive(Clone, Debug)]
pub struct ZoneConfig {
    /// The nameservers of created zones. The first is the SOA MNAME.
    pub nameservers: Vec<String>,

    /// The SOA RNAME, in domain name form (`hostmaster.example.com`).
    pub hostmaster: String,

    pub soa: SoaTimers,

    /// The TTL of the SOA, NS, and delegation records.
    pub ttl: u32,

    /// The algorithm of generated user keys.
    pub key_algorithm: Algorithm,

    pub default_records: Vec<DefaultRecord>,

    /// A key installed in every zone for operator access.
    pub admin_key: Option<ZoneKey>,
}

impl ZoneConfig {
    pub fn new(nameservers: Vec<String>, hostmaster: impl Into<String>) -> Self {
        Self {
            nameservers,
            hostmaster: hostmaster.into(),
            soa: SoaTimers::default(),
            ttl: 3600,
            key_algorithm: Algorithm::HmacSha256,
            default_records: Vec::new(),
            admin_key: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ZONE MANAGER                                                       //
////////////////////////////////////////////////////////////////////////

/// A zone and the user-scoped keys that may update it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ZoneInfo {
    pub name: String,
    pub keys: Vec<ZoneKey>,
}

/// Manages zones on the authoritative server.
pub struct ZoneManager {
    api: Arc<dyn Authoritative>,
    config: ZoneConfig,
}

impl ZoneManager {
    pub fn new(api: Arc<dyn Authoritative>, config: ZoneConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Provisions `zone` for `user` under `authority`: every zone of the
    /// delegation chain above `zone` is ensured with
    /// [`ensure_intermediate_zone`](Self::ensure_intermediate_zone), and
    /// then the leaf is created with
    /// [`create_leaf_zone`](Self::create_leaf_zone).
    pub async fn provision(
        &self,
        user: &str,
        zone: &str,
        authority: &str,
        force: bool,
    ) -> Result<Vec<ZoneKey>, Error> {
        let chain = name::delegation_chain(zone, authority);
        let (leaf, intermediates) = chain.split_last().ok_or_else(|| Error::NoDelegationChain {
            zone: normalize(zone),
            authority: normalize(authority),
        })?;
        for (intermediate, child) in intermediates.iter().zip(&chain[1..]) {
            self.ensure_intermediate_zone(intermediate, Some(child.as_str()))
                .await?;
        }
        self.create_leaf_zone(user, leaf, force).await
    }

    /// Makes sure the intermediate zone `zone` exists, carries the
    /// admin key (if one is configured), and delegates `next_child` to
    /// the configured nameservers.
    ///
    /// Calling this repeatedly with the same arguments leaves the same
    /// state as calling it once.
    pub async fn ensure_intermediate_zone(
        &self,
        zone: &str,
        next_child: Option<&str>,
    ) -> Result<(), Error> {
        if !self.api.zone_exists(zone).await? {
            info!("Creating intermediate zone {}.", zone);
            match self.api.create_zone(&self.new_zone(zone, false)).await {
                // Somebody else got there first, which is just as good.
                Ok(()) | Err(api::Error::Conflict) => (),
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(ref admin_key) = self.config.admin_key {
            self.add_key_to_zone(zone, admin_key).await?;
        }

        if let Some(child) = next_child.filter(|child| !child.is_empty()) {
            debug!("Delegating {} from {}.", child, zone);
            self.api
                .patch_rrsets(zone, &[RrSet::delete(child, "NS")])
                .await?;
            let delegation =
                RrSet::replace(child, "NS", self.config.ttl, &self.nameserver_contents());
            self.api.patch_rrsets(zone, &[delegation]).await?;
        }
        Ok(())
    }

    /// Creates the leaf zone `zone` for `user` and returns its user key.
    ///
    /// With `force`, any existing zone and user key are deleted first.
    pub async fn create_leaf_zone(
        &self,
        user: &str,
        zone: &str,
        force: bool,
    ) -> Result<Vec<ZoneKey>, Error> {
        let key_name = deterministic_key_name(user, zone);
        if force {
            best_effort("delete zone", zone, self.api.delete_zone(zone).await);
            best_effort("delete key", &key_name, self.api.delete_key(&key_name).await);
        }

        info!("Creating zone {} for {}.", zone, user);
        self.api.create_zone(&self.new_zone(zone, true)).await?;
        if let Some(ref admin_key) = self.config.admin_key {
            self.add_key_to_zone(zone, admin_key).await?;
        }

        let user_key = ZoneKey {
            name: key_name,
            algorithm: self.config.key_algorithm.name().to_owned(),
            secret: generate_shared_secret(),
        };
        self.add_key_to_zone(zone, &user_key).await?;
        Ok(vec![user_key])
    }

    /// Installs `key` and allows it to transfer and update `zone`.
    ///
    /// An existing key of the same name is reused if its algorithm and
    /// secret match, and replaced otherwise. The key is appended to the
    /// zone's transfer and update metadata, keeping unrelated entries,
    /// and updates are allowed from any source address.
    pub async fn add_key_to_zone(&self, zone: &str, key: &ZoneKey) -> Result<(), Error> {
        match self.api.get_key(&key.name).await {
            Ok(existing)
                if trim_root(&existing.algorithm).eq_ignore_ascii_case(trim_root(&key.algorithm))
                    && existing.secret == key.secret =>
            {
                debug!("Key {} is already installed.", key.name);
            }
            Ok(_) => {
                debug!("Replacing key {}.", key.name);
                self.api.delete_key(&key.name).await?;
                self.api.create_key(key).await?;
            }
            Err(api::Error::NotFound) => self.api.create_key(key).await?,
            Err(err) => return Err(err.into()),
        }

        let key_name = [trim_root(&key.name).to_owned()];
        for kind in [TSIG_ALLOW_AXFR, TSIG_ALLOW_DNSUPDATE] {
            self.append_metadata(zone, kind, &key_name).await?;
        }
        self.append_metadata(zone, ALLOW_DNSUPDATE_FROM, &ANY_SOURCE.map(String::from))
            .await
    }

    /// Appends `values` to a metadata list, skipping values it already
    /// contains.
    async fn append_metadata(
        &self,
        zone: &str,
        kind: &str,
        values: &[String],
    ) -> Result<(), Error> {
        let mut current = self.api.get_metadata(zone, kind).await?;
        let original_len = current.len();
        for value in values {
            let present = current
                .iter()
                .any(|c| trim_root(c).eq_ignore_ascii_case(trim_root(value)));
            if !present {
                current.push(value.clone());
            }
        }
        if current.len() != original_len {
            self.api.set_metadata(zone, kind, &current).await?;
        }
        Ok(())
    }

    /// Returns `zone` and its user-scoped keys.
    ///
    /// A zone without user keys, or referencing a user key that is
    /// missing or incomplete, is [`Error::Invalid`].
    pub async fn get_zone(&self, zone: &str) -> Result<ZoneInfo, Error> {
        if !self.api.zone_exists(zone).await? {
            return Err(Error::NotFound);
        }
        let invalid = |reason| Error::Invalid {
            zone: normalize(zone),
            reason,
        };

        let key_names = self.api.get_metadata(zone, TSIG_ALLOW_DNSUPDATE).await?;
        let mut keys = Vec::new();
        for key_name in key_names.iter().filter(|name| is_user_key(name)) {
            match self.api.get_key(key_name).await {
                Ok(key) if key.is_complete() => keys.push(key),
                Ok(_) => return Err(invalid("a key is missing its name, algorithm, or secret")),
                Err(api::Error::NotFound) => return Err(invalid("a referenced key does not exist")),
                Err(err) => return Err(err.into()),
            }
        }

        if keys.is_empty() {
            Err(invalid("the zone has no user keys"))
        } else {
            Ok(ZoneInfo {
                name: normalize(zone),
                keys,
            })
        }
    }

    /// Deletes `zone`, and with `delete_keys` its user-scoped keys
    /// first. Keys that are already gone are skipped; any other failure
    /// to delete a key aborts before the zone is deleted.
    pub async fn delete_zone(&self, zone: &str, delete_keys: bool) -> Result<(), Error> {
        if delete_keys {
            let key_names = self.api.get_metadata(zone, TSIG_ALLOW_DNSUPDATE).await?;
            for key_name in key_names.iter().filter(|name| is_user_key(name)) {
                match self.api.delete_key(key_name).await {
                    Ok(()) | Err(api::Error::NotFound) => (),
                    Err(err) => return Err(err.into()),
                }
            }
        }
        info!("Deleting zone {}.", zone);
        self.api.delete_zone(zone).await?;
        Ok(())
    }

    fn nameserver_contents(&self) -> Vec<String> {
        self.config.nameservers.iter().map(|ns| fqdn(ns)).collect()
    }

    fn soa_content(&self, zone: &str) -> String {
        let mname = self
            .config
            .nameservers
            .first()
            .map_or_else(|| fqdn(zone), |ns| fqdn(ns));
        let timers = &self.config.soa;
        format!(
            "{} {} {} {} {} {} {}",
            mname,
            fqdn(&self.config.hostmaster),
            unix_now() as u32,
            timers.refresh,
            timers.retry,
            timers.expire,
            timers.minimum,
        )
    }

    /// Builds the zone creation request: the SOA and NS record sets,
    /// plus the default records for leaf zones.
    fn new_zone(&self, zone: &str, with_defaults: bool) -> NewZone {
        let mut rrsets = vec![
            RrSet::new(zone, "SOA", self.config.ttl, &[self.soa_content(zone)]),
            RrSet::new(zone, "NS", self.config.ttl, &self.nameserver_contents()),
        ];
        if with_defaults {
            rrsets.extend(self.config.default_records.iter().map(|record| {
                RrSet::new(
                    &name::qualify(&record.name, zone),
                    &record.rr_type.to_ascii_uppercase(),
                    record.ttl,
                    &record.contents,
                )
            }));
        }
        NewZone {
            name: normalize(zone),
            rrsets,
        }
    }
}

/// Logs the failure of a cleanup step, unless it failed because there
/// was nothing to clean up.
fn best_effort(action: &str, what: &str, result: Result<(), api::Error>) {
    match result {
        Ok(()) | Err(api::Error::NotFound) => (),
        Err(err) => warn!("Failed to {} {} (continuing): {}", action, what, err),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
