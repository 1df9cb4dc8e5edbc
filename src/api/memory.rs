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

//! An in-memory [`Authoritative`] implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Authoritative, ChangeType, Error, NewZone, RrSet, ZoneKey};
use crate::name::normalize;

/// A record set key: the normalized owner and the type.
type RrSetKey = (String, String);

#[derive(Debug, Default)]
struct Zone {
    rrsets: BTreeMap<RrSetKey, (u32, Vec<String>)>,
    metadata: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct State {
    zones: BTreeMap<String, Zone>,
    keys: BTreeMap<String, ZoneKey>,
    failing: BTreeSet<String>,
}

impl State {
    fn zone(&mut self, name: &str) -> Result<&mut Zone, Error> {
        let name = normalize(name);
        if self.failing.contains(&name) {
            return Err(Error::Rejected {
                status: 503,
                message: format!("zone {} is unavailable", name),
            });
        }
        self.zones.get_mut(&name).ok_or(Error::NotFound)
    }
}

/// An authoritative server kept in memory.
///
/// It follows the semantics of the HTTP implementation: names are
/// compared in normalized form, creating what exists is a conflict, and
/// touching what does not exist is [`Error::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryAuthoritative {
    state: Mutex<State>,
}

impl MemoryAuthoritative {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the names of all zones, sorted.
    pub fn zone_names(&self) -> Vec<String> {
        self.state().zones.keys().cloned().collect()
    }

    /// Returns the names of all keys, sorted.
    pub fn key_names(&self) -> Vec<String> {
        self.state().keys.keys().cloned().collect()
    }

    /// Returns the contents of a record set, if it exists.
    pub fn rrset(&self, zone: &str, name: &str, rr_type: &str) -> Option<Vec<String>> {
        let state = self.state();
        let zone = state.zones.get(&normalize(zone))?;
        zone.rrsets
            .get(&(normalize(name), rr_type.to_ascii_uppercase()))
            .map(|(_, contents)| contents.clone())
    }

    /// Makes every operation on `zone` fail as if the server could not
    /// serve it.
    pub fn fail_zone(&self, zone: &str) {
        self.state().failing.insert(normalize(zone));
    }
}

#[async_trait]
impl Authoritative for MemoryAuthoritative {
    async fn zone_exists(&self, zone: &str) -> Result<bool, Error> {
        match self.state().zone(zone) {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn create_zone(&self, zone: &NewZone) -> Result<(), Error> {
        let mut state = self.state();
        let name = normalize(&zone.name);
        if state.zones.contains_key(&name) {
            return Err(Error::Conflict);
        }
        let mut new = Zone::default();
        for rrset in &zone.rrsets {
            let contents = rrset.records.iter().map(|r| r.content.clone()).collect();
            new.rrsets.insert(
                (normalize(&rrset.name), rrset.rr_type.to_ascii_uppercase()),
                (rrset.ttl, contents),
            );
        }
        state.zones.insert(name, new);
        Ok(())
    }

    async fn delete_zone(&self, zone: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.zone(zone)?;
        state.zones.remove(&normalize(zone));
        Ok(())
    }

    async fn patch_rrsets(&self, zone: &str, rrsets: &[RrSet]) -> Result<(), Error> {
        let mut state = self.state();
        let zone = state.zone(zone)?;
        for rrset in rrsets {
            let key = (normalize(&rrset.name), rrset.rr_type.to_ascii_uppercase());
            match rrset.changetype {
                Some(ChangeType::Delete) => {
                    zone.rrsets.remove(&key);
                }
                Some(ChangeType::Replace) if !rrset.records.is_empty() => {
                    let contents = rrset.records.iter().map(|r| r.content.clone()).collect();
                    zone.rrsets.insert(key, (rrset.ttl, contents));
                }
                Some(ChangeType::Replace) => {
                    zone.rrsets.remove(&key);
                }
                None => {
                    return Err(Error::Rejected {
                        status: 422,
                        message: String::from("changetype is required"),
                    })
                }
            }
        }
        Ok(())
    }

    async fn get_metadata(&self, zone: &str, kind: &str) -> Result<Vec<String>, Error> {
        let mut state = self.state();
        let zone = state.zone(zone)?;
        Ok(zone.metadata.get(kind).cloned().unwrap_or_default())
    }

    async fn set_metadata(&self, zone: &str, kind: &str, values: &[String]) -> Result<(), Error> {
        let mut state = self.state();
        let zone = state.zone(zone)?;
        if values.is_empty() {
            zone.metadata.remove(kind);
        } else {
            zone.metadata.insert(kind.to_owned(), values.to_vec());
        }
        Ok(())
    }

    async fn get_key(&self, name: &str) -> Result<ZoneKey, Error> {
        self.state()
            .keys
            .get(&normalize(name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn create_key(&self, key: &ZoneKey) -> Result<(), Error> {
        let mut state = self.state();
        let name = normalize(&key.name);
        if state.keys.contains_key(&name) {
            return Err(Error::Conflict);
        }
        let key = ZoneKey {
            name: name.clone(),
            ..key.clone()
        };
        state.keys.insert(name, key);
        Ok(())
    }

    async fn delete_key(&self, name: &str) -> Result<(), Error> {
        self.state()
            .keys
            .remove(&normalize(name))
            .map(drop)
            .ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> RrSet {
        RrSet::new(name, "NS", 3600, &[String::from("ns1.example.net.")])
    }

    #[tokio::test]
    async fn zones_are_created_once() {
        let api = MemoryAuthoritative::new();
        let zone = NewZone {
            name: String::from("Example.COM."),
            rrsets: vec![ns("example.com")],
        };
        api.create_zone(&zone).await.unwrap();
        assert!(matches!(api.create_zone(&zone).await, Err(Error::Conflict)));
        assert!(api.zone_exists("example.com").await.unwrap());
        assert_eq!(
            api.rrset("example.com", "example.com.", "ns"),
            Some(vec![String::from("ns1.example.net.")]),
        );
        api.delete_zone("example.com").await.unwrap();
        assert!(matches!(api.delete_zone("example.com").await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn patches_replace_and_delete() {
        let api = MemoryAuthoritative::new();
        let zone = NewZone {
            name: String::from("example.com"),
            rrsets: Vec::new(),
        };
        api.create_zone(&zone).await.unwrap();
        let contents = [String::from("ns2.example.net.")];
        api.patch_rrsets("example.com", &[RrSet::replace("a.example.com", "NS", 60, &contents)])
            .await
            .unwrap();
        assert_eq!(api.rrset("example.com", "a.example.com", "NS"), Some(contents.to_vec()));
        api.patch_rrsets("example.com", &[RrSet::delete("a.example.com", "NS")])
            .await
            .unwrap();
        assert_eq!(api.rrset("example.com", "a.example.com", "NS"), None);
        assert!(matches!(
            api.patch_rrsets("missing.com", &[]).await,
            Err(Error::NotFound),
        ));
    }

    #[tokio::test]
    async fn failing_zones_reject_everything() {
        let api = MemoryAuthoritative::new();
        api.fail_zone("broken.example.com");
        assert!(matches!(
            api.zone_exists("broken.example.com").await,
            Err(Error::Rejected { status: 503, .. }),
        ));
    }
}
