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

//! An in-memory store.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Error, NewRule, PolicyRule, RuleStore, Zone, ZoneStore};
use crate::name::normalize;

/// A [`ZoneStore`] and [`RuleStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    zones: RwLock<BTreeMap<String, Zone>>,
    rules: RwLock<BTreeMap<u64, PolicyRule>>,
    last_rule_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the zone following `after` in name order (or the first
    /// zone if `after` is `None`).
    fn next_zone(&self, after: Option<&str>) -> Option<Zone> {
        let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        zones
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(_, zone)| zone.clone())
    }
}

#[async_trait]
impl ZoneStore for MemoryStore {
    async fn insert_zone(&self, zone: Zone) -> Result<(), Error> {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        let name = normalize(&zone.name);
        if zones.contains_key(&name) {
            return Err(Error::Conflict);
        }
        zones.insert(name.clone(), Zone { name, ..zone });
        Ok(())
    }

    async fn get_zone(&self, name: &str) -> Result<Zone, Error> {
        self.zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn delete_zone(&self, name: &str) -> Result<(), Error> {
        self.zones
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(name))
            .map(drop)
            .ok_or(Error::NotFound)
    }

    async fn set_next_refresh(&self, name: &str, next_refresh: u64) -> Result<(), Error> {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        let zone = zones.get_mut(&normalize(name)).ok_or(Error::NotFound)?;
        zone.next_refresh = next_refresh;
        Ok(())
    }

    async fn stream_zones(&self, tx: mpsc::Sender<Zone>) -> Result<(), Error> {
        // The lock is only held to find the next zone, never across the
        // send, so the store stays usable while the receiver is slow.
        let mut cursor: Option<String> = None;
        while let Some(zone) = self.next_zone(cursor.as_deref()) {
            cursor = Some(zone.name.clone());
            if tx.send(zone).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_rules(&self) -> Result<Vec<PolicyRule>, Error> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rules.values().cloned().collect())
    }

    async fn get_rule(&self, id: u64) -> Result<PolicyRule, Error> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn create_rule(&self, rule: NewRule) -> Result<PolicyRule, Error> {
        let id = self.last_rule_id.fetch_add(1, Ordering::Relaxed) + 1;
        let rule = rule.with_id(id);
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, rule: PolicyRule) -> Result<(), Error> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let existing = rules.get_mut(&rule.id).ok_or(Error::NotFound)?;
        *existing = rule;
        Ok(())
    }

    async fn delete_rule(&self, id: u64) -> Result<(), Error> {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(drop)
            .ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str) -> Zone {
        Zone {
            name: name.to_owned(),
            owner: String::from("alice"),
            next_refresh: 0,
        }
    }

    #[tokio::test]
    async fn zones_are_normalized_and_unique() {
        let store = MemoryStore::new();
        store.insert_zone(zone("A.Example.com.")).await.unwrap();
        assert_eq!(store.insert_zone(zone("a.example.com")).await, Err(Error::Conflict));
        assert_eq!(store.get_zone("a.example.com").await.unwrap().name, "a.example.com");
        store.set_next_refresh("a.example.com", 42).await.unwrap();
        assert_eq!(store.get_zone("a.example.com").await.unwrap().next_refresh, 42);
        store.delete_zone("a.example.com.").await.unwrap();
        assert_eq!(store.get_zone("a.example.com").await, Err(Error::NotFound));
    }

    #[tokio::test]
    async fn streaming_sends_every_zone_in_order() {
        let store = std::sync::Arc::new(MemoryStore::new());
        for i in 0..10 {
            store.insert_zone(zone(&format!("z{}.example.com", i))).await.unwrap();
        }

        let (tx, mut rx) = mpsc::channel(2);
        let producer = tokio::spawn({
            let store = store.clone();
            async move { store.stream_zones(tx).await }
        });

        let mut names = Vec::new();
        while let Some(zone) = rx.recv().await {
            names.push(zone.name);
        }
        producer.await.unwrap().unwrap();
        assert_eq!(names.len(), 10);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn streaming_stops_when_the_receiver_goes_away() {
        let store = MemoryStore::new();
        store.insert_zone(zone("a.example.com")).await.unwrap();
        store.insert_zone(zone("b.example.com")).await.unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert_eq!(store.stream_zones(tx).await, Ok(()));
    }

    #[tokio::test]
    async fn rules_get_increasing_ids() {
        let store = MemoryStore::new();
        let new = NewRule {
            zone_pattern: String::from("{user}.users.example.com"),
            zone_soa: String::from("users.example.com"),
            target_user: String::from("*@example.com"),
            description: String::new(),
        };
        let first = store.create_rule(new.clone()).await.unwrap();
        let second = store.create_rule(new).await.unwrap();
        assert!(second.id > first.id);

        let updated = PolicyRule {
            description: String::from("updated"),
            ..first.clone()
        };
        store.update_rule(updated.clone()).await.unwrap();
        assert_eq!(store.get_rule(first.id).await.unwrap(), updated);
        store.delete_rule(first.id).await.unwrap();
        assert_eq!(store.list_rules().await.unwrap(), [second]);
        assert_eq!(store.delete_rule(first.id).await, Err(Error::NotFound));
    }
}
