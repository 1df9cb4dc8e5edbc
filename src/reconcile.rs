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

//! Reconciliation of the store with the authoritative server.
//!
//! A pass streams the zones from the store through two bounded
//! channels: a checker task looks each due zone up on the authoritative
//! server, and zones that are missing or invalid are queued for
//! repair. Repairs run one at a time. Memory use is bounded by the
//! channel capacities no matter how many zones there are, and a slow
//! repair holds up the checker, which holds up the store.
//!
//! A zone that cannot be checked or repaired is logged and counted,
//! and the pass moves on. Only a definite "not found" counts as
//! missing; other lookup failures (such as the management API being
//! unreachable) never trigger a repair, since re-creating a zone
//! replaces its key.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::store::{Zone, ZoneStore};
use crate::util::unix_now;
use crate::zone::{self, ZoneManager};

/// The capacity of the channel from the store to the checker.
const ZONE_CHANNEL_CAPACITY: usize = 64;

/// The capacity of the channel from the checker to the repairer.
const REPAIR_CHANNEL_CAPACITY: usize = 16;

/// The counts of a reconciliation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PassSummary {
    /// Zones that were due and looked up.
    pub checked: usize,
    pub healthy: usize,
    pub repaired: usize,

    /// Zones that could not be checked or repaired.
    pub failed: usize,
}

/// What is wrong with a zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Damage {
    Missing,
    Invalid,
}

struct Repair {
    zone: Zone,
    damage: Damage,
}

/// Periodically brings the authoritative server in line with the
/// store.
pub struct Reconciler {
    manager: Arc<ZoneManager>,
    store: Arc<dyn ZoneStore>,
    interval: Duration,
}

impl Reconciler {
    /// Creates a reconciler that runs a pass every `interval`. A zone
    /// that was found healthy or repaired is not checked again until
    /// `interval` has passed.
    pub fn new(manager: Arc<ZoneManager>, store: Arc<dyn ZoneStore>, interval: Duration) -> Self {
        Self {
            manager,
            store,
            interval,
        }
    }

    /// Runs passes forever.
    pub async fn run(&self) {
        loop {
            let summary = self.run_pass().await;
            info!(
                "Reconciliation pass done: {} checked, {} healthy, {} repaired, {} failed.",
                summary.checked, summary.healthy, summary.repaired, summary.failed,
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Runs a single pass.
    pub async fn run_pass(&self) -> PassSummary {
        let (zone_tx, zone_rx) = mpsc::channel(ZONE_CHANNEL_CAPACITY);
        let (repair_tx, mut repair_rx) = mpsc::channel(REPAIR_CHANNEL_CAPACITY);

        let store = self.store.clone();
        let producer = tokio::spawn(async move {
            if let Err(err) = store.stream_zones(zone_tx).await {
                error!("Failed to list the zones to reconcile: {}", err);
            }
        });
        let checker = tokio::spawn(check_zones(
            self.manager.clone(),
            self.store.clone(),
            self.interval,
            zone_rx,
            repair_tx,
        ));

        let mut summary = PassSummary::default();
        while let Some(repair) = repair_rx.recv().await {
            match self.repair(&repair).await {
                Ok(()) => {
                    info!("Repaired zone {} ({:?}).", repair.zone.name, repair.damage);
                    self.schedule_next_check(&repair.zone.name).await;
                    summary.repaired += 1;
                }
                Err(err) => {
                    warn!("Failed to repair zone {}: {}", repair.zone.name, err);
                    summary.failed += 1;
                }
            }
        }

        if let Err(err) = producer.await {
            error!("The zone producer task failed: {}", err);
        }
        match checker.await {
            Ok(checked) => {
                summary.checked = checked.checked;
                summary.healthy = checked.healthy;
                summary.failed += checked.failed;
            }
            Err(err) => error!("The zone checker task failed: {}", err),
        }
        summary
    }

    /// Re-creates a zone, deleting it (and its keys) first if it is
    /// invalid.
    async fn repair(&self, repair: &Repair) -> Result<(), zone::Error> {
        let zone = &repair.zone;
        if repair.damage == Damage::Invalid {
            match self.manager.delete_zone(&zone.name, true).await {
                Ok(()) | Err(zone::Error::NotFound) => (),
                Err(err) => return Err(err),
            }
        }
        self.manager
            .create_leaf_zone(&zone.owner, &zone.name, true)
            .await
            .map(drop)
    }

    async fn schedule_next_check(&self, zone: &str) {
        set_next_refresh(self.store.as_ref(), zone, self.interval).await;
    }
}

/// Looks up each due zone, queueing the damaged ones for repair.
/// Returns the `checked`, `healthy`, and `failed` counts.
async fn check_zones(
    manager: Arc<ZoneManager>,
    store: Arc<dyn ZoneStore>,
    interval: Duration,
    mut zones: mpsc::Receiver<Zone>,
    repairs: mpsc::Sender<Repair>,
) -> PassSummary {
    let mut summary = PassSummary::default();
    while let Some(zone) = zones.recv().await {
        if zone.next_refresh > unix_now() {
            continue;
        }
        summary.checked += 1;

        let damage = match manager.get_zone(&zone.name).await {
            Ok(_) => {
                debug!("Zone {} is healthy.", zone.name);
                set_next_refresh(store.as_ref(), &zone.name, interval).await;
                summary.healthy += 1;
                continue;
            }
            Err(zone::Error::NotFound) => Damage::Missing,
            Err(zone::Error::Invalid { reason, .. }) => {
                warn!("Zone {} is invalid: {}", zone.name, reason);
                Damage::Invalid
            }
            Err(err) => {
                warn!("Failed to check zone {}: {}", zone.name, err);
                summary.failed += 1;
                continue;
            }
        };
        if repairs.send(Repair { zone, damage }).await.is_err() {
            break;
        }
    }
    summary
}

async fn set_next_refresh(store: &dyn ZoneStore, zone: &str, interval: Duration) {
    let next_refresh = unix_now() + interval.as_secs();
    if let Err(err) = store.set_next_refresh(zone, next_refresh).await {
        warn!("Failed to schedule the next check of zone {}: {}", zone, err);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Authoritative, MemoryAuthoritative};
    use crate::secret::deterministic_key_name;
    use crate::store::MemoryStore;
    use crate::zone::ZoneConfig;

    const INTERVAL: Duration = Duration::from_secs(600);

    struct Fixture {
        api: Arc<MemoryAuthoritative>,
        store: Arc<MemoryStore>,
        manager: Arc<ZoneManager>,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(MemoryAuthoritative::new());
        let store = Arc::new(MemoryStore::new());
        let nameservers = vec![String::from("ns1.example.net")];
        let config = ZoneConfig::new(nameservers, "hostmaster.example.net");
        let manager = Arc::new(ZoneManager::new(api.clone(), config));
        Fixture {
            reconciler: Reconciler::new(manager.clone(), store.clone(), INTERVAL),
            api,
            store,
            manager,
        }
    }

    impl Fixture {
        /// Records a zone in the store, and with `provision` creates it
        /// on the authoritative server too.
        async fn add_zone(&self, owner: &str, zone: &str, provision: bool) {
            if provision {
                self.manager.create_leaf_zone(owner, zone, false).await.unwrap();
            }
            self.store
                .insert_zone(Zone {
                    name: zone.to_owned(),
                    owner: owner.to_owned(),
                    next_refresh: 0,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn healthy_zones_are_left_alone() {
        let f = fixture();
        f.add_zone("alice", "alice.example.com", true).await;
        let before = f.manager.get_zone("alice.example.com").await.unwrap();

        let summary = f.reconciler.run_pass().await;
        assert_eq!(
            summary,
            PassSummary {
                checked: 1,
                healthy: 1,
                ..PassSummary::default()
            },
        );
        assert_eq!(f.manager.get_zone("alice.example.com").await.unwrap(), before);
        let zone = f.store.get_zone("alice.example.com").await.unwrap();
        assert!(zone.next_refresh >= unix_now() + INTERVAL.as_secs() - 5);
    }

    #[tokio::test]
    async fn missing_zones_are_recreated() {
        let f = fixture();
        f.add_zone("alice", "alice.example.com", false).await;

        let summary = f.reconciler.run_pass().await;
        assert_eq!((summary.checked, summary.repaired), (1, 1));

        let info = f.manager.get_zone("alice.example.com").await.unwrap();
        assert_eq!(info.keys.len(), 1);
        assert_eq!(info.keys[0].name, deterministic_key_name("alice", "alice.example.com"));
    }

    #[tokio::test]
    async fn invalid_zones_are_replaced() {
        let f = fixture();
        f.add_zone("alice", "alice.example.com", true).await;
        let key_name = deterministic_key_name("alice", "alice.example.com");
        f.api.delete_key(&key_name).await.unwrap();
        assert!(matches!(
            f.manager.get_zone("alice.example.com").await,
            Err(zone::Error::Invalid { .. }),
        ));

        let summary = f.reconciler.run_pass().await;
        assert_eq!((summary.checked, summary.repaired), (1, 1));
        assert!(f.manager.get_zone("alice.example.com").await.is_ok());
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_pass() {
        let f = fixture();
        f.add_zone("alice", "alice.example.com", false).await;
        f.add_zone("bob", "bob.example.com", true).await;
        f.add_zone("carol", "carol.example.com", false).await;
        f.api.fail_zone("alice.example.com");

        let summary = f.reconciler.run_pass().await;
        assert_eq!(
            summary,
            PassSummary {
                checked: 3,
                healthy: 1,
                repaired: 1,
                failed: 1,
            },
        );
        assert!(f.manager.get_zone("carol.example.com").await.is_ok());
        // The zone that failed stays due.
        assert_eq!(f.store.get_zone("alice.example.com").await.unwrap().next_refresh, 0);
    }

    #[tokio::test]
    async fn zones_that_are_not_due_are_skipped() {
        let f = fixture();
        f.store
            .insert_zone(Zone {
                name: String::from("alice.example.com"),
                owner: String::from("alice"),
                next_refresh: unix_now() + 3600,
            })
            .await
            .unwrap();

        assert_eq!(f.reconciler.run_pass().await, PassSummary::default());
        assert!(f.api.zone_names().is_empty());
    }

    #[tokio::test]
    async fn passes_handle_more_zones_than_the_channels_hold() {
        let f = fixture();
        let n = 2 * (ZONE_CHANNEL_CAPACITY + REPAIR_CHANNEL_CAPACITY);
        for i in 0..n {
            f.add_zone(&format!("user{}", i), &format!("z{}.example.com", i), i % 2 == 0)
                .await;
        }

        let summary = f.reconciler.run_pass().await;
        assert_eq!(summary.checked, n);
        assert_eq!(summary.healthy, n / 2);
        assert_eq!(summary.repaired, n / 2);
        assert_eq!(f.api.zone_names().len(), n);

        // Everything was rescheduled, so an immediate second pass has
        // nothing to do.
        assert_eq!(f.reconciler.run_pass().await, PassSummary::default());
    }
}
