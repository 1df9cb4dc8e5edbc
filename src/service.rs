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

//! The operations exposed to the request layer.
//!
//! [`ZoneService`] and [`RuleService`] tie the policy, the store, and
//! the zone manager together. The requester is always identified by a
//! [`User`] established by the (external) authentication layer. Every
//! failure is an [`Error`] whose [`status`](Error::status) the
//! request layer turns into a response.

use std::sync::Arc;

use log::info;

use crate::api::ZoneKey;
use crate::error::Error;
use crate::name::{normalize, validate_domain_name};
use crate::policy::rules::{validate_rule, visible_rules, SuperAdmins};
use crate::policy::{User, ZoneProvider};
use crate::store::{self, NewRule, PolicyRule, RuleStore, Zone, ZoneStore};
use crate::util::unix_now;
use crate::zone::{self, ZoneInfo, ZoneManager};

////////////////////////////////////////////////////////////////////////
// ZONES                                                              //
////////////////////////////////////////////////////////////////////////

/// Creation, inspection, and deletion of user zones.
pub struct ZoneService {
    manager: Arc<ZoneManager>,
    policy: Arc<ZoneProvider>,
    store: Arc<dyn ZoneStore>,
    super_admins: Arc<SuperAdmins>,
}

impl ZoneService {
    pub fn new(
        manager: Arc<ZoneManager>,
        policy: Arc<ZoneProvider>,
        store: Arc<dyn ZoneStore>,
        super_admins: Arc<SuperAdmins>,
    ) -> Self {
        Self {
            manager,
            policy,
            store,
            super_admins,
        }
    }

    /// Provisions `zone` for `user` and returns its user key.
    ///
    /// The zone must be allowed by the policy, which also determines
    /// the start of authority it is delegated from, and must not be in
    /// the store yet.
    pub async fn create_zone(&self, user: &User, zone: &str) -> Result<Vec<ZoneKey>, Error> {
        validate_domain_name(zone.trim())?;
        let zone = normalize(zone);
        let allowed = self
            .policy
            .is_allowed_zone(user, &zone)
            .await?
            .ok_or(Error::Forbidden)?;
        match self.store.get_zone(&zone).await {
            Ok(_) => return Err(Error::Conflict),
            Err(store::Error::NotFound) => (),
            Err(err) => return Err(err.into()),
        }

        let keys = self
            .manager
            .provision(&user.username, &zone, &allowed.zone_soa, false)
            .await?;
        self.store
            .insert_zone(Zone {
                name: zone.clone(),
                owner: user.username.clone(),
                next_refresh: unix_now(),
            })
            .await?;
        info!("Created zone {} for {}.", zone, user.username);
        Ok(keys)
    }

    /// Returns `zone` and its user keys.
    pub async fn get_zone(&self, user: &User, zone: &str) -> Result<ZoneInfo, Error> {
        let zone = self.owned_zone(user, zone).await?;
        Ok(self.manager.get_zone(&zone.name).await?)
    }

    /// Deletes `zone` and its user keys from the authoritative server,
    /// and then from the store.
    pub async fn delete_zone(&self, user: &User, zone: &str) -> Result<(), Error> {
        let zone = self.owned_zone(user, zone).await?;
        match self.manager.delete_zone(&zone.name, true).await {
            Ok(()) | Err(zone::Error::NotFound) => (),
            Err(err) => return Err(err.into()),
        }
        self.store.delete_zone(&zone.name).await?;
        info!("Deleted zone {} of {}.", zone.name, zone.owner);
        Ok(())
    }

    /// Looks up `zone` in the store. Zones the requester may not see
    /// are reported as not found, so as not to reveal that they exist.
    async fn owned_zone(&self, user: &User, zone: &str) -> Result<Zone, Error> {
        let zone = self.store.get_zone(&normalize(zone)).await?;
        if zone.owner == user.username || self.super_admins.contains(&user.email) {
            Ok(zone)
        } else {
            Err(Error::NotFound)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// RULES                                                              //
////////////////////////////////////////////////////////////////////////

/// Listing and curation of policy rules.
pub struct RuleService {
    store: Arc<dyn RuleStore>,
    super_admins: Arc<SuperAdmins>,
}

impl RuleService {
    pub fn new(store: Arc<dyn RuleStore>, super_admins: Arc<SuperAdmins>) -> Self {
        Self {
            store,
            super_admins,
        }
    }

    /// Returns the rules visible to `user`.
    pub async fn list_rules(&self, user: &User) -> Result<Vec<PolicyRule>, Error> {
        let rules = self.store.list_rules().await?;
        Ok(visible_rules(rules, &user.email, &self.super_admins))
    }

    pub async fn create_rule(&self, user: &User, rule: NewRule) -> Result<PolicyRule, Error> {
        self.check_super_admin(user)?;
        validate_rule(&rule)?;
        let rule = self.store.create_rule(rule).await?;
        info!("{} created policy rule {}.", user.email, rule.id);
        Ok(rule)
    }

    pub async fn update_rule(&self, user: &User, rule: PolicyRule) -> Result<(), Error> {
        self.check_super_admin(user)?;
        validate_rule(&NewRule {
            zone_pattern: rule.zone_pattern.clone(),
            zone_soa: rule.zone_soa.clone(),
            target_user: rule.target_user.clone(),
            description: rule.description.clone(),
        })?;
        let id = rule.id;
        self.store.update_rule(rule).await?;
        info!("{} updated policy rule {}.", user.email, id);
        Ok(())
    }

    pub async fn delete_rule(&self, user: &User, id: u64) -> Result<(), Error> {
        self.check_super_admin(user)?;
        self.store.delete_rule(id).await?;
        info!("{} deleted policy rule {}.", user.email, id);
        Ok(())
    }

    fn check_super_admin(&self, user: &User) -> Result<(), Error> {
        if self.super_admins.contains(&user.email) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Authoritative, MemoryAuthoritative, TSIG_ALLOW_DNSUPDATE};
    use crate::policy::{FixedProvider, FixedZone};
    use crate::secret::{deterministic_key_name, is_user_key};
    use crate::store::MemoryStore;
    use crate::zone::ZoneConfig;

    struct Fixture {
        api: Arc<MemoryAuthoritative>,
        store: Arc<MemoryStore>,
        zones: ZoneService,
        rules: RuleService,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(MemoryAuthoritative::new());
        let store = Arc::new(MemoryStore::new());
        let nameservers = vec![String::from("ns1.example.net")];
        let config = ZoneConfig::new(nameservers, "hostmaster.example.net");
        let manager = Arc::new(ZoneManager::new(api.clone(), config));
        let policy = Arc::new(ZoneProvider::Fixed(FixedProvider::new(vec![FixedZone {
            suffix: String::from("users.example.com"),
            zone_soa: String::from("users.example.com"),
        }])));
        let super_admins = Arc::new(SuperAdmins::new(["root@example.com"]));
        Fixture {
            zones: ZoneService::new(manager, policy, store.clone(), super_admins.clone()),
            rules: RuleService::new(store.clone(), super_admins),
            api,
            store,
        }
    }

    fn user(username: &str, email: &str) -> User {
        User {
            subject: format!("sub-{}", username),
            username: username.to_owned(),
            email: email.to_owned(),
            groups: Vec::new(),
        }
    }

    fn alice() -> User {
        user("alice", "alice@example.com")
    }

    fn root() -> User {
        user("root", "root@example.com")
    }

    #[tokio::test]
    async fn zone_lifecycle() {
        let f = fixture();
        let zone = "alice.users.example.com";

        let keys = f.zones.create_zone(&alice(), zone).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, deterministic_key_name("alice", zone));
        assert_eq!(f.api.zone_names(), ["alice.users.example.com", "users.example.com"]);
        assert_eq!(
            f.api.rrset("users.example.com", zone, "NS"),
            Some(vec![String::from("ns1.example.net.")]),
        );

        let info = f.zones.get_zone(&alice(), zone).await.unwrap();
        assert_eq!(info.name, zone);
        assert_eq!(info.keys, keys);

        f.zones.delete_zone(&alice(), zone).await.unwrap();
        assert_eq!(f.api.zone_names(), ["users.example.com"]);
        assert!(!f.api.key_names().iter().any(|name| is_user_key(name)));
        assert_eq!(f.zones.get_zone(&alice(), zone).await, Err(Error::NotFound));
    }

    #[tokio::test]
    async fn creation_is_checked_against_the_policy_and_the_store() {
        let f = fixture();
        assert_eq!(
            f.zones.create_zone(&alice(), "bob.users.example.com").await,
            Err(Error::Forbidden),
        );
        assert!(matches!(
            f.zones.create_zone(&alice(), "not a name").await,
            Err(Error::InvalidInput(_)),
        ));

        f.zones
            .create_zone(&alice(), "Alice.Users.Example.com.")
            .await
            .unwrap();
        assert_eq!(
            f.zones.create_zone(&alice(), "alice.users.example.com").await,
            Err(Error::Conflict),
        );
        assert_eq!(
            f.store.get_zone("alice.users.example.com").await.unwrap().owner,
            "alice",
        );
    }

    #[tokio::test]
    async fn other_users_cannot_see_zones() {
        let f = fixture();
        let zone = "alice.users.example.com";
        f.zones.create_zone(&alice(), zone).await.unwrap();

        let bob = user("bob", "bob@example.com");
        assert_eq!(f.zones.get_zone(&bob, zone).await, Err(Error::NotFound));
        assert_eq!(f.zones.delete_zone(&bob, zone).await, Err(Error::NotFound));
        assert!(f.zones.get_zone(&root(), zone).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_zones_are_reported_upstream() {
        let f = fixture();
        let zone = "alice.users.example.com";
        f.zones.create_zone(&alice(), zone).await.unwrap();
        f.api
            .set_metadata(zone, TSIG_ALLOW_DNSUPDATE, &[])
            .await
            .unwrap();
        assert!(matches!(
            f.zones.get_zone(&alice(), zone).await,
            Err(Error::Upstream(_)),
        ));
    }

    #[tokio::test]
    async fn deleting_a_zone_missing_upstream_cleans_the_store() {
        let f = fixture();
        let zone = "alice.users.example.com";
        f.zones.create_zone(&alice(), zone).await.unwrap();
        f.api.delete_zone(zone).await.unwrap();

        f.zones.delete_zone(&alice(), zone).await.unwrap();
        assert_eq!(f.store.get_zone(zone).await, Err(store::Error::NotFound));
    }

    fn new_rule(target_user: &str) -> NewRule {
        NewRule {
            zone_pattern: String::from("{user}.team.example.com"),
            zone_soa: String::from("example.com"),
            target_user: target_user.to_owned(),
            description: String::from("team zones"),
        }
    }

    #[tokio::test]
    async fn only_super_admins_curate_rules() {
        let f = fixture();
        assert_eq!(
            f.rules.create_rule(&alice(), new_rule("*@example.com")).await,
            Err(Error::Forbidden),
        );
        let rule = f
            .rules
            .create_rule(&root(), new_rule("*@example.com"))
            .await
            .unwrap();
        assert_eq!(f.rules.delete_rule(&alice(), rule.id).await, Err(Error::Forbidden));

        let mut updated = rule.clone();
        updated.target_user = String::from("a*b*c");
        assert!(matches!(
            f.rules.update_rule(&root(), updated).await,
            Err(Error::InvalidInput(_)),
        ));
        f.rules.delete_rule(&root(), rule.id).await.unwrap();
        assert_eq!(f.rules.delete_rule(&root(), rule.id).await, Err(Error::NotFound));
    }

    #[tokio::test]
    async fn users_see_matching_rules_only() {
        let f = fixture();
        f.rules
            .create_rule(&root(), new_rule("*@example.com"))
            .await
            .unwrap();
        f.rules
            .create_rule(&root(), new_rule("*@example.org"))
            .await
            .unwrap();

        let visible = f.rules.list_rules(&alice()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].target_user, "*@example.com");
        assert_eq!(f.rules.list_rules(&root()).await.unwrap().len(), 2);
    }
}
