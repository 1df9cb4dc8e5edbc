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

//! The local record store.
//!
//! The store holds the zones that are supposed to exist (and who owns
//! them) and the administrator-curated policy rules. Its persistence
//! is somebody else's business: this module defines the [`ZoneStore`]
//! and [`RuleStore`] traits the rest of the crate relies on, and an
//! in-memory [`MemoryStore`] implementing both.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

mod memory;
pub use memory::MemoryStore;

/// A zone that is supposed to exist.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Zone {
    /// The normalized zone name.
    pub name: String,

    /// The username of the owner.
    pub owner: String,

    /// When the zone is next due to be checked, as a Unix time.
    pub next_refresh: u64,
}

/// An access-control rule curated by super-administrators.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PolicyRule {
    pub id: u64,

    /// The zone name pattern. It may contain the
    /// [`USER_PLACEHOLDER`](crate::policy::rules::USER_PLACEHOLDER).
    pub zone_pattern: String,

    /// The start of authority the pattern applies under.
    pub zone_soa: String,

    /// Which users the rule applies to: an email address, or a pattern
    /// with a single `*` wildcard.
    pub target_user: String,

    pub description: String,
}

/// A [`PolicyRule`] yet to be assigned an ID.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NewRule {
    pub zone_pattern: String,
    pub zone_soa: String,
    pub target_user: String,
    #[serde(default)]
    pub description: String,
}

impl NewRule {
    pub fn with_id(self, id: u64) -> PolicyRule {
        PolicyRule {
            id,
            zone_pattern: self.zone_pattern,
            zone_soa: self.zone_soa,
            target_user: self.target_user,
            description: self.description,
        }
    }
}

/// The zone inventory.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Adds a zone. Fails with [`Error::Conflict`] if it exists.
    async fn insert_zone(&self, zone: Zone) -> Result<(), Error>;

    async fn get_zone(&self, name: &str) -> Result<Zone, Error>;

    async fn delete_zone(&self, name: &str) -> Result<(), Error>;

    async fn set_next_refresh(&self, name: &str, next_refresh: u64) -> Result<(), Error>;

    /// Sends every zone into `tx`, returning when all have been sent
    /// or the receiver has gone away. Since the channel is bounded, a
    /// slow receiver holds up the store rather than the zones piling
    /// up in memory.
    async fn stream_zones(&self, tx: mpsc::Sender<Zone>) -> Result<(), Error>;
}

/// The policy rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_rules(&self) -> Result<Vec<PolicyRule>, Error>;

    async fn get_rule(&self, id: u64) -> Result<PolicyRule, Error>;

    /// Stores a new rule and returns it with its assigned ID.
    async fn create_rule(&self, rule: NewRule) -> Result<PolicyRule, Error>;

    /// Replaces the rule with the same ID.
    async fn update_rule(&self, rule: PolicyRule) -> Result<(), Error>;

    async fn delete_rule(&self, id: u64) -> Result<(), Error>;
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error returned by a store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    NotFound,
    Conflict,

    /// The store could not perform the operation.
    Unavailable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found in the store"),
            Self::Conflict => f.write_str("already in the store"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for Error {}
