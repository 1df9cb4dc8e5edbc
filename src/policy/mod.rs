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

//! Zone access policy.
//!
//! A [`ZoneProvider`] decides which zones a user may have, and under
//! which start of authority each is delegated. There are three
//! providers, chosen once at startup:
//!
//! * [`FixedProvider`]: one zone per configured suffix, named after the
//!   user;
//! * [`WebhookProvider`]: asks a remote HTTP endpoint, caching the
//!   answers; and
//! * [`ScriptProvider`]: runs an operator-supplied script in a
//!   sandboxed interpreter.
//!
//! Separately, the [`rules`] module implements matching and validation
//! of the policy rules curated by super-administrators.

use std::fmt;

use serde::{Deserialize, Serialize};

mod fixed;
pub mod rules;
mod script;
mod webhook;
pub use fixed::{FixedProvider, FixedZone};
pub use script::{ScriptProvider, IS_ZONE_ALLOWED, LIST_ZONES};
pub use webhook::{WebhookConfig, WebhookProvider};

use crate::name::normalize;

/// The identity of a requesting user, as established by the (external)
/// authentication layer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    /// A stable identifier of the user.
    pub subject: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// A zone a user may have, and the start of authority it is delegated
/// from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UserZone {
    pub zone: String,
    pub zone_soa: String,
}

/// The zone access policy provider.
pub enum ZoneProvider {
    Fixed(FixedProvider),
    Webhook(WebhookProvider),
    Script(ScriptProvider),
}

impl ZoneProvider {
    /// Returns the zones `user` may have.
    pub async fn user_zones(&self, user: &User) -> Result<Vec<UserZone>, Error> {
        match self {
            Self::Fixed(provider) => Ok(provider.user_zones(user)),
            Self::Webhook(provider) => provider.user_zones(user).await,
            Self::Script(provider) => provider.user_zones(user).await,
        }
    }

    /// Returns whether `user` may have `zone`, and if so, the matching
    /// [`UserZone`].
    ///
    /// Unless the script provider's script defines its own entry point
    /// for this, a zone is allowed if it is among the user's zones.
    pub async fn is_allowed_zone(
        &self,
        user: &User,
        zone: &str,
    ) -> Result<Option<UserZone>, Error> {
        if let Self::Script(provider) = self {
            if provider.has_allow_entry_point() {
                return provider.is_allowed_zone(user, zone).await;
            }
        }
        let zone = normalize(zone);
        Ok(self
            .user_zones(user)
            .await?
            .into_iter()
            .find(|candidate| normalize(&candidate.zone) == zone))
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors arising from policy evaluation and rule validation.
#[derive(Debug)]
pub enum Error {
    /// A rule (or one of its fields) is malformed.
    InvalidRule(String),

    /// The script could not be compiled, failed, or returned something
    /// unexpected.
    Script(String),

    /// The webhook could not be reached, or its response could not be
    /// read.
    Webhook(reqwest::Error),

    /// The webhook answered with an error status.
    WebhookStatus(u16),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Webhook(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidRule(reason) => write!(f, "invalid rule: {}", reason),
            Self::Script(reason) => write!(f, "policy script failed: {}", reason),
            Self::Webhook(err) => write!(f, "policy webhook failed: {}", err),
            Self::WebhookStatus(status) => {
                write!(f, "policy webhook answered with status {}", status)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Webhook(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            subject: String::from("sub-1"),
            username: String::from("Alice"),
            email: String::from("alice@example.com"),
            groups: Vec::new(),
        }
    }

    #[tokio::test]
    async fn default_allow_check_uses_the_zone_list() {
        let provider = ZoneProvider::Fixed(FixedProvider::new(vec![FixedZone {
            suffix: String::from("users.example.com"),
            zone_soa: String::from("example.com"),
        }]));

        let allowed = provider
            .is_allowed_zone(&alice(), "ALICE.users.example.com.")
            .await
            .unwrap();
        assert_eq!(
            allowed,
            Some(UserZone {
                zone: String::from("alice.users.example.com"),
                zone_soa: String::from("example.com"),
            }),
        );
        assert_eq!(
            provider
                .is_allowed_zone(&alice(), "bob.users.example.com")
                .await
                .unwrap(),
            None,
        );
    }
}
