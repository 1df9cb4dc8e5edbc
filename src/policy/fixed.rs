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

//! The fixed zone provider.

use super::{User, UserZone};
use crate::name::{normalize, sanitize_to_label};

/// A suffix under which every user gets a zone, and the start of
/// authority of those zones.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixedZone {
    pub suffix: String,
    pub zone_soa: String,
}

/// A provider giving each user the zone `<label>.<suffix>` for every
/// configured suffix, where the label is the sanitized username.
#[derive(Clone, Debug)]
pub struct FixedProvider {
    zones: Vec<FixedZone>,
}

impl FixedProvider {
    pub fn new(zones: Vec<FixedZone>) -> Self {
        Self { zones }
    }

    /// Returns the user's zones, in the configured order. A username
    /// with nothing to make a label from gets no zones.
    pub fn user_zones(&self, user: &User) -> Vec<UserZone> {
        let label = sanitize_to_label(&user.username);
        if label.is_empty() {
            return Vec::new();
        }
        self.zones
            .iter()
            .map(|fixed| UserZone {
                zone: format!("{}.{}", label, normalize(&fixed.suffix)),
                zone_soa: normalize(&fixed.zone_soa),
            })
            .collect()
    }
}
