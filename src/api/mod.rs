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

//! The authoritative server's management API.
//!
//! Zones, their record sets and metadata, and TSIG keys are managed
//! through the [`Authoritative`] trait. [`HttpAuthoritative`] speaks the
//! PowerDNS HTTP API; [`MemoryAuthoritative`] keeps everything in
//! memory, with the same semantics, for tests and local development.
//!
//! Every method is a single call against the server and is atomic
//! there. Sequences of calls (such as a read-modify-write of metadata)
//! are not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
pub mod http;
pub mod memory;
pub use error::Error;
pub use http::{HttpAuthoritative, HttpConfig};
pub use memory::MemoryAuthoritative;

/// The metadata kind listing the keys allowed to transfer a zone.
pub const TSIG_ALLOW_AXFR: &str = "TSIG-ALLOW-AXFR";

/// The metadata kind listing the keys allowed to update a zone.
pub const TSIG_ALLOW_DNSUPDATE: &str = "TSIG-ALLOW-DNSUPDATE";

/// The metadata kind listing the networks updates are accepted from.
pub const ALLOW_DNSUPDATE_FROM: &str = "ALLOW-DNSUPDATE-FROM";

/// The values of [`ALLOW_DNSUPDATE_FROM`] that admit any source.
pub const ANY_SOURCE: [&str; 2] = ["0.0.0.0/0", "::/0"];

////////////////////////////////////////////////////////////////////////
// TYPES                                                              //
////////////////////////////////////////////////////////////////////////

/// A TSIG key as stored by the authoritative server. The secret is
/// base64-encoded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ZoneKey {
    pub name: String,
    pub algorithm: String,
    pub secret: String,
}

impl ZoneKey {
    /// Returns whether the key has a name, an algorithm, and a secret.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.algorithm.is_empty() && !self.secret.is_empty()
    }
}

/// A single record of an [`RrSet`], in presentation format.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ApiRecord {
    pub content: String,
    #[serde(default)]
    pub disabled: bool,
}

impl ApiRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            disabled: false,
        }
    }
}

/// How an [`RrSet`] in a patch is applied.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// Replace the record set with the given records.
    Replace,

    /// Delete the record set.
    Delete,
}

/// A record set, as created with a zone or sent in a patch. Names are
/// fully qualified (with a trailing dot).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RrSet {
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changetype: Option<ChangeType>,
    pub records: Vec<ApiRecord>,
}

impl RrSet {
    /// Makes a record set for zone creation.
    pub fn new(name: &str, rr_type: &str, ttl: u32, contents: &[String]) -> Self {
        Self {
            name: crate::name::fqdn(name),
            rr_type: rr_type.to_owned(),
            ttl,
            changetype: None,
            records: contents.iter().map(ApiRecord::new).collect(),
        }
    }

    /// Makes a record set replacing whatever is at `name` and
    /// `rr_type`.
    pub fn replace(name: &str, rr_type: &str, ttl: u32, contents: &[String]) -> Self {
        Self {
            changetype: Some(ChangeType::Replace),
            ..Self::new(name, rr_type, ttl, contents)
        }
    }

    /// Makes a record set deleting whatever is at `name` and `rr_type`.
    pub fn delete(name: &str, rr_type: &str) -> Self {
        Self {
            name: crate::name::fqdn(name),
            rr_type: rr_type.to_owned(),
            ttl: 0,
            changetype: Some(ChangeType::Delete),
            records: Vec::new(),
        }
    }
}

/// A zone to be created, with its initial record sets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewZone {
    pub name: String,
    pub rrsets: Vec<RrSet>,
}

////////////////////////////////////////////////////////////////////////
// THE AUTHORITATIVE TRAIT                                            //
////////////////////////////////////////////////////////////////////////

/// The management operations of an authoritative server.
///
/// Zone and key names may be given with or without a trailing dot.
/// Operations on absent zones or keys fail with [`Error::NotFound`];
/// creating something that already exists fails with
/// [`Error::Conflict`].
#[async_trait]
pub trait Authoritative: Send + Sync {
    async fn zone_exists(&self, zone: &str) -> Result<bool, Error>;

    async fn create_zone(&self, zone: &NewZone) -> Result<(), Error>;

    async fn delete_zone(&self, zone: &str) -> Result<(), Error>;

    /// Applies the given record set changes to a zone.
    async fn patch_rrsets(&self, zone: &str, rrsets: &[RrSet]) -> Result<(), Error>;

    /// Returns the values of a metadata kind; a kind that is not set
    /// has no values.
    async fn get_metadata(&self, zone: &str, kind: &str) -> Result<Vec<String>, Error>;

    /// Replaces the values of a metadata kind. Setting no values
    /// removes the kind.
    async fn set_metadata(&self, zone: &str, kind: &str, values: &[String]) -> Result<(), Error>;

    async fn get_key(&self, name: &str) -> Result<ZoneKey, Error>;

    async fn create_key(&self, key: &ZoneKey) -> Result<(), Error>;

    async fn delete_key(&self, name: &str) -> Result<(), Error>;
}
