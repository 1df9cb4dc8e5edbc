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

//! The crate-wide error taxonomy.
//!
//! Each component has its own error type. At the service boundary they
//! are folded into [`Error`], whose [`status`](Error::status) tells
//! the request layer how to answer.

use std::fmt;

use crate::{api, client, name, policy, store, zone};

/// An error returned by the [`service`](crate::service) operations.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The request was malformed: a bad domain name, rule pattern, or
    /// target-user filter.
    InvalidInput(String),

    /// The policy does not allow the request.
    Forbidden,

    /// The zone (or rule) already exists.
    Conflict,

    /// The zone (or rule) does not exist, or is not visible to the
    /// requester.
    NotFound,

    /// The authoritative server, the DNS exchange, or the policy
    /// webhook failed.
    Upstream(String),

    /// The store or the policy script failed.
    Internal(String),
}

/// The classification of an [`Error`] handed to the request layer. No
/// two error kinds share a status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    BadRequest,
    Forbidden,
    Conflict,
    NotFound,
    BadGateway,
    Internal,
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidInput(_) => Status::BadRequest,
            Self::Forbidden => Status::Forbidden,
            Self::Conflict => Status::Conflict,
            Self::NotFound => Status::NotFound,
            Self::Upstream(_) => Status::BadGateway,
            Self::Internal(_) => Status::Internal,
        }
    }
}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        Self::InvalidInput(format!("invalid domain name: {}", err))
    }
}

impl From<zone::Error> for Error {
    fn from(err: zone::Error) -> Self {
        match err {
            zone::Error::NotFound | zone::Error::Api(api::Error::NotFound) => Self::NotFound,
            zone::Error::Api(api::Error::Conflict) => Self::Conflict,
            err @ zone::Error::NoDelegationChain { .. } => Self::InvalidInput(err.to_string()),
            err => Self::Upstream(err.to_string()),
        }
    }
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        match err {
            store::Error::NotFound => Self::NotFound,
            store::Error::Conflict => Self::Conflict,
            err @ store::Error::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<policy::Error> for Error {
    fn from(err: policy::Error) -> Self {
        match err {
            policy::Error::InvalidRule(reason) => Self::InvalidInput(reason),
            err @ policy::Error::Script(_) => Self::Internal(err.to_string()),
            err => Self::Upstream(err.to_string()),
        }
    }
}

impl From<client::Error> for Error {
    fn from(err: client::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            Self::Forbidden => f.write_str("forbidden by policy"),
            Self::Conflict => f.write_str("already exists"),
            Self::NotFound => f.write_str("not found"),
            Self::Upstream(reason) => write!(f, "upstream failure: {}", reason),
            Self::Internal(reason) => write!(f, "internal error: {}", reason),
        }
    }
}

impl std::error::Error for Error {}
