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

//! Implementation of the [`Error`] type for zone management.

use std::fmt;

use crate::api;

/// Errors that arise during operations of the
/// [`ZoneManager`](super::ZoneManager).
#[derive(Debug)]
pub enum Error {
    /// A management API call failed.
    Api(api::Error),

    /// The zone exists but is unusable: it has no user keys, or one of
    /// its keys is missing or incomplete.
    Invalid { zone: String, reason: &'static str },

    /// The zone is not a subdomain of the authority it was requested
    /// under, so there is no delegation chain to it.
    NoDelegationChain { zone: String, authority: String },

    /// The zone does not exist.
    NotFound,
}

impl From<api::Error> for Error {
    fn from(err: api::Error) -> Self {
        match err {
            api::Error::NotFound => Self::NotFound,
            err => Self::Api(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Api(err) => write!(f, "management API call failed: {}", err),
            Self::Invalid { zone, reason } => write!(f, "zone {} is invalid: {}", zone, reason),
            Self::NoDelegationChain { zone, authority } => {
                write!(f, "{} is not within {}", zone, authority)
            }
            Self::NotFound => f.write_str("zone not found"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
