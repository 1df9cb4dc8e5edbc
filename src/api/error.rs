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

//! Implementation of the [`Error`] type for management API calls.

use std::fmt;

/// An error returned by an [`Authoritative`](super::Authoritative)
/// implementation.
#[derive(Debug)]
pub enum Error {
    /// The zone or key does not exist.
    NotFound,

    /// The zone or key already exists.
    Conflict,

    /// The server rejected the request.
    Rejected { status: u16, message: String },

    /// The request could not be made, or its response could not be
    /// read.
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Conflict => f.write_str("already exists"),
            Self::Rejected { status, message } if message.is_empty() => {
                write!(f, "request rejected with status {}", status)
            }
            Self::Rejected { status, message } => {
                write!(f, "request rejected with status {}: {}", status, message)
            }
            Self::Transport(err) => write!(f, "request failed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}
