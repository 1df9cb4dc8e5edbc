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

//! Implementation of the [`Error`] type for protocol exchanges.

use std::fmt;
use std::io;

use crate::message::tsig::VerificationError;
use crate::message::{reader, writer, Rcode};

/// An error arising from a DNS exchange performed by the
/// [`Client`](super::Client).
#[derive(Debug)]
pub enum Error {
    /// The request could not be serialized.
    Build(writer::Error),

    /// A network error occurred.
    Io(io::Error),

    /// The response could not be parsed.
    Malformed(reader::Error),

    /// The response was not a response to our request (wrong ID, QR
    /// bit not set, or a TSIG record out of place).
    Mismatched,

    /// The server answered with a non-success RCODE.
    Rcode(Rcode),

    /// The exchange did not complete within the timeout.
    Timeout,

    /// The server reported a TSIG error (BADSIG, BADKEY, or BADTIME).
    Tsig(Rcode),

    /// The response was not signed, though the request was.
    Unsigned,

    /// The response's TSIG record did not verify.
    Verification(VerificationError),
}

impl From<writer::Error> for Error {
    fn from(err: writer::Error) -> Self {
        Self::Build(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<reader::Error> for Error {
    fn from(err: reader::Error) -> Self {
        Self::Malformed(err)
    }
}

impl From<VerificationError> for Error {
    fn from(err: VerificationError) -> Self {
        Self::Verification(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Build(err) => write!(f, "failed to build request: {}", err),
            Self::Io(err) => write!(f, "network error: {}", err),
            Self::Malformed(err) => write!(f, "malformed response: {}", err),
            Self::Mismatched => f.write_str("response does not match the request"),
            Self::Rcode(rcode) => write!(f, "server responded with {}", rcode),
            Self::Timeout => f.write_str("timed out waiting for a response"),
            Self::Tsig(rcode) => write!(f, "server rejected our signature: {}", rcode),
            Self::Unsigned => f.write_str("response is not signed"),
            Self::Verification(err) => write!(f, "response signature did not verify: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Build(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Malformed(err) => Some(err),
            Self::Verification(err) => Some(err),
            _ => None,
        }
    }
}
