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

//! Data structures and routines for handling DNS resource record data.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

use crate::name;

mod present;
mod rr_type;
pub use present::present_rdata;
pub use rr_type::Type;

////////////////////////////////////////////////////////////////////////
// TRANSFERRED RECORDS                                                //
////////////////////////////////////////////////////////////////////////

/// A record received in a zone transfer.
///
/// The owner `name` is relative to the zone, with the apex normalized
/// to `@`. The record data is in presentation format (see
/// [`present_rdata`]).
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub rr_type: Type,
    pub ttl: u32,
    pub data: String,
}

impl Serialize for Type {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

////////////////////////////////////////////////////////////////////////
// ADDRESS FAMILIES                                                   //
////////////////////////////////////////////////////////////////////////

/// The two address families, which determine whether an address is
/// published in an A or an AAAA record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Returns the family of `address`.
    pub fn of(address: IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Returns the RR type used for addresses of this family.
    pub fn rr_type(self) -> Type {
        match self {
            Self::V4 => Type::A,
            Self::V6 => Type::AAAA,
        }
    }
}

/// Serializes `address` as A or AAAA RDATA.
pub fn address_rdata(address: IpAddr) -> Vec<u8> {
    match address {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that RDATA could not be read or presented.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReadRdataError {
    InvalidName(name::Error),
    UnexpectedEom,
    Other,
}

impl fmt::Display for ReadRdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "invalid embedded domain name: {}", err),
            Self::UnexpectedEom => f.write_str("unexpected end of message in RDATA"),
            Self::Other => f.write_str("invalid RDATA"),
        }
    }
}

impl std::error::Error for ReadRdataError {}

impl From<name::Error> for ReadRdataError {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_family_selects_rr_type() {
        let v4: IpAddr = "192.0.2.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(AddressFamily::of(v4).rr_type(), Type::A);
        assert_eq!(AddressFamily::of(v6).rr_type(), Type::AAAA);
        assert_eq!(address_rdata(v4), [192, 0, 2, 1]);
        assert_eq!(address_rdata(v6).len(), 16);
    }

    #[test]
    fn records_serialize_with_textual_types() {
        let record = Record {
            name: String::from("www"),
            rr_type: Type::A,
            ttl: 60,
            data: String::from("192.0.2.1"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rr_type"], "A");
        assert_eq!(json["name"], "www");
    }
}
