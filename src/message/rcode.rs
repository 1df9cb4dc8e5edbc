// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of the [`Rcode`] type.

use std::fmt;

/// A response code, either from the four-bit RCODE field of the DNS
/// message header or from the 16-bit error field of a TSIG record.
///
/// The names are those listed by the IANA. The TSIG-specific codes
/// (`BadSig`, `BadKey`, `BadTime`, and `BadTrunc`) only ever appear in
/// TSIG records ([RFC 8945 § 3]).
///
/// [RFC 8945 § 3]: https://datatracker.ietf.org/doc/html/rfc8945#section-3
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Rcode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    YxDomain,
    YxRrset,
    NxRrset,
    NotAuth,
    NotZone,
    BadSig,
    BadKey,
    BadTime,
    BadTrunc,
    Unassigned(u16),
}

impl Rcode {
    /// Returns whether this code indicates success.
    pub fn is_success(self) -> bool {
        self == Self::NoError
    }
}

impl From<u16> for Rcode {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormErr,
            2 => Self::ServFail,
            3 => Self::NxDomain,
            4 => Self::NotImp,
            5 => Self::Refused,
            6 => Self::YxDomain,
            7 => Self::YxRrset,
            8 => Self::NxRrset,
            9 => Self::NotAuth,
            10 => Self::NotZone,
            16 => Self::BadSig,
            17 => Self::BadKey,
            18 => Self::BadTime,
            22 => Self::BadTrunc,
            other => Self::Unassigned(other),
        }
    }
}

impl From<Rcode> for u16 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NxDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::YxDomain => 6,
            Rcode::YxRrset => 7,
            Rcode::NxRrset => 8,
            Rcode::NotAuth => 9,
            Rcode::NotZone => 10,
            Rcode::BadSig => 16,
            Rcode::BadKey => 17,
            Rcode::BadTime => 18,
            Rcode::BadTrunc => 22,
            Rcode::Unassigned(v) => v,
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoError => f.write_str("NOERROR"),
            Self::FormErr => f.write_str("FORMERR"),
            Self::ServFail => f.write_str("SERVFAIL"),
            Self::NxDomain => f.write_str("NXDOMAIN"),
            Self::NotImp => f.write_str("NOTIMP"),
            Self::Refused => f.write_str("REFUSED"),
            Self::YxDomain => f.write_str("YXDOMAIN"),
            Self::YxRrset => f.write_str("YXRRSET"),
            Self::NxRrset => f.write_str("NXRRSET"),
            Self::NotAuth => f.write_str("NOTAUTH"),
            Self::NotZone => f.write_str("NOTZONE"),
            Self::BadSig => f.write_str("BADSIG"),
            Self::BadKey => f.write_str("BADKEY"),
            Self::BadTime => f.write_str("BADTIME"),
            Self::BadTrunc => f.write_str("BADTRUNC"),
            Self::Unassigned(value) => write!(f, "RCODE{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Rcode;

    #[test]
    fn rcode_conversions_agree() {
        for value in [0, 1, 5, 9, 16, 17, 18, 22, 4095] {
            assert_eq!(u16::from(Rcode::from(value)), value);
        }
        assert_eq!(Rcode::from(18), Rcode::BadTime);
        assert_eq!(Rcode::from(9).to_string(), "NOTAUTH");
    }
}
