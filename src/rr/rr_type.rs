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

//! Provides the [`Type`] structure for DNS RR types.

use std::fmt;
use std::str::FromStr;

////////////////////////////////////////////////////////////////////////
// RR TYPES                                                           //
////////////////////////////////////////////////////////////////////////

/// Represents the RR type of a DNS record.
///
/// An RR type is represented on the wire as an unsigned 16-bit integer.
/// Hence this is basically a wrapper around `u16` with nice
/// [`Debug`](fmt::Debug), [`Display`](fmt::Display), and [`FromStr`]
/// implementations. Constants are provided for the types this crate
/// reads, writes, or filters out of zone transfers.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Type(u16);

impl Type {
    pub const A: Type = Type(1);
    pub const NS: Type = Type(2);
    pub const CNAME: Type = Type(5);
    pub const SOA: Type = Type(6);
    pub const PTR: Type = Type(12);
    pub const MX: Type = Type(15);
    pub const TXT: Type = Type(16);
    pub const SIG: Type = Type(24);
    pub const KEY: Type = Type(25);
    pub const AAAA: Type = Type(28);
    pub const SRV: Type = Type(33);
    pub const OPT: Type = Type(41);
    pub const RRSIG: Type = Type(46);
    pub const DNSKEY: Type = Type(48);
    pub const TSIG: Type = Type(250);
    pub const AXFR: Type = Type(252);
    pub const ANY: Type = Type(255);

    /// Returns whether records of this type are part of a zone's
    /// infrastructure (start of authority, signatures, and keys) rather
    /// than user data. Such records are dropped from zone transfers.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            Self::SOA | Self::SIG | Self::KEY | Self::RRSIG | Self::DNSKEY
        )
    }
}

impl From<u16> for Type {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Type> for u16 {
    fn from(rr_type: Type) -> Self {
        rr_type.0
    }
}

impl FromStr for Type {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "NS" => Ok(Self::NS),
            "CNAME" => Ok(Self::CNAME),
            "SOA" => Ok(Self::SOA),
            "PTR" => Ok(Self::PTR),
            "MX" => Ok(Self::MX),
            "TXT" => Ok(Self::TXT),
            "SIG" => Ok(Self::SIG),
            "KEY" => Ok(Self::KEY),
            "AAAA" => Ok(Self::AAAA),
            "SRV" => Ok(Self::SRV),
            "OPT" => Ok(Self::OPT),
            "RRSIG" => Ok(Self::RRSIG),
            "DNSKEY" => Ok(Self::DNSKEY),
            "TSIG" => Ok(Self::TSIG),
            "AXFR" => Ok(Self::AXFR),
            "ANY" => Ok(Self::ANY),
            _ => {
                if text
                    .get(0..4)
                    .map_or(false, |prefix| prefix.eq_ignore_ascii_case("TYPE"))
                {
                    text[4..]
                        .parse::<u16>()
                        .map(Self::from)
                        .or(Err("type value is not a valid unsigned 16-bit integer"))
                } else {
                    Err("unknown type")
                }
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::A => f.write_str("A"),
            Self::NS => f.write_str("NS"),
            Self::CNAME => f.write_str("CNAME"),
            Self::SOA => f.write_str("SOA"),
            Self::PTR => f.write_str("PTR"),
            Self::MX => f.write_str("MX"),
            Self::TXT => f.write_str("TXT"),
            Self::SIG => f.write_str("SIG"),
            Self::KEY => f.write_str("KEY"),
            Self::AAAA => f.write_str("AAAA"),
            Self::SRV => f.write_str("SRV"),
            Self::OPT => f.write_str("OPT"),
            Self::RRSIG => f.write_str("RRSIG"),
            Self::DNSKEY => f.write_str("DNSKEY"),
            Self::TSIG => f.write_str("TSIG"),
            Self::AXFR => f.write_str("AXFR"),
            Self::ANY => f.write_str("ANY"),
            Self(value) => write!(f, "TYPE{value}"), // RFC 3597 § 5
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_displays_according_to_rfc3597() {
        // TYPE65280 is from the private use range, so it should always
        // be unknown.
        let rr_type = Type::from(0xff00);
        assert_eq!(rr_type.to_string(), "TYPE65280");
    }

    #[test]
    fn type_parses_according_to_rfc3597() {
        let type_a: Type = "TYPE1".parse().unwrap();
        let type_rrsig: Type = "rrsig".parse().unwrap();
        assert_eq!(type_a, Type::A);
        assert_eq!(type_rrsig, Type::RRSIG);
    }

    #[test]
    fn type_mnemonics_parse_ignoring_case() {
        assert_eq!("txt".parse::<Type>(), Ok(Type::TXT));
        assert_eq!("Aaaa".parse::<Type>(), Ok(Type::AAAA));
        assert_eq!("type99".parse::<Type>(), Ok(Type::from(99)));
        assert!("bogus".parse::<Type>().is_err());
    }

    #[test]
    fn infrastructure_types_are_recognized() {
        for rr_type in [Type::SOA, Type::SIG, Type::KEY, Type::RRSIG, Type::DNSKEY] {
            assert!(rr_type.is_infrastructure());
        }
        for rr_type in [Type::A, Type::AAAA, Type::NS, Type::TXT, Type::from(99)] {
            assert!(!rr_type.is_infrastructure());
        }
    }
}
