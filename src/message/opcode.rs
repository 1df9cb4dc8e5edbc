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

//! Implementation of the [`Opcode`] type.

use std::fmt;

/// The opcode value of the DNS message header.
///
/// [RFC 1035 § 4.1.1] defines the opcode field as a four-bit field
/// indicating the kind of request being made in the message. This
/// crate only ever sends standard queries and dynamic updates
/// ([RFC 2136 § 2.2]); other values are carried as `Unassigned` so
/// that responses can still be read.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
/// [RFC 2136 § 2.2]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.2
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Opcode {
    Query,
    Notify,
    Update,
    Unassigned(u8),
}

impl From<u8> for Opcode {
    /// Converts the low four bits of `value` into an opcode.
    fn from(value: u8) -> Self {
        match value & 0xf {
            0 => Self::Query,
            4 => Self::Notify,
            5 => Self::Update,
            other => Self::Unassigned(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Unassigned(v) => v & 0xf,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Query => f.write_str("QUERY"),
            Self::Notify => f.write_str("NOTIFY"),
            Self::Update => f.write_str("UPDATE"),
            Self::Unassigned(value) => write!(f, "OPCODE{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Opcode;

    #[test]
    fn opcode_conversions_agree() {
        for value in 0..16 {
            assert_eq!(u8::from(Opcode::from(value)), value);
        }
        assert_eq!(Opcode::from(5), Opcode::Update);
        assert_eq!(Opcode::Update.to_string(), "UPDATE");
    }
}
