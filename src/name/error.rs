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

//! Implementation of the [`Error`] type for name-related errors.

use std::fmt;

/// An error type used to report invalid domain names, both in their
/// textual and on-the-wire forms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A label was empty (e.g. `a..b`).
    EmptyLabel,

    /// A label started or ended with a hyphen.
    HyphenAtEdge,

    /// A label contained a character other than a letter, digit, or
    /// hyphen.
    InvalidCharacter,

    /// An invalid pointer was encountered while parsing a compressed
    /// name.
    InvalidPointer,

    /// A label was longer than 63 octets.
    LabelTooLong,

    /// The name is longer than 253 characters (or 255 octets on the
    /// wire).
    NameTooLong,

    /// The string was empty.
    StrEmpty,

    /// The string was not strictly ASCII.
    StrNotAscii,

    /// The name has fewer than two labels.
    TooFewLabels,

    /// We unexpectedly encountered the end of the message while parsing
    /// the name.
    UnexpectedEom,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::EmptyLabel => f.write_str("name contains an empty label"),
            Self::HyphenAtEdge => f.write_str("label starts or ends with a hyphen"),
            Self::InvalidCharacter => {
                f.write_str("label contains characters other than letters, digits, and hyphens")
            }
            Self::InvalidPointer => f.write_str("invalid pointer"),
            Self::LabelTooLong => f.write_str("label is longer than 63 characters"),
            Self::NameTooLong => f.write_str("name is longer than 253 characters"),
            Self::StrEmpty => f.write_str("name is empty"),
            Self::StrNotAscii => f.write_str("string was not ASCII"),
            Self::TooFewLabels => f.write_str("name must have at least two labels"),
            Self::UnexpectedEom => f.write_str("unexpected end of message"),
        }
    }
}

impl std::error::Error for Error {}
