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

//! Implementation of the [`Reader`] type to read on-the-wire DNS
//! messages.

use std::fmt;

use super::constants::*;
use super::{Opcode, Rcode};
use crate::class::Class;
use crate::name::{self, decompress, to_text, WireName};
use crate::rr::{present_rdata, ReadRdataError, Type};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// Header fields can be read at any time. Questions and RRs are read
/// with [`Reader::read_question`] and [`Reader::read_rr`], which use a
/// cursor initially set to the first octet after the header. They must
/// be called sequentially, in the order the data appear in the message.
#[derive(Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.octets[ID_START], self.octets[ID_START + 1]])
    }

    /// Returns whether the QR (query response) bit is set.
    pub fn qr(&self) -> bool {
        (self.octets[QR_BYTE] & QR_MASK) != 0
    }

    /// Returns the message's opcode.
    pub fn opcode(&self) -> Opcode {
        Opcode::from((self.octets[OPCODE_BYTE] & OPCODE_MASK) >> OPCODE_SHIFT)
    }

    /// Returns whether the AA (authoritative answer) bit is set.
    pub fn aa(&self) -> bool {
        (self.octets[AA_BYTE] & AA_MASK) != 0
    }

    /// Returns whether the TC (truncation) bit is set.
    pub fn tc(&self) -> bool {
        (self.octets[TC_BYTE] & TC_MASK) != 0
    }

    /// Returns whether the RD (recursion desired) bit is set.
    pub fn rd(&self) -> bool {
        (self.octets[RD_BYTE] & RD_MASK) != 0
    }

    /// Returns the RCODE of the message header.
    pub fn rcode(&self) -> Rcode {
        Rcode::from((self.octets[RCODE_BYTE] & RCODE_MASK) as u16)
    }

    /// Returns the number of questions in the message. (For dynamic
    /// updates, this is the zone count.)
    pub fn qdcount(&self) -> u16 {
        self.count(0)
    }

    /// Returns the number of answers in the message. (For dynamic
    /// updates, this is the prerequisite count.)
    pub fn ancount(&self) -> u16 {
        self.count(1)
    }

    /// Returns the number of authority records in the message. (For
    /// dynamic updates, this is the update count.)
    pub fn nscount(&self) -> u16 {
        self.count(2)
    }

    /// Returns the number of additional records in the message.
    pub fn arcount(&self) -> u16 {
        self.count(3)
    }

    fn count(&self, index: usize) -> u16 {
        let start = COUNTS_START + 2 * index;
        u16::from_be_bytes([self.octets[start], self.octets[start + 1]])
    }

    /// Reads a [`Question`] starting at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_question(&mut self) -> Result<Question> {
        let (qname, qname_len) = decompress(self.octets, self.cursor).map_err(Error::InvalidOwner)?;
        let qname_end = self.cursor + qname_len;
        let qtype = read_u16(self.octets, qname_end)?.into();
        let qclass = read_u16(self.octets, qname_end + 2)?.into();
        self.cursor = qname_end + 4;
        Ok(Question {
            qname,
            qtype,
            qclass,
        })
    }

    /// Reads a resource record at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure. The RDATA is not interpreted; see
    /// [`Reader::present_rdata`].
    pub fn read_rr(&mut self) -> Result<ReadRr<'a>> {
        let (owner, owner_len) = decompress(self.octets, self.cursor).map_err(Error::InvalidOwner)?;
        let owner_end = self.cursor + owner_len;
        let rr_type = read_u16(self.octets, owner_end)?.into();
        let class = read_u16(self.octets, owner_end + 2)?.into();
        let ttl = read_u32(self.octets, owner_end + 4)?;
        let rdlength = read_u16(self.octets, owner_end + 8)? as usize;
        let rdata_start = owner_end + 10;
        let rdata = self
            .octets
            .get(rdata_start..rdata_start + rdlength)
            .ok_or(Error::UnexpectedEomInField)?;
        let start = self.cursor;
        self.cursor = rdata_start + rdlength;
        Ok(ReadRr {
            start,
            owner,
            rr_type,
            class,
            ttl,
            rdata_start,
            rdata,
        })
    }

    /// Presents the RDATA of `rr`, which must have been read from this
    /// message, in textual form.
    pub fn present_rdata(&self, rr: &ReadRr) -> Result<String> {
        present_rdata(self.octets, rr.rdata_start, rr.rdata.len(), rr.rr_type).map_err(Into::into)
    }

    /// Returns the message up to (but not including) the cursor.
    pub fn message_to_cursor(&self) -> &'a [u8] {
        &self.octets[..self.cursor]
    }

    /// Returns the whole underlying message.
    pub fn message(&self) -> &'a [u8] {
        self.octets
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        if octets.len() >= HEADER_SIZE {
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
            })
        } else {
            Err(Error::HeaderTooShort)
        }
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("tc", &self.tc())
            .field("rcode", &self.rcode())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Reads a network-byte-order `u16` at `index` of `octets`.
fn read_u16(octets: &[u8], index: usize) -> Result<u16> {
    octets
        .get(index..index + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(Error::UnexpectedEomInField)
}

/// Reads a network-byte-order `u32` at `index` of `octets`.
fn read_u32(octets: &[u8], index: usize) -> Result<u32> {
    octets
        .get(index..index + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(Error::UnexpectedEomInField)
}

////////////////////////////////////////////////////////////////////////
// QUESTIONS AND READ RRS                                             //
////////////////////////////////////////////////////////////////////////

/// A question read by [`Reader::read_question`]. The name is in
/// lower-cased, uncompressed on-the-wire form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub qname: WireName,
    pub qtype: Type,
    pub qclass: Class,
}

/// A structure containing RR data as returned by [`Reader::read_rr`].
///
/// The owner is lower-cased and decompressed; the RDATA is borrowed
/// from the message as-is (so embedded names may still be compressed).
/// `start` is the index of the RR in the message, which is where the
/// signed part of a message ends when this RR is its TSIG record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRr<'a> {
    pub start: usize,
    pub owner: WireName,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: u32,
    pub rdata_start: usize,
    pub rdata: &'a [u8],
}

impl ReadRr<'_> {
    /// Returns the owner in textual form, without a trailing dot.
    pub fn owner_text(&self) -> String {
        to_text(&self.owner)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Question`] or resource record could not
/// be read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    HeaderTooShort,
    UnexpectedEomInField,
    InvalidOwner(name::Error),
    InvalidRdata(ReadRdataError),
}

impl From<ReadRdataError> for Error {
    fn from(err: ReadRdataError) -> Self {
        Self::InvalidRdata(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEomInField => f.write_str("unexpected end of message in field"),
            Self::InvalidOwner(err) => write!(f, "invalid owner: {}", err),
            Self::InvalidRdata(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Reader`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// This is a reply to a query for example.com. IN NS to a recursive
    /// server, made on January 7, 2022.
    const EXAMPLE_COM_NS_MESSAGE: &[u8] =
        b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01\x07\x65\x78\x61\
          \x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\x00\x02\x00\x01\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x14\x01\x61\x0c\x69\x61\x6e\x61\
          \x2d\x73\x65\x72\x76\x65\x72\x73\x03\x6e\x65\x74\x00\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x04\x01\x62\xc0\x2b\x00\x00\x29\
          \x10\x00\x00\x00\x00\x00\x00\x00";

    #[test]
    fn reader_works() {
        let mut reader = Reader::try_from(EXAMPLE_COM_NS_MESSAGE).unwrap();

        assert_eq!(reader.id(), 0xe2d7);
        assert!(reader.qr());
        assert_eq!(reader.opcode(), Opcode::Query);
        assert!(!reader.tc());
        assert!(reader.rd());
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 2);
        assert_eq!(reader.nscount(), 0);
        assert_eq!(reader.arcount(), 1);

        let question = reader.read_question().unwrap();
        assert_eq!(to_text(&question.qname), "example.com");
        assert_eq!(question.qtype, Type::NS);
        assert_eq!(question.qclass, Class::IN);

        let answer_1 = reader.read_rr().unwrap();
        assert_eq!(answer_1.owner_text(), "example.com");
        assert_eq!(answer_1.rr_type, Type::NS);
        assert_eq!(answer_1.ttl, 86178);
        assert_eq!(
            reader.present_rdata(&answer_1).unwrap(),
            "a.iana-servers.net.",
        );
        let answer_2 = reader.read_rr().unwrap();
        assert_eq!(
            reader.present_rdata(&answer_2).unwrap(),
            "b.iana-servers.net.",
        );

        let opt = reader.read_rr().unwrap();
        assert_eq!(opt.owner.as_slice(), b"\x00");
        assert_eq!(opt.rr_type, Type::OPT);
        assert_eq!(opt.class, Class::from(4096));
        assert!(opt.rdata.is_empty());
        assert_eq!(opt.start, reader.message().len() - 11);

        assert!(reader.at_eom());
    }

    #[test]
    fn reader_constructor_rejects_short_message() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Reader::try_from(buf.as_slice()), Err(Error::HeaderTooShort));
        }
    }

    #[test]
    fn read_rr_is_atomic_on_truncation() {
        let truncated = &EXAMPLE_COM_NS_MESSAGE[..40];
        let mut reader = Reader::try_from(truncated).unwrap();
        reader.read_question().unwrap();
        let before = reader.message_to_cursor().len();
        assert_eq!(reader.read_rr(), Err(Error::UnexpectedEomInField));
        assert_eq!(reader.message_to_cursor().len(), before);
    }
}
