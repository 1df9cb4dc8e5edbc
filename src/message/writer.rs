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

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! messages.

use std::fmt;

use super::constants::*;
use super::tsig::{PreparedTsigRr, TsigKey, TsigMode};
use super::{Opcode, Rcode};
use crate::class::Class;
use crate::name::{self, to_wire};
use crate::rr::Type;

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// Serializes a DNS message into a growable buffer.
///
/// A `Writer` is constructed with [`Writer::new`], which writes a
/// header with the given ID and opcode and all other fields zeroed.
/// Header bits can be set at any time. Questions and resource records
/// are appended with [`Writer::add_question`] and [`Writer::add_rr`],
/// which must be called in section order (questions, answer RRs,
/// authority RRs, additional RRs); calls out of order fail with
/// [`Error::OutOfOrder`]. For dynamic updates ([RFC 2136 § 2]), the
/// sections are reused: the question section is the zone section, the
/// answer section holds prerequisites, and the authority section holds
/// the updates themselves.
///
/// Names are never compressed. This keeps the writer simple; the
/// messages this crate sends are small.
///
/// For messages with TSIG authentication, use [`Writer::set_tsig`]. The
/// TSIG record is then signed and appended as the last RR when
/// [`Writer::finish`] is called.
///
/// [RFC 2136 § 2]: https://datatracker.ietf.org/doc/html/rfc2136#section-2
pub struct Writer {
    octets: Vec<u8>,
    section: Section,
    counts: [u16; 4],
    tsig: Option<Tsig>,
}

/// The sections of a DNS message, in order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

/// The pending TSIG configuration of a [`Writer`].
struct Tsig {
    mode: TsigMode,
    rr: PreparedTsigRr,
    key: TsigKey,
}

impl Writer {
    /// Creates a new `Writer` for a message with the given ID and
    /// opcode.
    pub fn new(id: u16, opcode: Opcode) -> Self {
        let mut octets = vec![0; HEADER_SIZE];
        octets[ID_START..ID_END].copy_from_slice(&id.to_be_bytes());
        octets[OPCODE_BYTE] |= (u8::from(opcode) << OPCODE_SHIFT) & OPCODE_MASK;
        Self {
            octets,
            section: Section::Question,
            counts: [0; 4],
            tsig: None,
        }
    }

    /// Sets the QR (query response) bit.
    pub fn set_qr(&mut self, qr: bool) {
        self.set_bit(QR_BYTE, QR_MASK, qr);
    }

    /// Sets the AA (authoritative answer) bit.
    pub fn set_aa(&mut self, aa: bool) {
        self.set_bit(AA_BYTE, AA_MASK, aa);
    }

    /// Sets the TC (truncation) bit.
    pub fn set_tc(&mut self, tc: bool) {
        self.set_bit(TC_BYTE, TC_MASK, tc);
    }

    /// Sets the RD (recursion desired) bit.
    pub fn set_rd(&mut self, rd: bool) {
        self.set_bit(RD_BYTE, RD_MASK, rd);
    }

    fn set_bit(&mut self, byte: usize, mask: u8, value: bool) {
        if value {
            self.octets[byte] |= mask;
        } else {
            self.octets[byte] &= !mask;
        }
    }

    /// Sets the RCODE of the header. Only the low four bits of the
    /// code fit there.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        let raw = (u16::from(rcode) & RCODE_MASK as u16) as u8;
        self.octets[RCODE_BYTE] = (self.octets[RCODE_BYTE] & !RCODE_MASK) | raw;
    }

    /// Adds a question (for dynamic updates, the zone).
    pub fn add_question(&mut self, qname: &str, qtype: Type, qclass: Class) -> Result<()> {
        let qname = to_wire(qname)?;
        self.enter(Section::Question)?;
        self.octets.extend_from_slice(&qname);
        self.octets.extend_from_slice(&u16::from(qtype).to_be_bytes());
        self.octets.extend_from_slice(&u16::from(qclass).to_be_bytes());
        Ok(())
    }

    /// Adds a resource record to the given section. The section may
    /// not be [`Section::Question`].
    pub fn add_rr(
        &mut self,
        section: Section,
        owner: &str,
        rr_type: Type,
        class: Class,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<()> {
        if section == Section::Question {
            return Err(Error::OutOfOrder);
        }
        let rdlength = u16::try_from(rdata.len()).or(Err(Error::RdataTooLong))?;
        let owner = to_wire(owner)?;
        self.enter(section)?;
        self.octets.extend_from_slice(&owner);
        self.push_rr_fields(rr_type, class, ttl, rdlength, rdata);
        Ok(())
    }

    /// Checks that we can write to `section`, switches to it, and
    /// increments its count.
    fn enter(&mut self, section: Section) -> Result<()> {
        if section < self.section {
            return Err(Error::OutOfOrder);
        }
        let count = &mut self.counts[section as usize];
        *count = count.checked_add(1).ok_or(Error::TooManyRecords)?;
        self.section = section;
        Ok(())
    }

    fn push_rr_fields(
        &mut self,
        rr_type: Type,
        class: Class,
        ttl: u32,
        rdlength: u16,
        rdata: &[u8],
    ) {
        self.octets.extend_from_slice(&u16::from(rr_type).to_be_bytes());
        self.octets.extend_from_slice(&u16::from(class).to_be_bytes());
        self.octets.extend_from_slice(&ttl.to_be_bytes());
        self.octets.extend_from_slice(&rdlength.to_be_bytes());
        self.octets.extend_from_slice(rdata);
    }

    /// Configures TSIG signing of the message with `key`.
    pub fn set_tsig(&mut self, mode: TsigMode, rr: PreparedTsigRr, key: TsigKey) {
        self.tsig = Some(Tsig { mode, rr, key });
    }

    /// Returns the length of the message written so far (not counting
    /// any TSIG record yet to be added).
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether nothing but the header has been written.
    pub fn is_empty(&self) -> bool {
        self.counts == [0; 4]
    }

    /// Finishes the message, writing the section counts and, if
    /// configured, appending a signed TSIG record. Returns the message
    /// and the TSIG MAC (if any), which is needed to verify the
    /// response.
    pub fn finish(mut self) -> Result<(Vec<u8>, Option<Box<[u8]>>)> {
        let tsig_count = self.tsig.is_some() as u16;
        let arcount = self.counts[3]
            .checked_add(tsig_count)
            .ok_or(Error::TooManyRecords)?;
        for (index, count) in self.counts[..3].iter().chain([arcount].iter()).enumerate() {
            let start = COUNTS_START + 2 * index;
            self.octets[start..start + 2].copy_from_slice(&count.to_be_bytes());
        }

        let mac = if let Some(tsig) = self.tsig.take() {
            let (rdata, mac) = tsig.rr.sign(&tsig.mode, &self.octets, &tsig.key);
            let rdlength = u16::try_from(rdata.len()).or(Err(Error::RdataTooLong))?;
            self.octets.extend_from_slice(tsig.key.wire_name());
            self.push_rr_fields(Type::TSIG, Class::ANY, 0, rdlength, &rdata);
            Some(mac)
        } else {
            None
        };

        if self.octets.len() > MAX_MESSAGE_LEN {
            Err(Error::MessageTooLong)
        } else {
            Ok((self.octets, mac))
        }
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Writer")
            .field("len", &self.octets.len())
            .field("section", &self.section)
            .field("counts", &self.counts)
            .field("tsig", &self.tsig.as_ref().map(|t| &t.mode))
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Writer`] operation failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A name could not be serialized.
    InvalidName(name::Error),

    /// The message would be longer than 65,535 octets.
    MessageTooLong,

    /// Sections were written out of order.
    OutOfOrder,

    /// RDATA was longer than 65,535 octets.
    RdataTooLong,

    /// A section would hold more than 65,535 entries.
    TooManyRecords,
}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "invalid name: {}", err),
            Self::MessageTooLong => f.write_str("message is too long"),
            Self::OutOfOrder => f.write_str("message sections written out of order"),
            Self::RdataTooLong => f.write_str("RDATA is too long"),
            Self::TooManyRecords => f.write_str("too many records in a section"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Writer`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
