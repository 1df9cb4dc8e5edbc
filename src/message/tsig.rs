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

//! Implementation of Secret Key Authentication for DNS (TSIG), as
//! specified by [RFC 8945].
//!
//! This module implements two basic actions: verification and signing
//! of messages using the TSIG pseudo-RR.
//!
//! For verification, read the TSIG RR from a message using a
//! [`Reader`](super::Reader) and convert the returned
//! [`ReadRr`](super::ReadRr) into a [`ReadTsigRr`] using
//! [`ReadTsigRr::try_from`]. Then use the [`ReadTsigRr`] `verify_*`
//! methods.
//!
//! For signing, call [`Writer::set_tsig`](super::Writer::set_tsig) with
//! a [`TsigMode`] and a [`PreparedTsigRr`]. The TSIG RR is appended and
//! signed when the message is finished.
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::digest::{MacError, OutputSizeUser};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use sha1::Sha1;
use sha2::Sha256;

use super::constants::*;
use super::reader::ReadRr;
use super::Rcode;
use crate::class::Class;
use crate::name::{self, decompress, to_wire, WireName};
use crate::rr::Type;

/// The fudge (permitted clock skew, in seconds) this crate signs with.
pub const DEFAULT_FUDGE: u16 = 300;

/// The largest value of the 48-bit time signed field.
const MAX_TIME_SIGNED: u64 = (1 << 48) - 1;

////////////////////////////////////////////////////////////////////////
// TSIG ALGORITHMS                                                    //
////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref HMAC_SHA1_NAME: WireName = to_wire("hmac-sha1.").unwrap();
    static ref HMAC_SHA256_NAME: WireName = to_wire("hmac-sha256.").unwrap();
}

/// A supported TSIG algorithm.
///
/// We implement the two algorithms required by [RFC 8945 § 6]:
/// HMAC-SHA1 and HMAC-SHA256.
///
/// [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    HmacSha1,
    HmacSha256,
}

impl Algorithm {
    /// Returns the name assigned (by [RFC 8945 § 6]) to identify this
    /// algorithm, without the trailing dot. This is also how the
    /// authoritative server's management API names algorithms.
    ///
    /// [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6
    pub fn name(&self) -> &'static str {
        match self {
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacSha256 => "hmac-sha256",
        }
    }

    /// Returns the on-the-wire form of the algorithm's name.
    fn wire_name(&self) -> &'static WireName {
        match self {
            Self::HmacSha1 => &HMAC_SHA1_NAME,
            Self::HmacSha256 => &HMAC_SHA256_NAME,
        }
    }

    /// Returns the size of the MAC produced by this algorithm.
    pub fn output_size(&self) -> usize {
        match self {
            Self::HmacSha1 => Hmac::<Sha1>::output_size(),
            Self::HmacSha256 => Hmac::<Sha256>::output_size(),
        }
    }

    /// Creates a MAC authenticator to compute a MAC with this algorithm
    /// and the given key.
    fn make_authenticator(&self, key: &[u8]) -> Box<dyn Authenticator> {
        // HMAC accepts keys of any length, so these cannot fail.
        match self {
            Algorithm::HmacSha1 => Box::new(Hmac::<Sha1>::new_from_slice(key).unwrap()),
            Algorithm::HmacSha256 => Box::new(Hmac::<Sha256>::new_from_slice(key).unwrap()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match name::trim_root(text).to_ascii_lowercase().as_str() {
            "hmac-sha1" => Ok(Self::HmacSha1),
            "hmac-sha256" => Ok(Self::HmacSha256),
            _ => Err("unsupported TSIG algorithm"),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

////////////////////////////////////////////////////////////////////////
// KEYS                                                               //
////////////////////////////////////////////////////////////////////////

/// A shared-secret key: a name, an algorithm, and the secret itself.
#[derive(Clone, Eq, PartialEq)]
pub struct TsigKey {
    name: WireName,
    algorithm: Algorithm,
    secret: Vec<u8>,
}

impl TsigKey {
    /// Creates a key from its parts.
    pub fn new(name: &str, algorithm: Algorithm, secret: Vec<u8>) -> Result<Self, KeyError> {
        Ok(Self {
            name: to_wire(name).map_err(KeyError::InvalidName)?,
            algorithm,
            secret,
        })
    }

    /// Creates a key from the textual forms used by the authoritative
    /// server's management API: an algorithm name such as
    /// `hmac-sha256` and a base64-encoded secret.
    pub fn from_base64(name: &str, algorithm: &str, secret: &str) -> Result<Self, KeyError> {
        let algorithm = algorithm.parse().or(Err(KeyError::UnsupportedAlgorithm))?;
        let secret = BASE64
            .decode(secret.trim())
            .or(Err(KeyError::InvalidSecret))?;
        Self::new(name, algorithm, secret)
    }

    /// Returns the key's name in on-the-wire form.
    pub fn wire_name(&self) -> &WireName {
        &self.name
    }

    /// Returns the key's algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the secret.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &name::to_text(&self.name))
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TSIG SIGNING AND VERIFICATION HELPERS                              //
////////////////////////////////////////////////////////////////////////

/// An abstraction over different MAC implementations. Basically, this
/// wraps the `digest` crate's [`Mac`] trait to give us an object-safe
/// trait (so that we can use `Box<dyn Authenticator>`).
trait Authenticator {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Box<[u8]>;
    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> Result<(), MacError>;
}

impl<M> Authenticator for M
where
    M: Mac,
{
    fn update(&mut self, data: &[u8]) {
        <Self as Mac>::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Box<[u8]> {
        <Self as Mac>::finalize(*self)
            .into_bytes()
            .to_vec()
            .into_boxed_slice()
    }

    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> Result<(), MacError> {
        <Self as Mac>::verify_truncated_left(*self, tag)
    }
}

/// The TSIG variables that, per [RFC 8945 § 4.3.3], must be added to
/// the MAC. Both the verification and the signing code fill these in.
///
/// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
struct Variables<'v> {
    key_name: &'v [u8],
    algorithm: &'v [u8],
    time_signed: u64,
    fudge: u16,
    error: Rcode,
    other: &'v [u8],
}

/// The digest components that come before the message itself.
enum Prefix<'p> {
    /// A request: nothing precedes the message.
    None,

    /// A response, or a subsequent message of a multi-message response:
    /// the prior MAC precedes the message.
    Mac(&'p [u8]),
}

/// Adds the given message to a MAC, decrementing the ARCOUNT and
/// restoring the original message ID first (in accordance with
/// [RFC 8945 § 4.3.2]). The message must be at least a full header
/// long and its ARCOUNT must include the TSIG RR.
///
/// [RFC 8945 § 4.3.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.2
fn add_modified_message(authenticator: &mut dyn Authenticator, message: &[u8], original_id: u16) {
    authenticator.update(&original_id.to_be_bytes());
    authenticator.update(&message[ID_END..ARCOUNT_START]);
    let arcount = u16::from_be_bytes([message[ARCOUNT_START], message[ARCOUNT_START + 1]]);
    authenticator.update(&arcount.saturating_sub(1).to_be_bytes());
    authenticator.update(&message[ARCOUNT_END..]);
}

fn add_prefix(authenticator: &mut dyn Authenticator, prefix: &Prefix) {
    if let Prefix::Mac(mac) = prefix {
        authenticator.update(&(mac.len() as u16).to_be_bytes());
        authenticator.update(mac);
    }
}

/// Adds the TSIG variables specified by [RFC 8945 § 4.3.3] to a MAC.
///
/// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
fn add_tsig_variables(authenticator: &mut dyn Authenticator, vars: &Variables) {
    authenticator.update(vars.key_name);
    // Class ANY and a TTL of zero.
    authenticator.update(b"\x00\xff\x00\x00\x00\x00");
    authenticator.update(vars.algorithm);
    add_tsig_timers(authenticator, vars);
    authenticator.update(&u16::from(vars.error).to_be_bytes());
    authenticator.update(&(vars.other.len() as u16).to_be_bytes());
    authenticator.update(vars.other);
}

/// Adds the TSIG timers specified by [RFC 8945 § 4.3.3.1] to a MAC.
///
/// [RFC 8945 § 4.3.3.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3.1
fn add_tsig_timers(authenticator: &mut dyn Authenticator, vars: &Variables) {
    authenticator.update(&time_signed_octets(vars.time_signed));
    authenticator.update(&vars.fudge.to_be_bytes());
}

/// Serializes a Unix time into the 48-bit time signed field.
fn time_signed_octets(time: u64) -> [u8; 6] {
    let octets = time.min(MAX_TIME_SIGNED).to_be_bytes();
    [
        octets[2], octets[3], octets[4], octets[5], octets[6], octets[7],
    ]
}

////////////////////////////////////////////////////////////////////////
// TSIG READING/VERIFICATION                                          //
////////////////////////////////////////////////////////////////////////

/// A TSIG RR that has been read from a message.
///
/// A [`ReadTsigRr`] is produced by converting a [`ReadRr`] obtained
/// from a [`Reader`](super::Reader) with [`ReadTsigRr::try_from`]. It
/// provides access to the TSIG fields and implements TSIG verification
/// through its `verify_*` methods.
#[derive(Clone)]
pub struct ReadTsigRr<'a> {
    key_name: WireName,
    algorithm: WireName,
    time_signed: u64,
    fudge: u16,
    mac: &'a [u8],
    original_id: u16,
    error: Rcode,
    other: &'a [u8],
}

impl<'a> TryFrom<ReadRr<'a>> for ReadTsigRr<'a> {
    type Error = FromReadRrError;

    fn try_from(rr: ReadRr<'a>) -> Result<Self, Self::Error> {
        if rr.rr_type != Type::TSIG {
            return Err(FromReadRrError::NotTsig);
        } else if rr.class != Class::ANY || rr.ttl != 0 {
            return Err(FromReadRrError::FormErr);
        }

        // The algorithm name must not be compressed, so it is read from
        // the RDATA alone.
        let rdata = rr.rdata;
        let (algorithm, algo_len) = decompress(rdata, 0).or(Err(FromReadRrError::FormErr))?;
        let field = move |start: usize, len: usize| {
            rdata
                .get(algo_len + start..algo_len + start + len)
                .ok_or(FromReadRrError::FormErr)
        };
        let read_u16 =
            move |start: usize| field(start, 2).map(|b| u16::from_be_bytes([b[0], b[1]]));

        let time = field(0, 6)?;
        let time_signed = time
            .iter()
            .fold(0u64, |acc, &octet| (acc << 8) | octet as u64);
        let fudge = read_u16(6)?;
        let mac_size = read_u16(8)? as usize;
        let mac = field(10, mac_size)?;
        let original_id = read_u16(10 + mac_size)?;
        let error = Rcode::from(read_u16(12 + mac_size)?);
        let other_len = read_u16(14 + mac_size)? as usize;
        let other = field(16 + mac_size, other_len)?;
        if algo_len + 16 + mac_size + other_len != rdata.len() {
            return Err(FromReadRrError::FormErr);
        }

        Ok(Self {
            key_name: rr.owner,
            algorithm,
            time_signed,
            fudge,
            mac,
            original_id,
            error,
            other,
        })
    }
}

impl ReadTsigRr<'_> {
    /// Returns the key name specified by the TSIG RR, in on-the-wire
    /// form.
    pub fn key_name(&self) -> &WireName {
        &self.key_name
    }

    /// Returns the algorithm name specified by the TSIG RR, in
    /// on-the-wire form.
    pub fn algorithm(&self) -> &WireName {
        &self.algorithm
    }

    /// Returns the time at which the TSIG RR was signed, as a Unix
    /// time.
    pub fn time_signed(&self) -> u64 {
        self.time_signed
    }

    /// Returns the fudge field (in seconds) of the TSIG RR.
    pub fn fudge(&self) -> u16 {
        self.fudge
    }

    /// Returns the MAC of the TSIG RR.
    pub fn mac(&self) -> &[u8] {
        self.mac
    }

    /// Returns the original message ID of the TSIG RR.
    pub fn original_id(&self) -> u16 {
        self.original_id
    }

    /// Returns the error field of the TSIG RR.
    pub fn error(&self) -> Rcode {
        self.error
    }

    /// Returns the "other data" field of the TSIG RR.
    pub fn other(&self) -> &[u8] {
        self.other
    }

    /// Verifies the given request message.
    ///
    /// The passed buffer should be the message up to (but not
    /// including) the TSIG RR. It is not required to decrement the
    /// message ARCOUNT or to reset its message ID to the original ID in
    /// the TSIG RR; this method does this for you.
    pub fn verify_request(
        &self,
        message: &[u8],
        key: &TsigKey,
        now: u64,
    ) -> Result<(), VerificationError> {
        self.verification_core(Prefix::None, &[], message, key, now, true)
    }

    /// Verifies the given response message, which answers a request
    /// signed with `request_mac`.
    pub fn verify_response(
        &self,
        message: &[u8],
        request_mac: &[u8],
        key: &TsigKey,
        now: u64,
    ) -> Result<(), VerificationError> {
        self.verification_core(Prefix::Mac(request_mac), &[], message, key, now, true)
    }

    /// Verifies a subsequent message of a multi-message response (e.g.
    /// a zone transfer), per [RFC 8945 § 5.3.1]. `prior_mac` is the MAC
    /// of the last signed message, and `unsigned` is the concatenation
    /// of any unsigned messages received since.
    ///
    /// [RFC 8945 § 5.3.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.3.1
    pub fn verify_subsequent(
        &self,
        unsigned: &[u8],
        message: &[u8],
        prior_mac: &[u8],
        key: &TsigKey,
        now: u64,
    ) -> Result<(), VerificationError> {
        self.verification_core(Prefix::Mac(prior_mac), unsigned, message, key, now, false)
    }

    /// The internal core implementation of TSIG message verification.
    fn verification_core(
        &self,
        prefix: Prefix,
        unsigned: &[u8],
        message: &[u8],
        key: &TsigKey,
        now: u64,
        full_variables: bool,
    ) -> Result<(), VerificationError> {
        if message.len() < HEADER_SIZE {
            return Err(VerificationError::FormErr);
        }

        // RFC 8945 § 5.2.1: the key and algorithm must be the ones we
        // expect.
        if self.key_name != key.name || &self.algorithm != key.algorithm.wire_name() {
            return Err(VerificationError::BadKey);
        }

        // Ensure that any MAC truncation applied meets RFC 8945
        // § 5.2.2.1's minimum requirements.
        check_mac_size(key.algorithm, self.mac.len())?;

        // RFC 8945 § 5.2.2: verify the MAC.
        let mut authenticator = key.algorithm.make_authenticator(&key.secret);
        add_prefix(authenticator.as_mut(), &prefix);
        authenticator.update(unsigned);
        add_modified_message(authenticator.as_mut(), message, self.original_id);
        let vars = self.variables();
        if full_variables {
            add_tsig_variables(authenticator.as_mut(), &vars);
        } else {
            add_tsig_timers(authenticator.as_mut(), &vars);
        }
        authenticator
            .verify_truncated_left(self.mac)
            .or(Err(VerificationError::BadSig))?;

        // RFC 8945 § 5.2.3: ensure that the time signed is close enough
        // to our time.
        check_time(self.time_signed, self.fudge, now)
    }

    fn variables(&self) -> Variables {
        Variables {
            key_name: &self.key_name,
            algorithm: &self.algorithm,
            time_signed: self.time_signed,
            fudge: self.fudge,
            error: self.error,
            other: self.other,
        }
    }
}

/// Ensures that the MAC size is acceptable, per [RFC 8945 § 5.2.2.1].
///
/// [RFC 8945 § 5.2.2.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.2.1
fn check_mac_size(algorithm: Algorithm, mac_size: usize) -> Result<(), VerificationError> {
    let half_output_size = (algorithm.output_size() + 1) / 2;
    if mac_size > algorithm.output_size() || mac_size < 10.max(half_output_size) {
        Err(VerificationError::FormErr)
    } else {
        Ok(())
    }
}

/// Checks that `time_signed` does not deviate more than `fudge` seconds
/// from the "current" time (specified by `now`).
fn check_time(time_signed: u64, fudge: u16, now: u64) -> Result<(), VerificationError> {
    let time_window_start = time_signed.saturating_sub(fudge as u64);
    let time_window_end = time_signed.saturating_add(fudge as u64);
    if now >= time_window_start && now <= time_window_end {
        Ok(())
    } else {
        Err(VerificationError::BadTime)
    }
}

impl fmt::Debug for ReadTsigRr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReadTsigRr")
            .field("key_name", &name::to_text(&self.key_name))
            .field("algorithm", &name::to_text(&self.algorithm))
            .field("time_signed", &self.time_signed)
            .field("fudge", &self.fudge)
            .field("mac", &self.mac)
            .field("original_id", &self.original_id)
            .field("error", &self.error)
            .field("other", &self.other)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TSIG WRITING/SIGNING                                               //
////////////////////////////////////////////////////////////////////////

/// Selects which digest a [`Writer`](super::Writer) computes when it
/// signs a message.
#[derive(Clone, Debug)]
pub enum TsigMode {
    /// Sign a request.
    Request,

    /// Sign a response to a request that carried `request_mac`.
    Response { request_mac: Box<[u8]> },

    /// Sign a subsequent message of a multi-message response, chaining
    /// from the MAC of the previous signed message. `unsigned` is the
    /// concatenation of any messages sent unsigned since then.
    Subsequent {
        prior_mac: Box<[u8]>,
        unsigned: Vec<u8>,
    },
}

/// A TSIG RR that has been prepared for serialization.
///
/// This structure specifies the TSIG fields other than the algorithm
/// and MAC, which come from the key used to sign.
#[derive(Clone, Debug)]
pub struct PreparedTsigRr {
    pub time_signed: u64,
    pub fudge: u16,
    pub original_id: u16,
    pub error: Rcode,
    pub other: Vec<u8>,
}

impl PreparedTsigRr {
    /// Prepares a TSIG RR for a message with the given ID, signed now.
    pub fn new(original_id: u16, time_signed: u64) -> Self {
        Self {
            time_signed,
            fudge: DEFAULT_FUDGE,
            original_id,
            error: Rcode::NoError,
            other: Vec::new(),
        }
    }

    /// Signs the given message, returning the TSIG RDATA with the
    /// computed MAC along with the MAC itself.
    ///
    /// The passed buffer should be the message up to (but not
    /// including) the TSIG RR, with its ARCOUNT already counting the
    /// TSIG RR; this method takes care of adjusting the field when
    /// computing the MAC.
    pub fn sign(&self, mode: &TsigMode, message: &[u8], key: &TsigKey) -> (Vec<u8>, Box<[u8]>) {
        let vars = Variables {
            key_name: &key.name,
            algorithm: key.algorithm.wire_name(),
            time_signed: self.time_signed,
            fudge: self.fudge,
            error: self.error,
            other: &self.other,
        };
        let mut authenticator = key.algorithm.make_authenticator(&key.secret);
        match mode {
            TsigMode::Request => {
                add_modified_message(authenticator.as_mut(), message, self.original_id);
                add_tsig_variables(authenticator.as_mut(), &vars);
            }
            TsigMode::Response { request_mac } => {
                add_prefix(authenticator.as_mut(), &Prefix::Mac(request_mac));
                add_modified_message(authenticator.as_mut(), message, self.original_id);
                add_tsig_variables(authenticator.as_mut(), &vars);
            }
            TsigMode::Subsequent {
                prior_mac,
                unsigned,
            } => {
                add_prefix(authenticator.as_mut(), &Prefix::Mac(prior_mac));
                authenticator.update(unsigned);
                add_modified_message(authenticator.as_mut(), message, self.original_id);
                add_tsig_timers(authenticator.as_mut(), &vars);
            }
        }
        let mac = authenticator.finalize();
        (self.serialize_rdata(key.algorithm, &mac), mac)
    }

    /// Serializes TSIG RDATA ([RFC 8945 § 4.2]).
    ///
    /// [RFC 8945 § 4.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
    fn serialize_rdata(&self, algorithm: Algorithm, mac: &[u8]) -> Vec<u8> {
        let algorithm = algorithm.wire_name();
        let mut rdata = Vec::with_capacity(algorithm.len() + mac.len() + self.other.len() + 16);
        rdata.extend_from_slice(algorithm);
        rdata.extend_from_slice(&time_signed_octets(self.time_signed));
        rdata.extend_from_slice(&self.fudge.to_be_bytes());
        rdata.extend_from_slice(&(mac.len() as u16).to_be_bytes());
        rdata.extend_from_slice(mac);
        rdata.extend_from_slice(&self.original_id.to_be_bytes());
        rdata.extend_from_slice(&u16::from(self.error).to_be_bytes());
        rdata.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        rdata.extend_from_slice(&self.other);
        rdata
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise when a [`TsigKey`] cannot be constructed.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum KeyError {
    InvalidName(name::Error),
    InvalidSecret,
    UnsupportedAlgorithm,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "invalid key name: {}", err),
            Self::InvalidSecret => f.write_str("key secret is not valid base64"),
            Self::UnsupportedAlgorithm => f.write_str("unsupported TSIG algorithm"),
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors that arise when a [`ReadRr`] cannot be converted into a
/// [`ReadTsigRr`].
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FromReadRrError {
    /// There is a format error in the RR.
    FormErr,

    /// The [`ReadRr`] is not a TSIG record.
    NotTsig,
}

impl fmt::Display for FromReadRrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FormErr => f.write_str("FORMERR"),
            Self::NotTsig => f.write_str("RR type is not TSIG"),
        }
    }
}

impl std::error::Error for FromReadRrError {}

/// Errors that arise during TSIG verification.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum VerificationError {
    /// The message was signed with a key (or algorithm) other than the
    /// expected one.
    BadKey,

    /// MAC verification failed.
    BadSig,

    /// Time check failed.
    BadTime,

    /// There was a format error (due to the MAC not meeting the minimum
    /// requirements of [RFC 8945 § 5.2.2.1]).
    ///
    /// [RFC 8945 § 5.2.2.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.2.1
    FormErr,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadKey => f.write_str("BADKEY"),
            Self::BadSig => f.write_str("BADSIG"),
            Self::BadTime => f.write_str("BADTIME"),
            Self::FormErr => f.write_str("FORMERR"),
        }
    }
}

impl std::error::Error for VerificationError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
