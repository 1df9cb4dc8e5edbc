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

//! The DNS protocol client.
//!
//! A [`Client`] talks to one server (given as `host:port`) and performs
//! TSIG-authenticated dynamic updates ([RFC 2136]) and zone transfers
//! ([RFC 5936]), plus plain address lookups. Updates are sent over UDP
//! and retried over TCP if the response is truncated; zone transfers
//! always use TCP. Every exchange is bounded by a short timeout, and
//! nothing is retried: failures surface as an [`Error`] and retrying is
//! up to the caller.
//!
//! [RFC 2136]: https://datatracker.ietf.org/doc/html/rfc2136
//! [RFC 5936]: https://datatracker.ietf.org/doc/html/rfc5936

use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::class::Class;
use crate::message::tsig::{PreparedTsigRr, ReadTsigRr, TsigMode};
use crate::message::{writer, Opcode, ReadRr, Rcode, Reader, Section, Writer};
use crate::name;
use crate::rr::{address_rdata, AddressFamily, Record, Type};
use crate::util::unix_now;

mod error;
#[cfg(test)]
pub(crate) mod testing;
pub use crate::message::tsig::{Algorithm, TsigKey};
pub use error::Error;

/// The default per-exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The size of the buffer UDP responses are received into.
const UDP_BUFFER_SIZE: usize = 4096;

/// The most unsigned messages allowed in a row during a zone transfer
/// ([RFC 8945 § 5.3.1]).
///
/// [RFC 8945 § 5.3.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.3.1
const MAX_UNSIGNED_RUN: usize = 99;

////////////////////////////////////////////////////////////////////////
// CLIENT                                                             //
////////////////////////////////////////////////////////////////////////

/// A DNS protocol client for a single server.
#[derive(Clone, Debug)]
pub struct Client {
    server: String,
    timeout: Duration,
}

impl Client {
    /// Creates a client for the server at `server` (`host:port`).
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the server address this client talks to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Adds an A or AAAA record (depending on the family of `address`)
    /// for `name` in `zone`. `name` may be relative to the zone, or `@`
    /// for the apex.
    pub async fn add_address(
        &self,
        zone: &str,
        name: &str,
        address: IpAddr,
        ttl: u32,
        key: &TsigKey,
    ) -> Result<(), Error> {
        let owner = name::qualify(name, zone);
        let rr_type = AddressFamily::of(address).rr_type();
        let rdata = address_rdata(address);
        debug!("Adding {} {} {} to zone {}", owner, rr_type, address, zone);
        self.update(zone, key, |writer| {
            writer.add_rr(Section::Authority, &owner, rr_type, Class::IN, ttl, &rdata)
        })
        .await
    }

    /// Deletes all records of `family`'s address type for `name` in
    /// `zone` ([RFC 2136 § 2.5.2]).
    ///
    /// [RFC 2136 § 2.5.2]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.5.2
    pub async fn delete_address(
        &self,
        zone: &str,
        name: &str,
        family: AddressFamily,
        key: &TsigKey,
    ) -> Result<(), Error> {
        let owner = name::qualify(name, zone);
        let rr_type = family.rr_type();
        debug!("Deleting {} {} from zone {}", owner, rr_type, zone);
        self.update(zone, key, |writer| {
            writer.add_rr(Section::Authority, &owner, rr_type, Class::ANY, 0, &[])
        })
        .await
    }

    /// Replaces the address records of `address`'s family for `name`
    /// with a single record for `address`.
    ///
    /// This is not transactional: the deletion and the addition are two
    /// separately signed messages, and if the second fails the name is
    /// left without an address until the operation is retried.
    pub async fn upsert_address(
        &self,
        zone: &str,
        name: &str,
        address: IpAddr,
        ttl: u32,
        key: &TsigKey,
    ) -> Result<(), Error> {
        self.delete_address(zone, name, AddressFamily::of(address), key)
            .await?;
        self.add_address(zone, name, address, ttl, key).await
    }

    /// Sends a signed dynamic update for `zone` whose update section is
    /// written by `add_updates`, and checks the response.
    async fn update<F>(&self, zone: &str, key: &TsigKey, add_updates: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Writer) -> writer::Result<()>,
    {
        let id = rand::random();
        let mut writer = Writer::new(id, Opcode::Update);
        writer.add_question(zone, Type::SOA, Class::IN)?;
        add_updates(&mut writer)?;
        writer.set_tsig(TsigMode::Request, PreparedTsigRr::new(id, unix_now()), key.clone());
        let (request, request_mac) = writer.finish()?;
        let request_mac = request_mac.unwrap_or_default();

        let message = self.exchange(&request, id).await?;
        let response = parse_response(&message, id)?;
        check_signed_response(&response, &message, &request_mac, key)
    }

    /// Performs a full zone transfer of `zone`.
    ///
    /// Infrastructure records (SOA, signatures, and keys) are dropped.
    /// Owner names are made relative to the zone, with the apex
    /// normalized to `@`.
    pub async fn zone_transfer(&self, zone: &str, key: &TsigKey) -> Result<Vec<Record>, Error> {
        let zone = name::normalize(zone);
        let id = rand::random();
        let mut writer = Writer::new(id, Opcode::Query);
        writer.add_question(&zone, Type::AXFR, Class::IN)?;
        writer.set_tsig(TsigMode::Request, PreparedTsigRr::new(id, unix_now()), key.clone());
        let (request, request_mac) = writer.finish()?;

        debug!("Transferring zone {} from {}", zone, self.server);
        let addr = self.resolve().await?;
        let mut stream = with_timeout(self.timeout, connect_tcp(addr)).await?;
        with_timeout(self.timeout, send_tcp(&mut stream, &request)).await?;

        let mut transfer = Transfer::new(id, &zone, key, request_mac.unwrap_or_default());
        while !transfer.done {
            let message = with_timeout(self.timeout, recv_tcp(&mut stream)).await?;
            transfer.process(&message)?;
        }
        debug!("Transferred {} records of zone {}", transfer.records.len(), zone);
        Ok(transfer.records)
    }

    /// Looks up the A and AAAA records of `name` with plain recursive
    /// queries. IPv4 addresses come first. A name that does not exist
    /// has no addresses.
    pub async fn lookup_addresses(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        let mut addresses = Vec::new();
        for rr_type in [Type::A, Type::AAAA] {
            let id = rand::random();
            let mut writer = Writer::new(id, Opcode::Query);
            writer.set_rd(true);
            writer.add_question(name, rr_type, Class::IN)?;
            let (request, _) = writer.finish()?;

            let message = self.exchange(&request, id).await?;
            let response = parse_response(&message, id)?;
            match response.reader.rcode() {
                Rcode::NoError | Rcode::NxDomain => (),
                rcode => return Err(Error::Rcode(rcode)),
            }
            addresses.extend(response.answers.iter().filter_map(address_of));
        }
        Ok(addresses)
    }

    ////////////////////////////////////////////////////////////////////
    // TRANSPORT                                                      //
    ////////////////////////////////////////////////////////////////////

    /// Sends `request` over UDP, retrying over TCP if the response is
    /// truncated.
    async fn exchange(&self, request: &[u8], id: u16) -> Result<Vec<u8>, Error> {
        let addr = self.resolve().await?;
        let response = with_timeout(self.timeout, exchange_udp(addr, request, id)).await?;
        if Reader::try_from(response.as_slice())?.tc() {
            debug!("Response from {} was truncated; retrying over TCP", addr);
            with_timeout(self.timeout, exchange_tcp(addr, request)).await
        } else {
            Ok(response)
        }
    }

    /// Resolves the server address.
    async fn resolve(&self) -> Result<SocketAddr, Error> {
        lookup_host(self.server.as_str()).await?.next().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not resolve to any address", self.server),
            ))
        })
    }
}

async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

async fn exchange_udp(addr: SocketAddr, request: &[u8], id: u16) -> Result<Vec<u8>, Error> {
    let bind_addr: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(addr).await?;
    socket.send(request).await?;

    let mut buf = vec![0; UDP_BUFFER_SIZE];
    loop {
        let len = socket.recv(&mut buf).await?;
        // Stray datagrams (e.g. late responses to earlier requests) are
        // skipped.
        if len >= 2 && buf[0..2] == id.to_be_bytes() {
            buf.truncate(len);
            return Ok(buf);
        }
        trace!("Ignoring stray {}-octet datagram from {}", len, addr);
    }
}

async fn exchange_tcp(addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>, Error> {
    let mut stream = connect_tcp(addr).await?;
    send_tcp(&mut stream, request).await?;
    recv_tcp(&mut stream).await
}

async fn connect_tcp(addr: SocketAddr) -> Result<TcpStream, Error> {
    Ok(TcpStream::connect(addr).await?)
}

/// Writes a message with its two-octet length prefix.
async fn send_tcp(stream: &mut TcpStream, message: &[u8]) -> Result<(), Error> {
    let mut framed = Vec::with_capacity(message.len() + 2);
    framed.extend_from_slice(&(message.len() as u16).to_be_bytes());
    framed.extend_from_slice(message);
    stream.write_all(&framed).await?;
    Ok(())
}

/// Reads one length-prefixed message.
async fn recv_tcp(stream: &mut TcpStream) -> Result<Vec<u8>, Error> {
    let len = stream.read_u16().await? as usize;
    let mut message = vec![0; len];
    stream.read_exact(&mut message).await?;
    Ok(message)
}

////////////////////////////////////////////////////////////////////////
// RESPONSE HANDLING                                                  //
////////////////////////////////////////////////////////////////////////

/// A parsed response: the answers and, if present, the TSIG record,
/// which must be the last RR of the message.
struct Response<'a> {
    reader: Reader<'a>,
    answers: Vec<ReadRr<'a>>,
    tsig: Option<ReadTsigRr<'a>>,
    signed_len: usize,
}

fn parse_response(message: &[u8], id: u16) -> Result<Response, Error> {
    let mut reader = Reader::try_from(message)?;
    if reader.id() != id || !reader.qr() {
        return Err(Error::Mismatched);
    }

    for _ in 0..reader.qdcount() {
        reader.read_question()?;
    }
    let mut answers = Vec::with_capacity(reader.ancount() as usize);
    for _ in 0..reader.ancount() {
        answers.push(reader.read_rr()?);
    }

    let n_others = reader.nscount() as usize + reader.arcount() as usize;
    let mut tsig = None;
    let mut signed_len = message.len();
    for index in 0..n_others {
        let rr = reader.read_rr()?;
        if rr.rr_type == Type::TSIG {
            if index + 1 != n_others || reader.arcount() == 0 {
                return Err(Error::Mismatched);
            }
            signed_len = rr.start;
            tsig = Some(ReadTsigRr::try_from(rr).or(Err(Error::Mismatched))?);
        }
    }

    Ok(Response {
        reader,
        answers,
        tsig,
        signed_len,
    })
}

/// Checks the TSIG record and the RCODE of a response to a signed
/// request.
fn check_signed_response(
    response: &Response,
    message: &[u8],
    request_mac: &[u8],
    key: &TsigKey,
) -> Result<(), Error> {
    let rcode = response.reader.rcode();
    match &response.tsig {
        // Servers do not sign every error response.
        None if !rcode.is_success() => Err(Error::Rcode(rcode)),
        None => Err(Error::Unsigned),
        Some(tsig) if !tsig.error().is_success() => Err(Error::Tsig(tsig.error())),
        Some(tsig) => {
            tsig.verify_response(&message[..response.signed_len], request_mac, key, unix_now())?;
            if rcode.is_success() {
                Ok(())
            } else {
                Err(Error::Rcode(rcode))
            }
        }
    }
}

fn address_of(rr: &ReadRr) -> Option<IpAddr> {
    match rr.rr_type {
        Type::A => <[u8; 4]>::try_from(rr.rdata).ok().map(IpAddr::from),
        Type::AAAA => <[u8; 16]>::try_from(rr.rdata).ok().map(IpAddr::from),
        _ => None,
    }
}

/// The state of a zone transfer in progress.
///
/// The first message is verified as a response to the request. Later
/// messages may be unsigned: each signed message covers the unsigned
/// messages before it ([RFC 8945 § 5.3.1]). At most
/// [`MAX_UNSIGNED_RUN`] messages may go unsigned in a row, and the last
/// message must be signed. The transfer is done when the SOA record
/// appears for the second time.
///
/// [RFC 8945 § 5.3.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.3.1
struct Transfer<'z> {
    id: u16,
    zone: &'z str,
    key: &'z TsigKey,
    prior_mac: Box<[u8]>,
    unsigned: Vec<u8>,
    unsigned_run: usize,
    first: bool,
    soa_count: usize,
    done: bool,
    records: Vec<Record>,
}

impl<'z> Transfer<'z> {
    fn new(id: u16, zone: &'z str, key: &'z TsigKey, request_mac: Box<[u8]>) -> Self {
        Self {
            id,
            zone,
            key,
            prior_mac: request_mac,
            unsigned: Vec::new(),
            unsigned_run: 0,
            first: true,
            soa_count: 0,
            done: false,
            records: Vec::new(),
        }
    }

    fn process(&mut self, message: &[u8]) -> Result<(), Error> {
        let response = parse_response(message, self.id)?;
        let rcode = response.reader.rcode();

        match &response.tsig {
            None if self.first => {
                return if rcode.is_success() {
                    Err(Error::Unsigned)
                } else {
                    Err(Error::Rcode(rcode))
                };
            }
            None if self.unsigned_run == MAX_UNSIGNED_RUN => return Err(Error::Unsigned),
            None => {
                self.unsigned.extend_from_slice(message);
                self.unsigned_run += 1;
            }
            Some(tsig) if !tsig.error().is_success() => return Err(Error::Tsig(tsig.error())),
            Some(tsig) => {
                let signed = &message[..response.signed_len];
                if self.first {
                    tsig.verify_response(signed, &self.prior_mac, self.key, unix_now())?;
                } else {
                    tsig.verify_subsequent(
                        &self.unsigned,
                        signed,
                        &self.prior_mac,
                        self.key,
                        unix_now(),
                    )?;
                }
                self.prior_mac = tsig.mac().into();
                self.unsigned.clear();
                self.unsigned_run = 0;
            }
        }

        if !rcode.is_success() {
            return Err(Error::Rcode(rcode));
        } else if self.first && response.answers.first().map(|rr| rr.rr_type) != Some(Type::SOA) {
            // RFC 5936 § 2.2: the transfer starts with the SOA record.
            return Err(Error::Mismatched);
        }
        self.first = false;

        for rr in &response.answers {
            if rr.rr_type == Type::SOA {
                self.soa_count += 1;
                if self.soa_count == 2 {
                    self.done = true;
                    break;
                }
            } else if !rr.rr_type.is_infrastructure() {
                self.records.push(Record {
                    name: name::relative_to(&rr.owner_text(), self.zone),
                    rr_type: rr.rr_type,
                    ttl: rr.ttl,
                    data: response.reader.present_rdata(rr)?,
                });
            }
        }

        if self.done && !self.unsigned.is_empty() {
            Err(Error::Unsigned)
        } else {
            Ok(())
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
