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

//! A small in-process DNS server for exercising the [`Client`] in
//! tests.
//!
//! The server listens on UDP and TCP on the same loopback port and
//! serves a single zone from a flat list of records. It verifies the
//! TSIG record of updates and zone transfer requests with the crate's
//! own codec, applies updates, answers address queries, and serves
//! (optionally multi-message) zone transfers.
//!
//! [`Client`]: super::Client

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

use crate::class::Class;
use crate::message::tsig::{PreparedTsigRr, ReadTsigRr, TsigKey, TsigMode, VerificationError};
use crate::message::{Opcode, ReadRr, Rcode, Reader, Section, Writer};
use crate::name::{self, to_text, to_wire};
use crate::rr::Type;
use crate::util::unix_now;

/// A record held by the [`FakeServer`].
#[derive(Clone, Debug, Eq, PartialEq)]
struct StoredRecord {
    owner: String,
    rr_type: Type,
    ttl: u32,
    rdata: Vec<u8>,
}

#[derive(Debug)]
struct State {
    zone: String,
    key: TsigKey,
    records: Vec<StoredRecord>,
    truncate_udp: bool,
    records_per_message: usize,
    sign_every: usize,
    updates_received: usize,
}

/// A fake authoritative server. The listening tasks stop when it is
/// dropped.
pub struct FakeServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeServer {
    /// Starts a server for `zone` that accepts requests signed with
    /// `key`.
    pub async fn start(zone: &str, key: TsigKey) -> Self {
        let (udp, tcp) = bind_pair().await;
        let addr = udp.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            zone: name::normalize(zone),
            key,
            records: Vec::new(),
            truncate_udp: false,
            records_per_message: 100,
            sign_every: 1,
            updates_received: 0,
        }));
        let tasks = vec![
            tokio::spawn(serve_udp(udp, state.clone())),
            tokio::spawn(serve_tcp(tcp, state.clone())),
        ];
        Self { addr, state, tasks }
    }

    /// Returns the `host:port` address of the server.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn insert(&self, owner: &str, rr_type: Type, ttl: u32, rdata: &[u8]) {
        self.state.lock().unwrap().records.push(StoredRecord {
            owner: name::normalize(owner),
            rr_type,
            ttl,
            rdata: rdata.to_vec(),
        });
    }

    /// Returns the RDATA of the records of the given owner and type, in
    /// insertion order.
    pub fn rdatas(&self, owner: &str, rr_type: Type) -> Vec<Vec<u8>> {
        let owner = name::normalize(owner);
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.owner == owner && r.rr_type == rr_type)
            .map(|r| r.rdata.clone())
            .collect()
    }

    /// Makes every UDP response an empty, truncated one.
    pub fn truncate_udp(&self, truncate: bool) {
        self.state.lock().unwrap().truncate_udp = truncate;
    }

    pub fn set_records_per_message(&self, n: usize) {
        self.state.lock().unwrap().records_per_message = n.max(1);
    }

    /// Signs only every `n`th message of a zone transfer (and the
    /// last).
    pub fn sign_every(&self, n: usize) {
        self.state.lock().unwrap().sign_every = n.max(1);
    }

    /// Returns the number of dynamic updates applied so far.
    pub fn updates_received(&self) -> usize {
        self.state.lock().unwrap().updates_received
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Binds a UDP socket and a TCP listener to the same loopback port.
async fn bind_pair() -> (UdpSocket, TcpListener) {
    for _ in 0..16 {
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();
        if let Ok(tcp) = TcpListener::bind(addr).await {
            return (udp, tcp);
        }
    }
    panic!("could not bind UDP and TCP to the same port");
}

async fn serve_udp(socket: UdpSocket, state: Arc<Mutex<State>>) {
    let mut buf = vec![0; 65535];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(_) => continue,
        };
        let responses = handle(&buf[..len], false, &mut state.lock().unwrap());
        if let Some(response) = responses.first() {
            let _ = socket.send_to(response, peer).await;
        }
    }
}

async fn serve_tcp(listener: TcpListener, state: Arc<Mutex<State>>) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(serve_tcp_connection(stream, state.clone()));
    }
}

async fn serve_tcp_connection(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    loop {
        let len = match stream.read_u16().await {
            Ok(len) => len as usize,
            Err(_) => return,
        };
        let mut request = vec![0; len];
        if stream.read_exact(&mut request).await.is_err() {
            return;
        }
        let responses = handle(&request, true, &mut state.lock().unwrap());
        for response in responses {
            let mut framed = (response.len() as u16).to_be_bytes().to_vec();
            framed.extend_from_slice(&response);
            if stream.write_all(&framed).await.is_err() {
                return;
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// REQUEST HANDLING                                                   //
////////////////////////////////////////////////////////////////////////

/// A parsed request.
struct Request<'a> {
    id: u16,
    opcode: Opcode,
    rd: bool,
    qname: String,
    qtype: Type,
    qclass: Class,
    updates: Vec<ReadRr<'a>>,
    tsig: Option<(ReadTsigRr<'a>, usize)>,
}

fn parse(octets: &[u8]) -> Option<Request> {
    let mut reader = Reader::try_from(octets).ok()?;
    let question = reader.read_question().ok()?;
    for _ in 0..reader.ancount() {
        reader.read_rr().ok()?;
    }
    let mut updates = Vec::new();
    for _ in 0..reader.nscount() {
        updates.push(reader.read_rr().ok()?);
    }
    let mut tsig = None;
    for _ in 0..reader.arcount() {
        let rr = reader.read_rr().ok()?;
        if rr.rr_type == Type::TSIG {
            let start = rr.start;
            tsig = Some((ReadTsigRr::try_from(rr).ok()?, start));
        }
    }
    Some(Request {
        id: reader.id(),
        opcode: reader.opcode(),
        rd: reader.rd(),
        qname: to_text(&question.qname),
        qtype: question.qtype,
        qclass: question.qclass,
        updates,
        tsig,
    })
}

fn handle(octets: &[u8], over_tcp: bool, state: &mut State) -> Vec<Vec<u8>> {
    let request = match parse(octets) {
        Some(request) => request,
        None => return Vec::new(),
    };

    if !over_tcp && state.truncate_udp {
        let mut writer = response_writer(&request);
        writer.set_tc(true);
        return writer.finish().map(|(m, _)| vec![m]).unwrap_or_default();
    }

    match (request.opcode, request.qtype) {
        (Opcode::Update, _) => handle_update(octets, &request, state),
        (Opcode::Query, Type::AXFR) if over_tcp => handle_axfr(octets, &request, state),
        (Opcode::Query, Type::A | Type::AAAA) => handle_lookup(&request, state),
        _ => unsigned_error(&request, Rcode::NotImp),
    }
}

fn response_writer(request: &Request) -> Writer {
    let mut writer = Writer::new(request.id, request.opcode);
    writer.set_qr(true);
    writer.set_rd(request.rd);
    writer
        .add_question(&request.qname, request.qtype, request.qclass)
        .unwrap();
    writer
}

fn unsigned_error(request: &Request, rcode: Rcode) -> Vec<Vec<u8>> {
    let mut writer = response_writer(request);
    writer.set_rcode(rcode);
    vec![writer.finish().unwrap().0]
}

/// Verifies the request's TSIG record. On failure, returns the error
/// response to send.
fn check_tsig<'a>(
    octets: &[u8],
    request: &'a Request,
    state: &State,
) -> Result<&'a ReadTsigRr<'a>, Vec<Vec<u8>>> {
    let (tsig, start) = match &request.tsig {
        Some(tsig) => tsig,
        None => return Err(unsigned_error(request, Rcode::Refused)),
    };
    match tsig.verify_request(&octets[..*start], &state.key, unix_now()) {
        Ok(()) => Ok(tsig),
        Err(VerificationError::FormErr) => Err(unsigned_error(request, Rcode::FormErr)),
        Err(err) => {
            let error = match err {
                VerificationError::BadKey => Rcode::BadKey,
                VerificationError::BadTime => Rcode::BadTime,
                _ => Rcode::BadSig,
            };
            Err(vec![tsig_error_response(request, tsig, error, &state.key)])
        }
    }
}

/// Builds an unsigned NOTAUTH response carrying a TSIG record with an
/// empty MAC and the given error ([RFC 8945 § 5.3.2]).
///
/// [RFC 8945 § 5.3.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.3.2
fn tsig_error_response(
    request: &Request,
    tsig: &ReadTsigRr,
    error: Rcode,
    key: &TsigKey,
) -> Vec<u8> {
    let mut rdata = to_wire(key.algorithm().name()).unwrap().to_vec();
    rdata.extend_from_slice(&tsig.time_signed().to_be_bytes()[2..]);
    rdata.extend_from_slice(&tsig.fudge().to_be_bytes());
    rdata.extend_from_slice(&0u16.to_be_bytes());
    rdata.extend_from_slice(&request.id.to_be_bytes());
    rdata.extend_from_slice(&u16::from(error).to_be_bytes());
    rdata.extend_from_slice(&0u16.to_be_bytes());

    let mut writer = response_writer(request);
    writer.set_rcode(Rcode::NotAuth);
    writer
        .add_rr(
            Section::Additional,
            &to_text(key.wire_name()),
            Type::TSIG,
            Class::ANY,
            0,
            &rdata,
        )
        .unwrap();
    writer.finish().unwrap().0
}

fn signed_response(writer: Writer, request_mac: &[u8], request_id: u16, key: &TsigKey) -> Vec<u8> {
    let mut writer = writer;
    writer.set_tsig(
        TsigMode::Response {
            request_mac: request_mac.into(),
        },
        PreparedTsigRr::new(request_id, unix_now()),
        key.clone(),
    );
    writer.finish().unwrap().0
}

fn handle_update(octets: &[u8], request: &Request, state: &mut State) -> Vec<Vec<u8>> {
    let tsig = match check_tsig(octets, request, state) {
        Ok(tsig) => tsig,
        Err(response) => return response,
    };

    let mut writer = response_writer(request);
    if name::normalize(&request.qname) != state.zone {
        writer.set_rcode(Rcode::NotAuth);
    } else {
        for update in &request.updates {
            let owner = update.owner_text();
            match update.class {
                Class::ANY => state
                    .records
                    .retain(|r| !(r.owner == owner && r.rr_type == update.rr_type)),
                Class::NONE => state.records.retain(|r| {
                    !(r.owner == owner && r.rr_type == update.rr_type && r.rdata == update.rdata)
                }),
                _ => {
                    let record = StoredRecord {
                        owner,
                        rr_type: update.rr_type,
                        ttl: update.ttl,
                        rdata: update.rdata.to_vec(),
                    };
                    if !state.records.contains(&record) {
                        state.records.push(record);
                    }
                }
            }
        }
        state.updates_received += 1;
    }
    vec![signed_response(writer, tsig.mac(), request.id, &state.key)]
}

fn handle_lookup(request: &Request, state: &State) -> Vec<Vec<u8>> {
    let qname = name::normalize(&request.qname);
    let mut writer = response_writer(request);
    if !state.records.iter().any(|r| r.owner == qname) {
        writer.set_rcode(Rcode::NxDomain);
    }
    for record in state
        .records
        .iter()
        .filter(|r| r.owner == qname && r.rr_type == request.qtype)
    {
        writer
            .add_rr(
                Section::Answer,
                &record.owner,
                record.rr_type,
                Class::IN,
                record.ttl,
                &record.rdata,
            )
            .unwrap();
    }
    vec![writer.finish().unwrap().0]
}

fn soa_rdata(zone: &str) -> Vec<u8> {
    let mut rdata = to_wire(&format!("ns.{}", zone)).unwrap().to_vec();
    rdata.extend_from_slice(&to_wire(&format!("hostmaster.{}", zone)).unwrap());
    for field in [1u32, 3600, 600, 86400, 300] {
        rdata.extend_from_slice(&field.to_be_bytes());
    }
    rdata
}

fn handle_axfr(octets: &[u8], request: &Request, state: &State) -> Vec<Vec<u8>> {
    let tsig = match check_tsig(octets, request, state) {
        Ok(tsig) => tsig,
        Err(response) => return response,
    };
    if name::normalize(&request.qname) != state.zone {
        let mut writer = response_writer(request);
        writer.set_rcode(Rcode::NotAuth);
        return vec![signed_response(writer, tsig.mac(), request.id, &state.key)];
    }

    let soa = StoredRecord {
        owner: state.zone.clone(),
        rr_type: Type::SOA,
        ttl: 3600,
        rdata: soa_rdata(&state.zone),
    };
    let mut all = vec![soa.clone()];
    all.extend(state.records.iter().cloned());
    all.push(soa);

    let chunks: Vec<&[StoredRecord]> = all.chunks(state.records_per_message).collect();
    let mut messages = Vec::with_capacity(chunks.len());
    let mut prior_mac: Box<[u8]> = tsig.mac().into();
    let mut unsigned = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let mut writer = Writer::new(request.id, Opcode::Query);
        writer.set_qr(true);
        writer.set_aa(true);
        if index == 0 {
            writer
                .add_question(&request.qname, request.qtype, request.qclass)
                .unwrap();
        }
        for record in chunk.iter() {
            writer
                .add_rr(
                    Section::Answer,
                    &record.owner,
                    record.rr_type,
                    Class::IN,
                    record.ttl,
                    &record.rdata,
                )
                .unwrap();
        }

        let last = index + 1 == chunks.len();
        if index == 0 || last || index % state.sign_every == 0 {
            let mode = if index == 0 {
                TsigMode::Response {
                    request_mac: prior_mac.clone(),
                }
            } else {
                TsigMode::Subsequent {
                    prior_mac: prior_mac.clone(),
                    unsigned: std::mem::take(&mut unsigned),
                }
            };
            writer.set_tsig(mode, PreparedTsigRr::new(request.id, unix_now()), state.key.clone());
            let (message, mac) = writer.finish().unwrap();
            prior_mac = mac.unwrap();
            messages.push(message);
        } else {
            let (message, _) = writer.finish().unwrap();
            unsigned.extend_from_slice(&message);
            messages.push(message);
        }
    }
    messages
}
