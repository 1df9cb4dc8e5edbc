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

//! Conversion of RDATA into presentation format.

use std::fmt::Write;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{ReadRdataError, Type};
use crate::name::read_compressed;
use crate::util::push_hex;

/// Presents the `len` octets of RDATA at index `start` of `message`.
///
/// The whole message is needed since names embedded in RDATA may be
/// compressed. A, AAAA, NS, CNAME, PTR, MX, TXT, and SRV records are
/// presented in their usual textual forms, with embedded names fully
/// qualified. Everything else uses the generic format of [RFC 3597 § 5].
///
/// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
pub fn present_rdata(
    message: &[u8],
    start: usize,
    len: usize,
    rr_type: Type,
) -> Result<String, ReadRdataError> {
    let rdata = message
        .get(start..start + len)
        .ok_or(ReadRdataError::UnexpectedEom)?;
    let mut text = String::new();

    match rr_type {
        Type::A => {
            let octets: [u8; 4] = rdata.try_into().or(Err(ReadRdataError::Other))?;
            write!(text, "{}", Ipv4Addr::from(octets)).unwrap();
        }
        Type::AAAA => {
            let octets: [u8; 16] = rdata.try_into().or(Err(ReadRdataError::Other))?;
            write!(text, "{}", Ipv6Addr::from(octets)).unwrap();
        }
        Type::NS | Type::CNAME | Type::PTR => {
            push_name(message, start, start + len, &mut text)?;
        }
        Type::MX => {
            let preference = read_u16(rdata, 0)?;
            write!(text, "{} ", preference).unwrap();
            push_name(message, start + 2, start + len, &mut text)?;
        }
        Type::SRV => {
            let priority = read_u16(rdata, 0)?;
            let weight = read_u16(rdata, 2)?;
            let port = read_u16(rdata, 4)?;
            write!(text, "{} {} {} ", priority, weight, port).unwrap();
            push_name(message, start + 6, start + len, &mut text)?;
        }
        Type::TXT => push_character_strings(rdata, &mut text)?,
        _ => {
            write!(text, "\\# {}", rdata.len()).unwrap();
            if !rdata.is_empty() {
                text.push(' ');
                push_hex(rdata, &mut text);
            }
        }
    }

    Ok(text)
}

fn read_u16(rdata: &[u8], index: usize) -> Result<u16, ReadRdataError> {
    rdata
        .get(index..index + 2)
        .map(|octets| u16::from_be_bytes([octets[0], octets[1]]))
        .ok_or(ReadRdataError::UnexpectedEom)
}

/// Appends the fully-qualified name at `start`, which must end exactly
/// at `end`.
fn push_name(
    message: &[u8],
    start: usize,
    end: usize,
    text: &mut String,
) -> Result<(), ReadRdataError> {
    let (name, len) = read_compressed(message, start)?;
    if start + len != end {
        return Err(ReadRdataError::Other);
    }
    text.push_str(&name);
    text.push('.');
    Ok(())
}

/// Appends a sequence of `<character-string>`s as quoted strings
/// separated by spaces.
fn push_character_strings(rdata: &[u8], text: &mut String) -> Result<(), ReadRdataError> {
    let mut index = 0;
    while index < rdata.len() {
        let len = rdata[index] as usize;
        let string = rdata
            .get(index + 1..index + 1 + len)
            .ok_or(ReadRdataError::UnexpectedEom)?;
        if index > 0 {
            text.push(' ');
        }
        text.push('"');
        for &octet in string {
            match octet {
                b'"' | b'\\' => {
                    text.push('\\');
                    text.push(octet as char);
                }
                0x20..=0x7e => text.push(octet as char),
                _ => write!(text, "\\{:03}", octet).unwrap(),
            }
        }
        text.push('"');
        index += 1 + len;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
