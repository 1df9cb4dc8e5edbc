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

//! Conversion between textual names and their on-the-wire form.

use std::fmt::Write;

use arrayvec::ArrayVec;

use super::{trim_root, Error, MAX_LABEL_LEN, MAX_WIRE_LEN};

/// The uncompressed on-the-wire representation of a domain name, as
/// defined in [RFC 1035 § 3.1].
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
pub type WireName = ArrayVec<u8, MAX_WIRE_LEN>;

////////////////////////////////////////////////////////////////////////
// SERIALIZATION OF TEXTUAL NAMES                                     //
////////////////////////////////////////////////////////////////////////

/// Converts a textual name into its uncompressed on-the-wire form.
///
/// The name is lower-cased, which gives the canonical form required
/// for TSIG key and algorithm names ([RFC 8945 § 4.3.3]). Unlike
/// [`validate_domain_name`](super::validate_domain_name), this accepts
/// any printable ASCII in labels (e.g. `_acme-challenge`), since owner
/// names of ordinary records are not restricted to host-name syntax.
/// The empty string and `.` denote the root.
///
/// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
pub fn to_wire(name: &str) -> Result<WireName, Error> {
    if !name.is_ascii() {
        return Err(Error::StrNotAscii);
    }

    let mut wire = WireName::new();
    let name = trim_root(name);
    if !name.is_empty() {
        for label in name.split('.') {
            if label.is_empty() {
                return Err(Error::EmptyLabel);
            } else if label.len() > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong);
            }
            wire.try_push(label.len() as u8)
                .or(Err(Error::NameTooLong))?;
            for octet in label.bytes() {
                wire.try_push(octet.to_ascii_lowercase())
                    .or(Err(Error::NameTooLong))?;
            }
        }
    }
    wire.try_push(0).or(Err(Error::NameTooLong))?;
    Ok(wire)
}

////////////////////////////////////////////////////////////////////////
// PARSING OF COMPRESSED ON-THE-WIRE NAMES                            //
////////////////////////////////////////////////////////////////////////

/// Parses a compressed name starting at index `start` of `octets` into
/// its uncompressed on-the-wire form, lower-cased. Pointers are
/// followed. Indices given in pointers are treated as indices of
/// `octets`, so the intention is for an entire DNS message to be passed
/// in `octets`.
///
/// Returns the name and the number of octets it occupies at `start`.
pub fn decompress(octets: &[u8], start: usize) -> Result<(WireName, usize), Error> {
    let mut wire = WireName::new();
    let mut next_chunk = Some(start);
    let mut len_of_first_chunk = None;

    while let Some(chunk_start) = next_chunk {
        let mut index = chunk_start;
        loop {
            let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
            if len & 0xc0 == 0xc0 {
                next_chunk = Some(parse_pointer(octets, chunk_start, index)? as usize);
                index += 2;
                break;
            } else if len as usize > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong);
            } else if len == 0 {
                next_chunk = None;
                index += 1;
                break;
            }

            let end_of_label = index + 1 + len as usize;
            let label = octets
                .get(index + 1..end_of_label)
                .ok_or(Error::UnexpectedEom)?;
            // Leave room for the terminating null label.
            if wire.len() + 1 + label.len() >= MAX_WIRE_LEN {
                return Err(Error::NameTooLong);
            }
            wire.push(len);
            wire.extend(label.iter().map(u8::to_ascii_lowercase));
            index = end_of_label;
        }
        len_of_first_chunk.get_or_insert(index - chunk_start);
    }

    wire.push(0);
    len_of_first_chunk
        .map(|len| (wire, len))
        .ok_or(Error::UnexpectedEom)
}

/// Like [`decompress`], but returns the name in textual form (without a
/// trailing dot; the root is the empty string).
pub fn read_compressed(octets: &[u8], start: usize) -> Result<(String, usize), Error> {
    decompress(octets, start).map(|(wire, len)| (to_text(&wire), len))
}

/// Converts an uncompressed on-the-wire name into textual form, without
/// a trailing dot. The root is the empty string.
pub fn to_text(wire: &[u8]) -> String {
    let mut text = String::new();
    let mut index = 0;
    while let Some(&len) = wire.get(index) {
        if len == 0 {
            break;
        }
        let end = (index + 1 + len as usize).min(wire.len());
        if !text.is_empty() {
            text.push('.');
        }
        push_label(&wire[index + 1..end], &mut text);
        index = end;
    }
    text
}

/// Parses a pointer at `index` in `octets`. This also checks that the
/// pointer refers to an index *earlier* than the start of the chunk it
/// is in (`chunk_start`).
fn parse_pointer(octets: &[u8], chunk_start: usize, index: usize) -> Result<u16, Error> {
    if index + 1 < octets.len() {
        let pointer_bytes = [octets[index], octets[index + 1]];
        let pointer = u16::from_be_bytes(pointer_bytes) & (!0xc000);
        if (pointer as usize) >= chunk_start {
            // According to RFC 1035 § 4.1.4, pointers point to a
            // *prior* occurrence of the name. (Importantly, this
            // prevents loops!)
            Err(Error::InvalidPointer)
        } else {
            Ok(pointer)
        }
    } else {
        Err(Error::UnexpectedEom)
    }
}

/// Appends a label in presentation format, escaping anything that is
/// not a letter, digit, hyphen, underscore, or asterisk as `\DDD`.
fn push_label(label: &[u8], text: &mut String) {
    for &octet in label {
        if octet.is_ascii_alphanumeric() || matches!(octet, b'-' | b'_' | b'*') {
            text.push(octet.to_ascii_lowercase() as char);
        } else {
            write!(text, "\\{:03}", octet).unwrap();
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
    fn to_wire_works() {
        assert_eq!(
            to_wire("SubZone.TEST.").unwrap().as_slice(),
            b"\x07subzone\x04test\x00",
        );
        assert_eq!(to_wire("").unwrap().as_slice(), b"\x00");
        assert_eq!(to_wire(".").unwrap().as_slice(), b"\x00");
    }

    #[test]
    fn to_wire_rejects_bad_names() {
        assert_eq!(to_wire("a..b"), Err(Error::EmptyLabel));
        assert_eq!(to_wire(&"a".repeat(64)), Err(Error::LabelTooLong));
        let long = [&"a".repeat(63) as &str; 5].join(".");
        assert_eq!(to_wire(&long), Err(Error::NameTooLong));
        assert_eq!(to_wire("é.test"), Err(Error::StrNotAscii));
    }

    #[test]
    fn read_compressed_follows_pointers() {
        // example.com. at offset 0, then www + pointer to offset 0.
        let message = b"\x07example\x03com\x00\x03www\xc0\x00";
        assert_eq!(
            read_compressed(message, 0),
            Ok((String::from("example.com"), 13)),
        );
        assert_eq!(
            read_compressed(message, 13),
            Ok((String::from("www.example.com"), 6)),
        );
    }

    #[test]
    fn decompress_lowercases_and_round_trips_through_text() {
        let message = b"\x03WWW\x07Example\x00";
        let (wire, len) = decompress(message, 0).unwrap();
        assert_eq!(len, message.len());
        assert_eq!(wire.as_slice(), b"\x03www\x07example\x00");
        assert_eq!(to_text(&wire), "www.example");
        assert_eq!(to_text(b"\x00"), "");
    }

    #[test]
    fn read_compressed_rejects_forward_pointers() {
        let message = b"\xc0\x00";
        assert_eq!(read_compressed(message, 0), Err(Error::InvalidPointer));
        let message = b"\x03www";
        assert_eq!(read_compressed(message, 0), Err(Error::UnexpectedEom));
    }
}
