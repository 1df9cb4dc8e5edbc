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

//! Domain name handling.
//!
//! Names are passed around the crate as plain strings, since they
//! arrive from configuration files, JSON payloads, and user input. This
//! module provides the operations that give those strings meaning:
//!
//! * syntax validation ([`validate_domain_name`]);
//! * transliteration of arbitrary text into a label
//!   ([`sanitize_to_label`]);
//! * label-wise ancestry tests and delegation-chain computation
//!   ([`is_subdomain_of`], [`delegation_chain`]); and
//! * conversion to and from the on-the-wire form used by the
//!   [`message`](crate::message) codec ([`to_wire`],
//!   [`read_compressed`]).
//!
//! A single trailing dot (the root label) is accepted everywhere and
//! ignored. Comparisons are ASCII-case-insensitive, and normalized names
//! are lower-case without the trailing dot.

mod error;
mod wire;
pub use error::Error;
pub use wire::{decompress, read_compressed, to_text, to_wire, WireName};

/// The maximum length of a domain name in its textual form, not
/// counting a trailing dot.
pub const MAX_NAME_LEN: usize = 253;

/// The maximum length of a label.
pub const MAX_LABEL_LEN: usize = 63;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// What `@` is replaced with by [`sanitize_to_label`].
const AT_MARKER: &str = "-at-";

////////////////////////////////////////////////////////////////////////
// NORMALIZATION                                                      //
////////////////////////////////////////////////////////////////////////

/// Strips a single trailing dot from `name`, if present.
pub fn trim_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Returns the normalized form of `name`: surrounding whitespace and
/// the trailing dot removed, lower-cased.
pub fn normalize(name: &str) -> String {
    trim_root(name.trim()).to_ascii_lowercase()
}

/// Returns `name` in fully-qualified form (with a trailing dot), as
/// used by the authoritative server's management API.
pub fn fqdn(name: &str) -> String {
    format!("{}.", normalize(name))
}

////////////////////////////////////////////////////////////////////////
// VALIDATION                                                         //
////////////////////////////////////////////////////////////////////////

/// Validates the syntax of a domain name.
///
/// The name must be at most 253 characters long, have at least two
/// labels, and every label must be 1 to 63 characters drawn from
/// letters, digits, and hyphens, not starting or ending with a hyphen.
pub fn validate_domain_name(name: &str) -> Result<(), Error> {
    let name = trim_root(name);
    if name.is_empty() {
        return Err(Error::StrEmpty);
    } else if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }

    let mut n_labels = 0;
    for label in name.split('.') {
        validate_label(label)?;
        n_labels += 1;
    }
    if n_labels < 2 {
        Err(Error::TooFewLabels)
    } else {
        Ok(())
    }
}

/// Validates a single label against the letter-digit-hyphen rule.
pub fn validate_label(label: &str) -> Result<(), Error> {
    if label.is_empty() {
        Err(Error::EmptyLabel)
    } else if label.len() > MAX_LABEL_LEN {
        Err(Error::LabelTooLong)
    } else if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        Err(Error::InvalidCharacter)
    } else if label.starts_with('-') || label.ends_with('-') {
        Err(Error::HyphenAtEdge)
    } else {
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// SANITIZATION                                                       //
////////////////////////////////////////////////////////////////////////

/// Transliterates arbitrary text (typically a username or an email
/// address) into a DNS label.
///
/// `@` becomes `-at-`, every run of characters that are not allowed in
/// a label becomes a single hyphen, leading and trailing hyphens are
/// trimmed, and the result is lower-cased and cut to 63 characters.
/// The function is idempotent. The result is empty if `input` contains
/// no letters or digits.
pub fn sanitize_to_label(input: &str) -> String {
    let replaced = input.replace('@', AT_MARKER);
    let mut label = String::with_capacity(replaced.len());
    let mut in_invalid_run = false;
    for c in replaced.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            label.push(c.to_ascii_lowercase());
            in_invalid_run = false;
        } else if !in_invalid_run {
            label.push('-');
            in_invalid_run = true;
        }
    }

    // The label is pure ASCII at this point, so byte slicing is safe.
    let trimmed = label.trim_matches('-');
    let truncated = &trimmed[..trimmed.len().min(MAX_LABEL_LEN)];
    truncated.trim_end_matches('-').to_owned()
}

////////////////////////////////////////////////////////////////////////
// ANCESTRY AND DELEGATION CHAINS                                     //
////////////////////////////////////////////////////////////////////////

/// Returns whether `name` is equal to or a (label-wise) subdomain of
/// `ancestor`. `bc.d` is not a subdomain of `c.d`.
pub fn is_subdomain_of(name: &str, ancestor: &str) -> bool {
    let name = trim_root(name).as_bytes();
    let ancestor = trim_root(ancestor).as_bytes();
    if ancestor.is_empty() {
        return true;
    } else if name.len() < ancestor.len() {
        return false;
    }

    let split = name.len() - ancestor.len();
    name[split..].eq_ignore_ascii_case(ancestor) && (split == 0 || name[split - 1] == b'.')
}

/// Computes the delegation chain from `authority` down to `full_name`.
///
/// The result lists every name from `authority` to `full_name`
/// (inclusive), shortest first, in normalized form. If `full_name` is
/// not `authority` or one of its subdomains, the chain is empty.
///
/// ```
/// let chain = subzone::name::delegation_chain("a.b.c.d.e", "c.d.e");
/// assert_eq!(chain, ["c.d.e", "b.c.d.e", "a.b.c.d.e"]);
/// ```
pub fn delegation_chain(full_name: &str, authority: &str) -> Vec<String> {
    let full_name = normalize(full_name);
    let authority = normalize(authority);
    if authority.is_empty() || full_name.is_empty() || !is_subdomain_of(&full_name, &authority) {
        return Vec::new();
    }

    let labels: Vec<&str> = full_name.split('.').collect();
    let authority_len = authority.split('.').count();
    (authority_len..=labels.len())
        .map(|n| labels[labels.len() - n..].join("."))
        .collect()
}

/// Returns `name` relative to `zone`: `@` for the apex, the leading
/// labels for names inside the zone, and the normalized name otherwise.
pub fn relative_to(name: &str, zone: &str) -> String {
    let name = normalize(name);
    let zone = normalize(zone);
    if name == zone {
        String::from("@")
    } else if !zone.is_empty() && is_subdomain_of(&name, &zone) {
        name[..name.len() - zone.len() - 1].to_owned()
    } else {
        name
    }
}

/// Returns `name` qualified within `zone`, in normalized form: the zone
/// itself for `@` (or the empty string), `name` unchanged if it is
/// already inside the zone, and `name` with the zone appended
/// otherwise. This is the inverse of [`relative_to`].
pub fn qualify(name: &str, zone: &str) -> String {
    let name = normalize(name);
    let zone = normalize(zone);
    if name.is_empty() || name == "@" {
        zone
    } else if zone.is_empty() || is_subdomain_of(&name, &zone) {
        name
    } else {
        format!("{}.{}", name, zone)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
