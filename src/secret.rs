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

//! Generation of shared secrets and of the names of user-scoped keys.
//!
//! Every key this crate creates on behalf of a user is named
//! [`KEY_PREFIX`] followed by a hash of the user and zone. Keys without
//! the prefix belong to somebody else (the operator's admin key, keys
//! installed by other tooling) and are never deleted or reconciled.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::name::trim_root;
use crate::util::push_hex;

/// The prefix shared by the names of all user-scoped keys.
pub const KEY_PREFIX: &str = "subzone-";

/// The number of random octets in a generated shared secret.
pub const SECRET_LEN: usize = 64;

/// The number of hash octets included in a user-scoped key name.
const KEY_HASH_LEN: usize = 20;

/// Generates a new shared secret: [`SECRET_LEN`] octets from the
/// operating system's secure random source, base64-encoded.
///
/// # Panics
///
/// Panics if the operating system's entropy source fails, which is not
/// something we can recover from.
pub fn generate_shared_secret() -> String {
    let mut secret = [0; SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    BASE64.encode(secret)
}

/// Returns the name of the user-scoped key for `user` in `zone`.
///
/// The name is derived from a SHA-256 hash of the user and the
/// normalized zone name, so the same pair always yields the same key
/// name and provisioning can be repeated safely.
pub fn deterministic_key_name(user: &str, zone: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(b"\0");
    hasher.update(trim_root(zone).to_ascii_lowercase().as_bytes());
    let digest = hasher.finalize();

    let mut name = String::with_capacity(KEY_PREFIX.len() + 2 * KEY_HASH_LEN);
    name.push_str(KEY_PREFIX);
    push_hex(&digest[..KEY_HASH_LEN], &mut name);
    name
}

/// Returns whether `key_name` names a user-scoped key.
pub fn is_user_key(key_name: &str) -> bool {
    key_name
        .get(..KEY_PREFIX.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(KEY_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_have_the_right_length_and_differ() {
        let a = generate_shared_secret();
        let b = generate_shared_secret();
        assert_eq!(BASE64.decode(&a).unwrap().len(), SECRET_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn key_names_are_deterministic() {
        let first = deterministic_key_name("alice", "a.b.c");
        let second = deterministic_key_name("alice", "a.b.c");
        assert_eq!(first, second);
        assert_eq!(first, deterministic_key_name("alice", "A.B.C."));
        assert!(first.starts_with(KEY_PREFIX));
        assert_eq!(first.len(), KEY_PREFIX.len() + 2 * KEY_HASH_LEN);
    }

    #[test]
    fn key_names_depend_on_user_and_zone() {
        let alice = deterministic_key_name("alice", "a.b.c");
        assert_ne!(alice, deterministic_key_name("bob", "a.b.c"));
        assert_ne!(alice, deterministic_key_name("alice", "x.b.c"));
        // The separator keeps ("ab", "c.d") and ("a", "bc.d") apart.
        assert_ne!(
            deterministic_key_name("ab", "c.d"),
            deterministic_key_name("a", "bc.d"),
        );
    }

    #[test]
    fn key_names_are_valid_labels() {
        let name = deterministic_key_name("alice@example.com", "alice.users.example.com");
        assert_eq!(crate::name::validate_label(&name), Ok(()));
    }

    #[test]
    fn is_user_key_checks_the_prefix() {
        assert!(is_user_key(&deterministic_key_name("alice", "a.b.c")));
        assert!(is_user_key("SUBZONE-abc."));
        assert!(!is_user_key("admin-key"));
        assert!(!is_user_key("sub"));
    }
}
