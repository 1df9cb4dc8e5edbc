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

//! Policy rules: matching of target-user filters and validation.
//!
//! A rule's target-user filter is either an email address, matched
//! exactly, or a pattern with a single `*` wildcard (such as
//! `*@example.com`), matched by prefix and suffix. Matching ignores
//! ASCII case. Users see the rules whose filter matches their email;
//! super-administrators see, and may change, all rules.

use std::collections::HashSet;

use super::Error;
use crate::name::{is_subdomain_of, validate_domain_name};
use crate::store::{NewRule, PolicyRule};

/// The token in a zone pattern that stands for the user.
pub const USER_PLACEHOLDER: &str = "{user}";

/// What the placeholder is replaced with for validation.
const PLACEHOLDER_SUBSTITUTE: &str = "x";

/// The set of super-administrators, by email address.
#[derive(Clone, Debug, Default)]
pub struct SuperAdmins(HashSet<String>);

impl SuperAdmins {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            emails
                .into_iter()
                .map(|email| email.as_ref().trim().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(&email.trim().to_ascii_lowercase())
    }
}

/// Returns whether `email` matches the target-user `filter`.
///
/// A filter with more than one `*` never matches; such filters are
/// rejected by [`validate_target_user`].
pub fn matches_user(email: &str, filter: &str) -> bool {
    let email = email.trim().to_ascii_lowercase();
    let filter = filter.trim().to_ascii_lowercase();
    match filter.split_once('*') {
        None => email == filter,
        Some((_, suffix)) if suffix.contains('*') => false,
        Some((prefix, suffix)) => {
            email.len() >= prefix.len() + suffix.len()
                && email.starts_with(prefix)
                && email.ends_with(suffix)
        }
    }
}

/// Validates a target-user filter.
pub fn validate_target_user(filter: &str) -> Result<(), Error> {
    let filter = filter.trim();
    if filter.is_empty() {
        Err(Error::InvalidRule(String::from("the target user is empty")))
    } else if filter.matches('*').count() > 1 {
        Err(Error::InvalidRule(String::from(
            "the target user has more than one wildcard",
        )))
    } else {
        Ok(())
    }
}

/// Validates a zone pattern, which must be a valid domain name once
/// the user placeholder is substituted.
pub fn validate_zone_pattern(pattern: &str) -> Result<(), Error> {
    let substituted = pattern.replace(USER_PLACEHOLDER, PLACEHOLDER_SUBSTITUTE);
    validate_domain_name(substituted.trim())
        .map_err(|err| Error::InvalidRule(format!("invalid zone pattern {:?}: {}", pattern, err)))
}

/// Validates all fields of a rule. The zone pattern must also lie
/// within the rule's start of authority.
pub fn validate_rule(rule: &NewRule) -> Result<(), Error> {
    validate_zone_pattern(&rule.zone_pattern)?;
    validate_domain_name(rule.zone_soa.trim()).map_err(|err| {
        Error::InvalidRule(format!("invalid zone SOA {:?}: {}", rule.zone_soa, err))
    })?;
    validate_target_user(&rule.target_user)?;

    let substituted = rule
        .zone_pattern
        .replace(USER_PLACEHOLDER, PLACEHOLDER_SUBSTITUTE);
    if is_subdomain_of(substituted.trim(), rule.zone_soa.trim()) {
        Ok(())
    } else {
        Err(Error::InvalidRule(format!(
            "zone pattern {:?} is not within {:?}",
            rule.zone_pattern, rule.zone_soa,
        )))
    }
}

/// Filters `rules` down to those visible to `email`.
pub fn visible_rules(
    rules: Vec<PolicyRule>,
    email: &str,
    super_admins: &SuperAdmins,
) -> Vec<PolicyRule> {
    if super_admins.contains(email) {
        rules
    } else {
        rules
            .into_iter()
            .filter(|rule| matches_user(email, &rule.target_user))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: u64, target_user: &str) -> PolicyRule {
        PolicyRule {
            id,
            zone_pattern: String::from("{user}.users.example.com"),
            zone_soa: String::from("users.example.com"),
            target_user: target_user.to_owned(),
            description: String::new(),
        }
    }

    #[test]
    fn wildcard_matching() {
        assert!(matches_user("alice@example.com", "*@example.com"));
        assert!(!matches_user("alice@example.org", "*@example.com"));
        assert!(matches_user("alice@example.com", "alice@example.com"));
        assert!(matches_user("Alice@Example.COM", "alice@example.com"));
        assert!(matches_user("alice@example.com", "alice@*"));
        assert!(matches_user("alice@example.com", "a*m"));
        assert!(!matches_user("bob@example.com", "alice@example.com"));
        assert!(!matches_user("alice@example.com", "*@*.com"));
    }

    #[test]
    fn prefix_and_suffix_may_not_overlap() {
        assert!(!matches_user("ab", "ab*b"));
        assert!(matches_user("abb", "ab*b"));
    }

    #[test]
    fn target_user_validation() {
        assert!(validate_target_user("*@example.com").is_ok());
        assert!(validate_target_user("alice@example.com").is_ok());
        assert!(matches!(
            validate_target_user("*@*.example.com"),
            Err(Error::InvalidRule(_)),
        ));
        assert!(validate_target_user("  ").is_err());
    }

    #[test]
    fn zone_pattern_validation_substitutes_the_placeholder() {
        assert!(validate_zone_pattern("{user}.users.example.com").is_ok());
        assert!(validate_zone_pattern(" {user}.users.example.com ").is_ok());
        assert!(validate_zone_pattern("{user}").is_err());
        assert!(validate_zone_pattern("{user}..example.com").is_err());
        assert!(validate_zone_pattern("{user}-.example.com").is_err());
    }

    #[test]
    fn rules_must_lie_within_their_soa() {
        let mut new = NewRule {
            zone_pattern: String::from("{user}.users.example.com"),
            zone_soa: String::from("users.example.com"),
            target_user: String::from("*@example.com"),
            description: String::new(),
        };
        assert!(validate_rule(&new).is_ok());
        new.zone_soa = String::from("example.org");
        assert!(validate_rule(&new).is_err());
    }

    #[test]
    fn visibility_depends_on_the_requester() {
        let admins = SuperAdmins::new(["Root@Example.com"]);
        let rules = vec![rule(1, "*@example.com"), rule(2, "bob@example.org")];

        let visible: Vec<u64> = visible_rules(rules.clone(), "alice@example.com", &admins)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(visible, [1]);

        let visible: Vec<u64> = visible_rules(rules, "root@example.com", &admins)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(visible, [1, 2]);
    }
}
