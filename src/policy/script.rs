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

//! The script zone provider.
//!
//! The operator supplies a [Rhai] script defining the entry point
//! [`LIST_ZONES`]`(user)`, which returns an array of
//! `#{zone: ..., zone_soa: ...}` maps, and optionally
//! [`IS_ZONE_ALLOWED`]`(user, zone)`, which returns a map
//! `#{isAllowed: bool, zoneResponse: #{zone, zone_soa}, errorMessage:
//! string}`. The user is passed as a map of the [`User`] fields.
//!
//! The interpreter runs with limits on operations, call depth, and
//! data sizes, and without access to modules on the file system. Data
//! crosses into and out of the script only through serialization.
//! Entry points run on Tokio's blocking thread pool, one at a time.
//!
//! [Rhai]: https://rhai.rs

use std::sync::{Arc, Mutex, PoisonError};

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST};
use serde::Deserialize;

use super::{Error, User, UserZone};

/// The name of the zone-listing entry point.
pub const LIST_ZONES: &str = "list_zones";

/// The name of the optional zone-allowing entry point.
pub const IS_ZONE_ALLOWED: &str = "is_zone_allowed";

const MAX_OPERATIONS: u64 = 100_000;
const MAX_CALL_LEVELS: usize = 32;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FUNCTION_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 16 * 1024;
const MAX_COLLECTION_SIZE: usize = 4096;

/// The interpreter state. It is not safe to enter concurrently, so it
/// lives behind the provider's lock.
struct Interpreter {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
}

/// The answer of the [`IS_ZONE_ALLOWED`] entry point.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllowedResponse {
    is_allowed: bool,
    #[serde(default)]
    zone_response: Option<UserZone>,
    #[serde(default)]
    error_message: String,
}

/// A provider running an operator-supplied script.
pub struct ScriptProvider {
    interpreter: Arc<Mutex<Interpreter>>,
    has_allow_entry_point: bool,
}

impl ScriptProvider {
    /// Compiles `source` and runs its top-level statements once.
    pub fn new(source: &str) -> Result<Self, Error> {
        let mut engine = Engine::new();
        engine
            .set_max_operations(MAX_OPERATIONS)
            .set_max_call_levels(MAX_CALL_LEVELS)
            .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH)
            .set_max_string_size(MAX_STRING_SIZE)
            .set_max_array_size(MAX_COLLECTION_SIZE)
            .set_max_map_size(MAX_COLLECTION_SIZE)
            .set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");

        let ast = engine.compile(source).map_err(script_error)?;
        let defines = |name: &str, arity: usize| {
            ast.iter_functions()
                .any(|f| f.name == name && f.params.len() == arity)
        };
        if !defines(LIST_ZONES, 1) {
            return Err(Error::Script(format!(
                "the script does not define {}(user)",
                LIST_ZONES,
            )));
        }
        let has_allow_entry_point = defines(IS_ZONE_ALLOWED, 2);

        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(script_error)?;
        Ok(Self {
            interpreter: Arc::new(Mutex::new(Interpreter { engine, ast, scope })),
            has_allow_entry_point,
        })
    }

    /// Returns whether the script defines [`IS_ZONE_ALLOWED`].
    pub fn has_allow_entry_point(&self) -> bool {
        self.has_allow_entry_point
    }

    pub async fn user_zones(&self, user: &User) -> Result<Vec<UserZone>, Error> {
        let user = rhai::serde::to_dynamic(user).map_err(script_error)?;
        let result = self.call(LIST_ZONES, (user,)).await?;
        rhai::serde::from_dynamic(&result).map_err(script_error)
    }

    pub async fn is_allowed_zone(
        &self,
        user: &User,
        zone: &str,
    ) -> Result<Option<UserZone>, Error> {
        let user = rhai::serde::to_dynamic(user).map_err(script_error)?;
        let args = (user, Dynamic::from(zone.to_owned()));
        let result = self.call(IS_ZONE_ALLOWED, args).await?;
        let response: AllowedResponse = rhai::serde::from_dynamic(&result).map_err(script_error)?;

        if !response.error_message.is_empty() {
            Err(Error::Script(response.error_message))
        } else if !response.is_allowed {
            Ok(None)
        } else {
            response.zone_response.map(Some).ok_or_else(|| {
                Error::Script(String::from("zone allowed without a zoneResponse"))
            })
        }
    }

    /// Calls the entry point `name` on the blocking thread pool, so a
    /// long-running script (or a wait for the lock) does not hold up a
    /// runtime worker.
    async fn call<A>(&self, name: &'static str, args: A) -> Result<Dynamic, Error>
    where
        A: rhai::FuncArgs + Send + 'static,
    {
        let interpreter = self.interpreter.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = interpreter.lock().unwrap_or_else(PoisonError::into_inner);
            let Interpreter { engine, ast, scope } = &mut *guard;
            // The top-level statements already ran in the constructor.
            let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
            engine
                .call_fn_with_options::<Dynamic>(options, scope, ast, name, args)
                .map_err(script_error)
        })
        .await
        .map_err(|err| Error::Script(format!("script task failed: {}", err)))?
    }
}

fn script_error(err: impl std::fmt::Display) -> Error {
    Error::Script(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const SCRIPT: &str = r#"
        fn list_zones(user) {
            [#{ zone: user.username + ".users.example.com", zone_soa: "users.example.com" }]
        }

        fn is_zone_allowed(user, zone) {
            if user.groups.contains("admins") && zone.ends_with(".admins.example.com") {
                #{ isAllowed: true,
                   zoneResponse: #{ zone: zone, zone_soa: "admins.example.com" },
                   errorMessage: "" }
            } else if zone == "forbidden.example.com" {
                #{ isAllowed: false, errorMessage: "this zone is reserved" }
            } else {
                #{ isAllowed: false, zoneResponse: (), errorMessage: "" }
            }
        }
    "#;

    fn user(groups: &[&str]) -> User {
        User {
            subject: String::from("sub-1"),
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn list_zones_is_called_with_the_user() {
        let provider = ScriptProvider::new(SCRIPT).unwrap();
        assert_eq!(
            provider.user_zones(&user(&[])).await.unwrap(),
            [UserZone {
                zone: String::from("alice.users.example.com"),
                zone_soa: String::from("users.example.com"),
            }],
        );
    }

    #[tokio::test]
    async fn is_zone_allowed_answers_are_interpreted() {
        let provider = ScriptProvider::new(SCRIPT).unwrap();
        assert!(provider.has_allow_entry_point());
        assert_eq!(
            provider
                .is_allowed_zone(&user(&["admins"]), "x.admins.example.com")
                .await
                .unwrap(),
            Some(UserZone {
                zone: String::from("x.admins.example.com"),
                zone_soa: String::from("admins.example.com"),
            }),
        );
        assert_eq!(
            provider
                .is_allowed_zone(&user(&[]), "x.admins.example.com")
                .await
                .unwrap(),
            None,
        );
        assert!(matches!(
            provider.is_allowed_zone(&user(&[]), "forbidden.example.com").await,
            Err(Error::Script(message)) if message == "this zone is reserved",
        ));
    }

    #[test]
    fn missing_entry_points_are_rejected() {
        assert!(matches!(
            ScriptProvider::new("fn other(user) { [] }"),
            Err(Error::Script(_)),
        ));
        let provider = ScriptProvider::new("fn list_zones(user) { [] }").unwrap();
        assert!(!provider.has_allow_entry_point());
    }

    #[tokio::test]
    async fn waiting_for_the_interpreter_does_not_block_the_runtime() {
        let provider = Arc::new(ScriptProvider::new(SCRIPT).unwrap());
        let guard = provider.interpreter.lock().unwrap();

        // The test runtime has a single thread, so the sleep below only
        // completes if the pending call is not holding that thread.
        let pending = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.user_zones(&user(&[])).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(guard);
        let zones = pending.await.unwrap().unwrap();
        assert_eq!(zones.len(), 1);
    }

    #[tokio::test]
    async fn runaway_scripts_are_stopped() {
        let provider = ScriptProvider::new("fn list_zones(user) { loop { } }").unwrap();
        assert!(matches!(provider.user_zones(&user(&[])).await, Err(Error::Script(_))));
    }

    #[tokio::test]
    async fn script_errors_surface() {
        let provider =
            ScriptProvider::new(r#"fn list_zones(user) { throw "no zones for you"; }"#).unwrap();
        match provider.user_zones(&user(&[])).await {
            Err(Error::Script(message)) => assert!(message.contains("no zones for you")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_results_are_errors() {
        let provider = ScriptProvider::new(r#"fn list_zones(user) { 42 }"#).unwrap();
        assert!(matches!(provider.user_zones(&user(&[])).await, Err(Error::Script(_))));
    }
}
