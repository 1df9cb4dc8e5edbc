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

//! The webhook zone provider.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use moka::future::Cache;
use reqwest::Client;
use tokio::task::JoinHandle;

use super::{Error, User, UserZone};

/// How often expired cache entries are evicted.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// The configuration of a [`WebhookProvider`].
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub url: String,
    /// The bearer token sent with every request.
    pub token: String,
    /// How long answers are cached.
    pub ttl: Duration,
    /// The maximum number of users whose answers are cached.
    pub max_entries: u64,
    pub timeout: Duration,
}

/// A provider that asks a remote endpoint for each user's zones.
///
/// The user is POSTed as JSON, and the endpoint answers with a JSON
/// array of `{"zone": ..., "zone_soa": ...}` objects. Answers are cached
/// per user subject for the configured TTL, in a cache of bounded size.
/// A background task evicts expired entries until the provider is
/// stopped or dropped.
pub struct WebhookProvider {
    client: Client,
    url: String,
    token: String,
    cache: Cache<String, Arc<Vec<UserZone>>>,
    maintenance: JoinHandle<()>,
}

impl WebhookProvider {
    /// Creates the provider. This must be called within a Tokio
    /// runtime, since it spawns the cache maintenance task.
    pub fn new(config: WebhookConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        let maintenance = tokio::spawn(maintain(cache.clone()));
        Ok(Self {
            client,
            url: config.url,
            token: config.token,
            cache,
            maintenance,
        })
    }

    /// Returns the user's zones, from the cache if possible.
    pub async fn user_zones(&self, user: &User) -> Result<Vec<UserZone>, Error> {
        if let Some(zones) = self.cache.get(&user.subject).await {
            return Ok(zones.as_ref().clone());
        }
        let zones = self.fetch(user).await?;
        self.cache
            .insert(user.subject.clone(), Arc::new(zones.clone()))
            .await;
        Ok(zones)
    }

    async fn fetch(&self, user: &User) -> Result<Vec<UserZone>, Error> {
        debug!("Asking the policy webhook for the zones of {}.", user.subject);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(user)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::WebhookStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Stops the cache maintenance task.
    pub fn stop(&self) {
        self.maintenance.abort();
    }
}

impl Drop for WebhookProvider {
    fn drop(&mut self) {
        self.maintenance.abort();
    }
}

async fn maintain(cache: Cache<String, Arc<Vec<UserZone>>>) {
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        interval.tick().await;
        cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn config(server: &MockServer, ttl: Duration) -> WebhookConfig {
        WebhookConfig {
            url: server.url("/zones"),
            token: String::from("t0ken"),
            ttl,
            max_entries: 100,
            timeout: Duration::from_secs(5),
        }
    }

    fn user(subject: &str) -> User {
        User {
            subject: subject.to_owned(),
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            groups: vec![String::from("staff")],
        }
    }

    #[tokio::test]
    async fn answers_are_cached_per_subject() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/zones")
                    .header("authorization", "Bearer t0ken")
                    .json_body_partial(r#"{"username": "alice"}"#);
                then.status(200).json_body(json!([
                    {"zone": "alice.users.example.com", "zone_soa": "users.example.com"},
                ]));
            })
            .await;
        let provider = WebhookProvider::new(config(&server, Duration::from_secs(60))).unwrap();

        let first = provider.user_zones(&user("sub-1")).await.unwrap();
        let second = provider.user_zones(&user("sub-1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].zone, "alice.users.example.com");
        assert_eq!(mock.hits_async().await, 1);

        provider.user_zones(&user("sub-2")).await.unwrap();
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn the_cache_holds_at_most_max_entries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/zones");
                then.status(200).json_body(json!([]));
            })
            .await;
        let provider = WebhookProvider::new(WebhookConfig {
            max_entries: 1,
            ..config(&server, Duration::from_secs(60))
        })
        .unwrap();

        provider.user_zones(&user("sub-1")).await.unwrap();
        provider.user_zones(&user("sub-2")).await.unwrap();
        provider.cache.run_pending_tasks().await;
        assert_eq!(provider.cache.entry_count(), 1);
        assert_eq!(mock.hits_async().await, 2);

        // The subject that did not keep its place is fetched again.
        let evicted = if provider.cache.contains_key("sub-1") {
            "sub-2"
        } else {
            "sub-1"
        };
        provider.user_zones(&user(evicted)).await.unwrap();
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn answers_expire() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/zones");
                then.status(200).json_body(json!([]));
            })
            .await;
        let provider = WebhookProvider::new(config(&server, Duration::from_millis(100))).unwrap();

        provider.user_zones(&user("sub-1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        provider.user_zones(&user("sub-1")).await.unwrap();
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/zones");
                then.status(503);
            })
            .await;
        let provider = WebhookProvider::new(config(&server, Duration::from_secs(60))).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                provider.user_zones(&user("sub-1")).await,
                Err(Error::WebhookStatus(503)),
            ));
        }
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn stopping_ends_the_maintenance_task() {
        let server = MockServer::start_async().await;
        let provider = WebhookProvider::new(config(&server, Duration::from_secs(60))).unwrap();
        provider.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.maintenance.is_finished());
    }
}
