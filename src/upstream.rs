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

//! Self-registration with an upstream nameserver.
//!
//! The [`Updater`] keeps an address record on an upstream server
//! pointing at this service. Every iteration it looks the record up,
//! and if the first address is not the configured one, it deletes the
//! old record (if there was one) and adds the right one with a signed
//! dynamic update. Each iteration stands on its own: failures are
//! logged, and the next iteration tries again from scratch.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::client::{self, Client, TsigKey};
use crate::name;
use crate::rr::AddressFamily;

/// The DNS operations the updater needs.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Returns the addresses of `name`, IPv4 first.
    async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, client::Error>;

    /// Deletes the address records of `family` for `name` in `zone`.
    async fn delete(
        &self,
        zone: &str,
        name: &str,
        family: AddressFamily,
        key: &TsigKey,
    ) -> Result<(), client::Error>;

    /// Adds an address record for `name` in `zone`.
    async fn add(
        &self,
        zone: &str,
        name: &str,
        address: IpAddr,
        ttl: u32,
        key: &TsigKey,
    ) -> Result<(), client::Error>;
}

#[async_trait]
impl Registrar for Client {
    async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, client::Error> {
        self.lookup_addresses(name).await
    }

    async fn delete(
        &self,
        zone: &str,
        name: &str,
        family: AddressFamily,
        key: &TsigKey,
    ) -> Result<(), client::Error> {
        self.delete_address(zone, name, family, key).await
    }

    async fn add(
        &self,
        zone: &str,
        name: &str,
        address: IpAddr,
        ttl: u32,
        key: &TsigKey,
    ) -> Result<(), client::Error> {
        self.add_address(zone, name, address, ttl, key).await
    }
}

/// The configuration of an [`Updater`].
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    /// The upstream zone the record lives in.
    pub zone: String,

    /// The record name, relative to the zone or fully qualified.
    pub name: String,

    /// The address the record should hold.
    pub address: IpAddr,

    pub ttl: u32,
    pub interval: Duration,
    pub key: TsigKey,
}

/// The result of one iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The record already held the right address.
    UpToDate,

    /// The record was (re)written.
    Repaired,

    /// The lookup or the addition failed.
    Failed,
}

/// Keeps an upstream address record pointing at this service.
pub struct Updater<R> {
    registrar: R,
    config: UpdaterConfig,
}

impl<R: Registrar> Updater<R> {
    pub fn new(registrar: R, config: UpdaterConfig) -> Self {
        Self { registrar, config }
    }

    /// Runs iterations forever, one per configured interval.
    pub async fn run(&self) {
        loop {
            self.run_once().await;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Runs a single iteration.
    pub async fn run_once(&self) -> Outcome {
        let config = &self.config;
        let fqdn = name::qualify(&config.name, &config.zone);

        let current = match self.registrar.lookup(&fqdn).await {
            Ok(addresses) => addresses.first().copied(),
            Err(err) => {
                warn!("Failed to look up {}: {}", fqdn, err);
                return Outcome::Failed;
            }
        };
        if current == Some(config.address) {
            debug!("{} already points at {}.", fqdn, config.address);
            return Outcome::UpToDate;
        }

        if let Some(old) = current {
            info!("{} points at {} instead of {}; fixing.", fqdn, old, config.address);
            let family = AddressFamily::of(old);
            if let Err(err) = self
                .registrar
                .delete(&config.zone, &config.name, family, &config.key)
                .await
            {
                warn!("Failed to delete the old record of {} (continuing): {}", fqdn, err);
            }
        } else {
            info!("{} has no address; adding {}.", fqdn, config.address);
        }

        match self
            .registrar
            .add(&config.zone, &config.name, config.address, config.ttl, &config.key)
            .await
        {
            Ok(()) => Outcome::Repaired,
            Err(err) => {
                warn!("Failed to add the record of {}: {}", fqdn, err);
                Outcome::Failed
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::client::testing::FakeServer;
    use crate::client::Algorithm;
    use crate::message::Rcode;
    use crate::rr::Type;

    fn key() -> TsigKey {
        TsigKey::new("upstream-key.example.", Algorithm::HmacSha256, b"secret".to_vec()).unwrap()
    }

    fn config(address: &str) -> UpdaterConfig {
        UpdaterConfig {
            zone: String::from("example.com"),
            name: String::from("dns"),
            address: address.parse().unwrap(),
            ttl: 300,
            interval: Duration::from_secs(60),
            key: key(),
        }
    }

    /// A registrar that records the calls made to it.
    #[derive(Default)]
    struct MockRegistrar {
        addresses: Vec<IpAddr>,
        fail_lookup: bool,
        fail_delete: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockRegistrar {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Registrar for MockRegistrar {
        async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, client::Error> {
            self.calls.lock().unwrap().push(format!("lookup {}", name));
            if self.fail_lookup {
                Err(client::Error::Timeout)
            } else {
                Ok(self.addresses.clone())
            }
        }

        async fn delete(
            &self,
            _zone: &str,
            name: &str,
            family: AddressFamily,
            _key: &TsigKey,
        ) -> Result<(), client::Error> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {} {}", name, family.rr_type()));
            if self.fail_delete {
                Err(client::Error::Rcode(Rcode::ServFail))
            } else {
                Ok(())
            }
        }

        async fn add(
            &self,
            _zone: &str,
            name: &str,
            address: IpAddr,
            _ttl: u32,
            _key: &TsigKey,
        ) -> Result<(), client::Error> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add {} {}", name, address));
            Ok(())
        }
    }

    #[tokio::test]
    async fn matching_records_are_left_alone() {
        let registrar = MockRegistrar {
            addresses: vec!["192.0.2.1".parse().unwrap()],
            ..MockRegistrar::default()
        };
        let updater = Updater::new(registrar, config("192.0.2.1"));
        assert_eq!(updater.run_once().await, Outcome::UpToDate);
        assert_eq!(updater.registrar.calls(), ["lookup dns.example.com"]);
    }

    #[tokio::test]
    async fn mismatched_records_are_replaced() {
        let registrar = MockRegistrar {
            addresses: vec!["2001:db8::1".parse().unwrap()],
            ..MockRegistrar::default()
        };
        let updater = Updater::new(registrar, config("192.0.2.1"));
        assert_eq!(updater.run_once().await, Outcome::Repaired);
        assert_eq!(
            updater.registrar.calls(),
            ["lookup dns.example.com", "delete dns AAAA", "add dns 192.0.2.1"],
        );
    }

    #[tokio::test]
    async fn missing_records_are_added_without_a_delete() {
        let updater = Updater::new(MockRegistrar::default(), config("192.0.2.1"));
        assert_eq!(updater.run_once().await, Outcome::Repaired);
        assert_eq!(
            updater.registrar.calls(),
            ["lookup dns.example.com", "add dns 192.0.2.1"],
        );
    }

    #[tokio::test]
    async fn delete_failures_are_not_fatal() {
        let registrar = MockRegistrar {
            addresses: vec!["192.0.2.7".parse().unwrap()],
            fail_delete: true,
            ..MockRegistrar::default()
        };
        let updater = Updater::new(registrar, config("192.0.2.1"));
        assert_eq!(updater.run_once().await, Outcome::Repaired);
        assert_eq!(updater.registrar.calls().len(), 3);
    }

    #[tokio::test]
    async fn lookup_failures_skip_the_iteration() {
        let registrar = MockRegistrar {
            fail_lookup: true,
            ..MockRegistrar::default()
        };
        let updater = Updater::new(registrar, config("192.0.2.1"));
        assert_eq!(updater.run_once().await, Outcome::Failed);
        assert_eq!(updater.registrar.calls().len(), 1);
    }

    #[tokio::test]
    async fn self_heals_against_a_real_exchange() {
        let server = FakeServer::start("example.com", key()).await;
        server.insert("dns.example.com", Type::A, 300, &[192, 0, 2, 7]);
        let client = Client::new(server.addr());
        let updater = Updater::new(client.clone(), config("192.0.2.1"));

        assert_eq!(updater.run_once().await, Outcome::Repaired);
        assert_eq!(server.updates_received(), 2);
        assert_eq!(
            client.lookup_addresses("dns.example.com").await.unwrap(),
            ["192.0.2.1".parse::<IpAddr>().unwrap()],
        );

        assert_eq!(updater.run_once().await, Outcome::UpToDate);
        assert_eq!(server.updates_received(), 2);
    }
}
