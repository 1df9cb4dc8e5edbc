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

//! An [`Authoritative`] implementation speaking the PowerDNS HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Authoritative, Error, NewZone, RrSet, ZoneKey};
use crate::name::{fqdn, trim_root};

/// The timeout applied to every API request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the API.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// The base URL of the server, e.g. `http://127.0.0.1:8081`.
    pub url: String,
    pub api_key: String,
    /// The server (virtual host) identifier, usually `localhost`.
    pub server_id: String,
}

/// A client for the PowerDNS HTTP API.
pub struct HttpAuthoritative {
    client: Client,
    base: String,
    api_key: String,
}

#[derive(Serialize)]
struct CreateZoneBody<'a> {
    name: String,
    kind: &'static str,
    nameservers: [&'static str; 0],
    rrsets: &'a [RrSet],
}

#[derive(Serialize)]
struct PatchBody<'a> {
    rrsets: &'a [RrSet],
}

#[derive(Deserialize, Serialize)]
struct MetadataBody {
    kind: String,
    #[serde(default)]
    metadata: Vec<String>,
}

#[derive(Deserialize, Serialize)]
struct KeyBody {
    name: String,
    algorithm: String,
    #[serde(default)]
    key: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

impl HttpAuthoritative {
    pub fn new(config: &HttpConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base: format!(
                "{}/api/v1/servers/{}",
                config.url.trim_end_matches('/'),
                config.server_id,
            ),
            api_key: config.api_key.clone(),
        })
    }

    fn zones_url(&self) -> String {
        format!("{}/zones", self.base)
    }

    fn zone_url(&self, zone: &str) -> String {
        format!("{}/zones/{}", self.base, fqdn(zone))
    }

    fn metadata_url(&self, zone: &str, kind: &str) -> String {
        format!("{}/metadata/{}", self.zone_url(zone), kind)
    }

    fn key_url(&self, name: &str) -> String {
        format!("{}/tsigkeys/{}", self.base, fqdn(name))
    }

    /// Sends a request, turning error statuses into [`Error`]s.
    async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let response = request.header("X-API-Key", &self.api_key).send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();
        Err(classify(status, message))
    }
}

/// Classifies an error response. PowerDNS reports some missing objects
/// and conflicts with 422 rather than 404 and 409, so the message is
/// consulted too.
fn classify(status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound,
        StatusCode::CONFLICT => Error::Conflict,
        StatusCode::UNPROCESSABLE_ENTITY if message.contains("Could not find") => Error::NotFound,
        StatusCode::UNPROCESSABLE_ENTITY
            if message.contains("Conflict") || message.contains("already exists") =>
        {
            Error::Conflict
        }
        _ => Error::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Authoritative for HttpAuthoritative {
    async fn zone_exists(&self, zone: &str) -> Result<bool, Error> {
        let request = self
            .client
            .get(self.zone_url(zone))
            .query(&[("rrsets", "false")]);
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn create_zone(&self, zone: &NewZone) -> Result<(), Error> {
        let body = CreateZoneBody {
            name: fqdn(&zone.name),
            kind: "Native",
            nameservers: [],
            rrsets: &zone.rrsets,
        };
        self.send(self.client.post(self.zones_url()).json(&body))
            .await
            .map(drop)
    }

    async fn delete_zone(&self, zone: &str) -> Result<(), Error> {
        self.send(self.client.delete(self.zone_url(zone)))
            .await
            .map(drop)
    }

    async fn patch_rrsets(&self, zone: &str, rrsets: &[RrSet]) -> Result<(), Error> {
        let body = PatchBody { rrsets };
        self.send(self.client.patch(self.zone_url(zone)).json(&body))
            .await
            .map(drop)
    }

    async fn get_metadata(&self, zone: &str, kind: &str) -> Result<Vec<String>, Error> {
        let response = self
            .send(self.client.get(self.metadata_url(zone, kind)))
            .await?;
        Ok(response.json::<MetadataBody>().await?.metadata)
    }

    async fn set_metadata(&self, zone: &str, kind: &str, values: &[String]) -> Result<(), Error> {
        let url = self.metadata_url(zone, kind);
        let request = if values.is_empty() {
            self.client.delete(url)
        } else {
            self.client.put(url).json(&MetadataBody {
                kind: kind.to_owned(),
                metadata: values.to_vec(),
            })
        };
        self.send(request).await.map(drop)
    }

    async fn get_key(&self, name: &str) -> Result<ZoneKey, Error> {
        let response = self.send(self.client.get(self.key_url(name))).await?;
        let body: KeyBody = response.json().await?;
        Ok(ZoneKey {
            name: trim_root(&body.name).to_owned(),
            algorithm: trim_root(&body.algorithm).to_owned(),
            secret: body.key,
        })
    }

    async fn create_key(&self, key: &ZoneKey) -> Result<(), Error> {
        let body = KeyBody {
            name: trim_root(&key.name).to_owned(),
            algorithm: key.algorithm.clone(),
            key: key.secret.clone(),
        };
        let url = format!("{}/tsigkeys", self.base);
        self.send(self.client.post(url).json(&body)).await.map(drop)
    }

    async fn delete_key(&self, name: &str) -> Result<(), Error> {
        self.send(self.client.delete(self.key_url(name)))
            .await
            .map(drop)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
