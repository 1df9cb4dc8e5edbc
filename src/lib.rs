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

//! Subzone provisions per-user DNS delegation zones on an authoritative
//! DNS server and keeps them healthy.
//!
//! The [`zone`] module drives the server's management API to build
//! delegation chains and install the shared-secret keys users update
//! their zones with. The [`client`] module speaks the DNS protocol
//! directly for signed dynamic updates and zone transfers. Who may have
//! which zone is decided by the [`policy`] module, and the [`service`]
//! module ties these together for a request layer. Two background loops
//! keep things converging: [`reconcile`] repairs zones that went
//! missing or broke, and [`upstream`] keeps this service's own address
//! registered with an upstream nameserver.

pub mod api;
pub mod class;
pub mod client;
pub mod error;
pub mod message;
pub mod name;
pub mod policy;
pub mod reconcile;
pub mod rr;
pub mod secret;
pub mod service;
pub mod store;
pub mod upstream;
mod util;
pub mod zone;

pub use error::{Error, Status};
