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

//! Implements the `zones` command, which evaluates the configured zone
//! access policy for a user.

use anyhow::{Context, Result};
use tokio::runtime;

use subzone::policy::rules::SuperAdmins;

use crate::args::ZonesArgs;
use crate::run::{exit_with_error, init_logging, load_config};

pub fn run(args: ZonesArgs) {
    init_logging("warn");
    if let Err(e) = try_running(args) {
        exit_with_error("Failed to evaluate the policy", e);
    }
}

fn try_running(args: ZonesArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the Tokio runtime")?;
    let _guard = runtime.enter();
    let provider = config
        .policy
        .provider
        .build()
        .context("failed to set up the zone access policy")?;

    let user = args.user();
    if SuperAdmins::new(&config.policy.super_admins).contains(&user.email) {
        println!("{} is a super-administrator.", user.username);
    }

    runtime.block_on(async {
        match args.zone {
            Some(ref zone) => match provider.is_allowed_zone(&user, zone).await? {
                Some(allowed) => println!(
                    "{} is allowed for {}, delegated from {}.",
                    allowed.zone, user.username, allowed.zone_soa,
                ),
                None => println!("{} is not allowed for {}.", zone, user.username),
            },
            None => {
                let zones = provider.user_zones(&user).await?;
                println!("{}", serde_json::to_string_pretty(&zones)?);
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}
