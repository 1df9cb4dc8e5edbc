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

//! Implements command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use subzone::policy::User;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The Subzone delegation zone manager
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon
    Run(RunArgs),

    /// Show the zones the configured policy allows a user
    Zones(ZonesArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Set the configuration file to use
    #[clap(long, value_name = "FILE")]
    pub config: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ZonesArgs {
    /// Set the configuration file to use
    #[clap(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Set the user's name
    #[clap(long)]
    pub username: String,

    /// Set the user's email address
    #[clap(long, default_value = "")]
    pub email: String,

    /// Set the user's stable identifier (defaults to the username)
    #[clap(long)]
    pub subject: Option<String>,

    /// Add a group the user belongs to
    #[clap(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Only check whether this zone is allowed
    #[clap(long, value_name = "NAME")]
    pub zone: Option<String>,
}

impl ZonesArgs {
    /// Returns the user described by the arguments.
    pub fn user(&self) -> User {
        User {
            subject: self.subject.clone().unwrap_or_else(|| self.username.clone()),
            username: self.username.clone(),
            email: self.email.clone(),
            groups: self.groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_args_describe_the_user() {
        let args = Args::try_parse_from([
            "subzoned",
            "zones",
            "--config",
            "subzone.toml",
            "--username",
            "alice",
            "--group",
            "staff",
            "--group",
            "admins",
        ])
        .unwrap();
        let Command::Zones(zones_args) = args.command else {
            panic!("parsed the wrong command");
        };
        let user = zones_args.user();
        assert_eq!(user.subject, "alice");
        assert_eq!(user.groups, ["staff", "admins"]);
        assert_eq!(zones_args.zone, None);
    }

    #[test]
    fn run_requires_a_configuration_file() {
        assert!(Args::try_parse_from(["subzoned", "run"]).is_err());
    }
}
