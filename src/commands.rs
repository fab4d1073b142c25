//! CLI command definitions
//!
//! Defines the clap commands for the control client.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::common::config::ConnectionConfig;
use crate::testing::Tier;

/// Connection flags shared by every command that talks to the engine
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Engine host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Engine control port (overrides config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Seconds to wait for the connection (overrides config)
    #[arg(long, global = true)]
    pub connect_timeout: Option<u64>,
}

impl ConnectionArgs {
    /// Apply the flags on top of configured values
    pub fn apply(&self, config: &mut ConnectionConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout_secs = secs;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and run the liveness probe
    Ping,

    /// Send a single request and print the outcome
    Send {
        /// Target service (e.g. clipboard, wifi)
        target: String,

        /// Method on the target (e.g. getClipboard)
        method: String,

        /// Parameters as a JSON object
        #[arg(long, conflicts_with = "example")]
        params: Option<String>,

        /// Use the catalog's example parameters
        #[arg(long)]
        example: bool,
    },

    /// List the targets the engine routes
    Targets,

    /// List the methods of a target
    Methods {
        /// Target name
        target: String,
    },

    /// Show the label and example parameters of a method
    Describe {
        /// Target name
        target: String,

        /// Method name
        method: String,
    },

    /// Run a tier of the capability test plan
    Test {
        /// Tier to run; lower tiers are included
        #[arg(long, short, value_enum, default_value_t = Tier::Safe)]
        tier: Tier,

        /// YAML plan to use instead of the built-in one
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Pause between cases in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive console
    Console,

    /// View console logs
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },
}
