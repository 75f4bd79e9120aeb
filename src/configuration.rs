// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use std::time::Duration;
use structopt::StructOpt;

/// Set once at startup from the command line, immutable afterwards.
#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "wss-monitor", about = "Prints the working set size of a process.")]
pub struct AppConfig {
    /// The process to print the working set size of.
    #[structopt(short, long)]
    pub pid: u32,
    /// Sampling interval in seconds.
    #[structopt(long, default_value = "5")]
    pub interval: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig::from_args()
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}
