// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Matching service entry point
//!
//! Wires up the fund directory, the matching service and the scheduler,
//! then runs until Ctrl-C. Configuration comes from the file given as
//! the first argument (if any) plus `MATCHING_*` environment variables.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::signal;
use tracing::info;

use ccq_matching::{
	FundMatchingService, MatchScheduler, MemoryFundDirectory, SystemClock, config::MatchingConfig,
};

fn load_config() -> Result<MatchingConfig> {
	let config = match std::env::args().nth(1) {
		Some(path) => MatchingConfig::from_file(&path)
			.with_context(|| format!("Failed to load configuration from {}", path))?,
		None => MatchingConfig::from_env().unwrap_or_else(|_| {
			info!(target: "server", "Using default configuration");
			MatchingConfig::default()
		}),
	};
	if let Err(reason) = config.validate() {
		bail!("Invalid configuration: {}", reason);
	}
	Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
	ccq_matching::logging::init_logging()?;

	let config = load_config()?;
	info!(target: "server", "Starting CCQ matching service");
	info!(target: "server", "Match interval: {} ms", config.match_interval_ms);
	info!(
		target: "server",
		"Market-maker interval: {} ms (min age {} ms, NAV tolerance {})",
		config.market_maker_interval_ms,
		config.market_maker_min_age_ms,
		config.nav_tolerance
	);

	let directory = Arc::new(MemoryFundDirectory::new());
	for seed in config.funds.iter().cloned() {
		info!(target: "server", fund_id = %seed.id, nav = %seed.nav, "Registering fund");
		directory.register_fund(seed.into());
	}

	let service = Arc::new(FundMatchingService::new(
		&config,
		directory,
		Arc::new(SystemClock),
	));
	let scheduler = MatchScheduler::start(Arc::clone(&service), &config)
		.context("Failed to start scheduler threads")?;

	signal::ctrl_c()
		.await
		.context("Failed to listen for shutdown signal")?;

	info!(target: "server", "Shutting down...");
	scheduler.shutdown();
	info!(target: "server", "Shutdown complete");
	Ok(())
}
