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

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{market_maker::MarketMakerConfig, types::FundInfo};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "matching";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "MATCHING";

/// A fund the service books orders for at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSeed {
	pub id: String,
	pub ticker: String,
	pub nav: Decimal,
}

impl From<FundSeed> for FundInfo {
	fn from(seed: FundSeed) -> Self {
		FundInfo {
			fund_id: seed.id,
			ticker: seed.ticker,
			current_nav: seed.nav,
		}
	}
}

/// Matching service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
	/// Interval between automatic matching ticks
	pub match_interval_ms: u64,
	/// Interval between market-maker sweeps
	pub market_maker_interval_ms: u64,
	/// Minimum age of a residual order before the house takes it
	pub market_maker_min_age_ms: u64,
	/// Half-width of the NAV band as a fraction
	pub nav_tolerance: Decimal,
	/// Owner id used for synthetic counter-orders
	pub market_maker_account: String,
	/// Retries of a fund pass aborted by a concurrent cancellation
	pub max_pass_retries: u32,
	/// Log every staged pair at debug level
	pub verbose_logging: bool,
	/// Funds registered at startup
	pub funds: Vec<FundSeed>,
}

impl Default for MatchingConfig {
	fn default() -> Self {
		Self {
			match_interval_ms: 1_000,
			market_maker_interval_ms: 30_000,
			market_maker_min_age_ms: 300_000,
			nav_tolerance: Decimal::new(5, 2),
			market_maker_account: "market-maker".to_string(),
			max_pass_retries: 3,
			verbose_logging: false,
			funds: Vec::new(),
		}
	}
}

impl MatchingConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize()
	}

	pub fn match_interval(&self) -> Duration {
		Duration::from_millis(self.match_interval_ms)
	}

	pub fn market_maker_interval(&self) -> Duration {
		Duration::from_millis(self.market_maker_interval_ms)
	}

	pub fn market_maker(&self) -> MarketMakerConfig {
		MarketMakerConfig {
			min_age_ms: self.market_maker_min_age_ms,
			nav_tolerance: self.nav_tolerance,
			account: self.market_maker_account.clone(),
		}
	}

	/// Reject settings the service cannot run with
	pub fn validate(&self) -> Result<(), String> {
		if self.match_interval_ms == 0 || self.market_maker_interval_ms == 0 {
			return Err("tick intervals must be non-zero".to_string());
		}
		if self.nav_tolerance < Decimal::ZERO || self.nav_tolerance >= Decimal::ONE {
			return Err(format!(
				"nav_tolerance must be in [0, 1), got {}",
				self.nav_tolerance
			));
		}
		if self.market_maker_account.trim().is_empty() {
			return Err("market_maker_account must not be blank".to_string());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = MatchingConfig::default();
		assert_eq!(config.match_interval(), Duration::from_secs(1));
		assert_eq!(config.market_maker_interval(), Duration::from_secs(30));
		assert_eq!(config.market_maker().min_age_ms, 300_000);
		assert_eq!(config.max_pass_retries, 3);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_validate_rejects_bad_tolerance() {
		let config = MatchingConfig {
			nav_tolerance: Decimal::ONE,
			..MatchingConfig::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_partial_json_falls_back_to_defaults() {
		let config: MatchingConfig = serde_json::from_str(
			r#"{"match_interval_ms": 250, "funds": [{"id": "VFMVF1", "ticker": "vfmvf1", "nav": "10000"}]}"#,
		)
		.unwrap();

		assert_eq!(config.match_interval_ms, 250);
		assert_eq!(config.market_maker_account, "market-maker");
		let fund: FundInfo = config.funds[0].clone().into();
		assert_eq!(fund.current_nav, Decimal::from(10_000));
	}
}
