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

//! Fund reference data
//!
//! Funds and their NAV are owned by an external fund service. The engine
//! only reads them: at submission time to reject unknown funds, and at
//! the start of each market-maker cycle to snapshot the NAV band.

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::types::{FundInfo, MatchingError};

/// Read-only access to fund reference data
pub trait FundDirectory: Send + Sync {
	/// Look up a fund by id
	fn fund(&self, fund_id: &str) -> Option<FundInfo>;

	/// Every known fund id, sorted
	fn fund_ids(&self) -> Vec<String>;
}

/// In-memory fund directory
#[derive(Debug, Default)]
pub struct MemoryFundDirectory {
	funds: DashMap<String, FundInfo>,
}

impl MemoryFundDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register or replace a fund
	pub fn register_fund(&self, fund: FundInfo) {
		self.funds.insert(fund.fund_id.clone(), fund);
	}

	/// Publish a new NAV for a known fund
	pub fn update_nav(&self, fund_id: &str, nav: Decimal) -> Result<(), MatchingError> {
		if nav <= Decimal::ZERO {
			return Err(MatchingError::Validation(format!(
				"NAV must be positive, got {}",
				nav
			)));
		}
		let mut fund = self
			.funds
			.get_mut(fund_id)
			.ok_or_else(|| MatchingError::FundNotFound(fund_id.to_string()))?;
		fund.current_nav = nav;
		Ok(())
	}
}

impl FundDirectory for MemoryFundDirectory {
	fn fund(&self, fund_id: &str) -> Option<FundInfo> {
		self.funds.get(fund_id).map(|entry| entry.value().clone())
	}

	fn fund_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.funds.iter().map(|entry| entry.key().clone()).collect();
		ids.sort();
		ids
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fund(id: &str, nav: i64) -> FundInfo {
		FundInfo {
			fund_id: id.to_string(),
			ticker: id.to_lowercase(),
			current_nav: Decimal::from(nav),
		}
	}

	#[test]
	fn test_register_and_lookup() {
		let directory = MemoryFundDirectory::new();
		directory.register_fund(fund("VFMVF1", 10_000));
		directory.register_fund(fund("E1VFVN30", 20_000));

		assert_eq!(directory.fund("VFMVF1").unwrap().current_nav, Decimal::from(10_000));
		assert!(directory.fund("UNKNOWN").is_none());
		assert_eq!(directory.fund_ids(), vec!["E1VFVN30", "VFMVF1"]);
	}

	#[test]
	fn test_update_nav() {
		let directory = MemoryFundDirectory::new();
		directory.register_fund(fund("VFMVF1", 10_000));

		directory.update_nav("VFMVF1", Decimal::from(10_250)).unwrap();
		assert_eq!(directory.fund("VFMVF1").unwrap().current_nav, Decimal::from(10_250));

		assert_eq!(
			directory.update_nav("MISSING", Decimal::ONE),
			Err(MatchingError::FundNotFound("MISSING".to_string()))
		);
		assert!(matches!(
			directory.update_nav("VFMVF1", Decimal::ZERO),
			Err(MatchingError::Validation(_))
		));
	}
}
