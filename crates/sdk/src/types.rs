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

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// The side an order must be on to trade against this one
	pub fn opposite(self) -> Self {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
		}
	}
}

/// Order status
///
/// `Completed` and `Cancelled` are terminal. An order is `Completed`
/// exactly when its remaining units reach zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Pending,
	PartiallyMatched,
	Completed,
	Cancelled,
}

impl OrderStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
	}
}

/// Settlement status of a matched buy/sell pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
	/// Matched by the engine, awaiting settlement
	Confirmed,
	/// Settled by the downstream settlement step
	Done,
}

/// Where a matched pair came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSource {
	/// Two investor orders crossed on the book
	Book,
	/// Residual quantity absorbed by the house account
	MarketMaker,
}

/// Result of a matching pass over one or more funds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
	/// Number of matched pairs appended to the ledger
	pub pairs_created: usize,
	/// Total units exchanged across all pairs
	pub units_matched: Decimal,
	/// Funds whose pass committed
	pub funds_matched: usize,
	/// Funds whose pass aborted (they are retried on the next tick)
	pub funds_failed: Vec<String>,
}

impl MatchSummary {
	pub fn merge(&mut self, other: MatchSummary) {
		self.pairs_created += other.pairs_created;
		self.units_matched += other.units_matched;
		self.funds_matched += other.funds_matched;
		self.funds_failed.extend(other.funds_failed);
	}
}

/// Result of one market-maker cycle for a fund
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMakerSummary {
	/// Residual orders closed out against the house account
	pub resolved_count: usize,
	/// Residual orders the NAV band did not allow to be closed
	pub unresolved_count: usize,
	/// Units absorbed by the house account
	pub units_resolved: Decimal,
}

impl MarketMakerSummary {
	pub fn merge(&mut self, other: MarketMakerSummary) {
		self.resolved_count += other.resolved_count;
		self.unresolved_count += other.unresolved_count;
		self.units_resolved += other.units_resolved;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_wire_names() {
		let json = serde_json::to_string(&OrderStatus::PartiallyMatched).unwrap();
		assert_eq!(json, "\"partially_matched\"");

		let side: Side = serde_json::from_str("\"sell\"").unwrap();
		assert_eq!(side, Side::Sell);
		assert_eq!(side.opposite(), Side::Buy);
	}

	#[test]
	fn test_terminal_statuses() {
		assert!(!OrderStatus::Pending.is_terminal());
		assert!(!OrderStatus::PartiallyMatched.is_terminal());
		assert!(OrderStatus::Completed.is_terminal());
		assert!(OrderStatus::Cancelled.is_terminal());
	}

	#[test]
	fn test_summary_merge() {
		let mut total = MatchSummary::default();
		total.merge(MatchSummary {
			pairs_created: 2,
			units_matched: Decimal::from(60),
			funds_matched: 1,
			funds_failed: vec![],
		});
		total.merge(MatchSummary {
			pairs_created: 0,
			units_matched: Decimal::ZERO,
			funds_matched: 0,
			funds_failed: vec!["VFMVF1".to_string()],
		});

		assert_eq!(total.pairs_created, 2);
		assert_eq!(total.units_matched, Decimal::from(60));
		assert_eq!(total.funds_matched, 1);
		assert_eq!(total.funds_failed, vec!["VFMVF1".to_string()]);
	}
}
