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

use ccq_sdk::types::{OrderStatus, PairSource, PairStatus, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order submission received from the outer layers
///
/// This is the request shape behind `submit_order`. It carries no
/// identity or timing information; the service assigns the order id,
/// `created_at` and submission sequence when it accepts the command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommand {
	/// Fund whose certificate units are traded
	pub fund_id: String,
	/// Order side
	pub side: Side,
	/// Limit price per unit, NAV-denominated
	pub price: Decimal,
	/// Units requested
	pub units: Decimal,
	/// Investor account placing the order
	pub owner_id: String,
}

impl OrderCommand {
	pub fn new(
		fund_id: impl Into<String>,
		side: Side,
		price: Decimal,
		units: Decimal,
		owner_id: impl Into<String>,
	) -> Self {
		Self {
			fund_id: fund_id.into(),
			side,
			price,
			units,
			owner_id: owner_id.into(),
		}
	}

	/// Reject malformed commands before they reach a book
	pub fn validate(&self) -> Result<(), MatchingError> {
		if self.fund_id.trim().is_empty() {
			return Err(MatchingError::Validation("fund id is empty".to_string()));
		}
		if self.owner_id.trim().is_empty() {
			return Err(MatchingError::Validation("owner id is empty".to_string()));
		}
		if self.price <= Decimal::ZERO {
			return Err(MatchingError::Validation(format!(
				"price must be positive, got {}",
				self.price
			)));
		}
		if self.units <= Decimal::ZERO {
			return Err(MatchingError::Validation(format!(
				"units must be positive, got {}",
				self.units
			)));
		}
		Ok(())
	}
}

/// An order resting in (or archived from) a fund's book
///
/// `matched_units` only ever grows, and `remaining_units()` is derived
/// from it so the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique order ID
	pub order_id: String,
	/// Fund identifier
	pub fund_id: String,
	/// Order side
	pub side: Side,
	/// Limit price per unit
	pub price: Decimal,
	/// Units requested
	pub units: Decimal,
	/// Units matched so far
	pub matched_units: Decimal,
	/// Lifecycle status
	pub status: OrderStatus,
	/// Investor (or house) account owning the order
	pub owner_id: String,
	/// Submission time in milliseconds (time priority)
	pub created_at: u64,
	/// Service-wide submission sequence (final time-priority tie-break)
	pub sequence: u64,
}

impl Order {
	pub fn from_command(
		order_id: String,
		cmd: OrderCommand,
		created_at: u64,
		sequence: u64,
	) -> Self {
		Self {
			order_id,
			fund_id: cmd.fund_id,
			side: cmd.side,
			price: cmd.price,
			units: cmd.units,
			matched_units: Decimal::ZERO,
			status: OrderStatus::Pending,
			owner_id: cmd.owner_id,
			created_at,
			sequence,
		}
	}

	pub fn remaining_units(&self) -> Decimal {
		self.units - self.matched_units
	}

	/// Time-priority key; lower keys were submitted earlier
	pub fn time_key(&self) -> (u64, u64) {
		(self.created_at, self.sequence)
	}

	pub fn is_active(&self) -> bool {
		!self.status.is_terminal()
	}
}

/// One matching event between a buy and a sell order
///
/// Pairs are appended to the ledger once and never rewritten. The
/// `status` reported by ledger reads reflects settlement that happened
/// after the pair was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedOrderPair {
	/// Ledger-assigned pair ID (monotonically increasing)
	pub id: u64,
	/// Fund identifier
	pub fund_id: String,
	pub buy_order_id: String,
	pub sell_order_id: String,
	/// Units exchanged by this pair
	pub matched_quantity: Decimal,
	/// Price per unit the pair traded at
	pub match_price: Decimal,
	pub status: PairStatus,
	pub source: PairSource,
	/// Match time in milliseconds
	pub created_at: u64,
}

/// Fund reference data published by the fund service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundInfo {
	pub fund_id: String,
	pub ticker: String,
	/// Latest published net asset value per unit
	pub current_nav: Decimal,
}

/// Read-only view of one fund's book for presentation layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
	pub fund_id: String,
	/// Active buy orders in priority order
	pub buy_orders: Vec<Order>,
	/// Active sell orders in priority order
	pub sell_orders: Vec<Order>,
	/// Active orders of either side that already have fills
	pub partially_matched_orders: Vec<Order>,
}

/// Which funds a matching pass covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundScope {
	All,
	Fund(String),
}

/// Matching phase of a fund book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundPhase {
	Idle,
	Matching,
}

/// Error types for matching operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchingError {
	#[error("Invalid order: {0}")]
	Validation(String),
	#[error("Fund not found: {0}")]
	FundNotFound(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Order {0} changed state during the matching pass")]
	ConcurrentModification(String),
	#[error("Fill of {quantity} exceeds remaining {remaining} units on order {order_id}")]
	Overfill {
		order_id: String,
		quantity: Decimal,
		remaining: Decimal,
	},
	#[error("Order {order_id} is in an invalid state: {reason}")]
	InvalidState { order_id: String, reason: String },
	#[error("Market maker could not settle order {order_id} within the NAV band")]
	UnresolvedRemainder { order_id: String },
}
