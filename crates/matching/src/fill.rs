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

//! Partial-fill bookkeeping
//!
//! Every change to an order's matched quantity goes through
//! [`PartialFillTracker::apply_fill`]. The caller holds the fund's
//! matching lock, so no two fills race on the same order.

use ccq_sdk::types::OrderStatus;
use rust_decimal::Decimal;

use crate::types::{MatchingError, Order};

/// Outcome of applying one fill to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
	/// Units remain; the order keeps resting
	Partial,
	/// No units remain; the order leaves the book
	Completed,
}

/// Applies fills and drives order status transitions
pub struct PartialFillTracker;

impl PartialFillTracker {
	/// Add `quantity` to the order's matched units
	///
	/// Rejects non-positive quantities and anything above the remaining
	/// units without touching the order.
	pub fn apply_fill(order: &mut Order, quantity: Decimal) -> Result<FillOutcome, MatchingError> {
		Self::check_consistency(order)?;

		if !order.is_active() {
			return Err(MatchingError::InvalidState {
				order_id: order.order_id.clone(),
				reason: format!("cannot fill a {:?} order", order.status),
			});
		}
		if quantity <= Decimal::ZERO {
			return Err(MatchingError::InvalidState {
				order_id: order.order_id.clone(),
				reason: format!("fill quantity must be positive, got {}", quantity),
			});
		}

		let remaining = order.remaining_units();
		if quantity > remaining {
			return Err(MatchingError::Overfill {
				order_id: order.order_id.clone(),
				quantity,
				remaining,
			});
		}

		order.matched_units += quantity;

		if order.remaining_units().is_zero() {
			order.status = OrderStatus::Completed;
			Ok(FillOutcome::Completed)
		} else {
			if order.status == OrderStatus::Pending {
				order.status = OrderStatus::PartiallyMatched;
			}
			Ok(FillOutcome::Partial)
		}
	}

	/// Verify that an order's status agrees with its quantities
	pub fn check_consistency(order: &Order) -> Result<(), MatchingError> {
		let remaining = order.remaining_units();
		let reason = if order.matched_units < Decimal::ZERO {
			Some("matched units are negative".to_string())
		} else if remaining < Decimal::ZERO {
			Some(format!("remaining units are negative ({})", remaining))
		} else {
			match order.status {
				OrderStatus::Completed if !remaining.is_zero() => {
					Some(format!("completed with {} units remaining", remaining))
				}
				OrderStatus::Pending if !order.matched_units.is_zero() => {
					Some(format!("pending with {} units matched", order.matched_units))
				}
				OrderStatus::PartiallyMatched if order.matched_units.is_zero() => {
					Some("partially matched without any matched units".to_string())
				}
				OrderStatus::PartiallyMatched | OrderStatus::Pending if remaining.is_zero() => {
					Some("active with no units remaining".to_string())
				}
				_ => None,
			}
		};

		match reason {
			Some(reason) => Err(MatchingError::InvalidState {
				order_id: order.order_id.clone(),
				reason,
			}),
			None => Ok(()),
		}
	}
}
