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

mod bus;

use ccq_sdk::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::MatchedOrderPair;
pub use bus::{EventBus, EventSubscriber};

/// Sequence number for event ordering
///
/// Assigned by the [`EventBus`] at publication time, so every
/// subscriber observes the same total order.
pub type SequenceNumber = u64;

/// Events produced by the matching engine
///
/// These events are the authoritative feed of book changes for
/// presentation layers: they subscribe to the feed (or poll a snapshot)
/// instead of inferring matches from rows disappearing.
///
/// Design principles:
/// - Events are immutable once emitted
/// - Events are only emitted for committed state
/// - Each event has a unique, monotonically increasing sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchingEvent {
	/// Order was accepted and added to its fund's book
	OrderAccepted {
		seq: SequenceNumber,
		order_id: String,
		fund_id: String,
		side: Side,
		price: Decimal,
		units: Decimal,
		timestamp: u64,
	},

	/// Order received a fill and keeps resting
	OrderPartiallyMatched {
		seq: SequenceNumber,
		order_id: String,
		fund_id: String,
		matched_units: Decimal,
		remaining_units: Decimal,
		timestamp: u64,
	},

	/// Order was completely matched and left the book
	OrderCompleted {
		seq: SequenceNumber,
		order_id: String,
		fund_id: String,
		matched_units: Decimal,
		timestamp: u64,
	},

	/// Order was cancelled and removed from the book
	OrderCancelled {
		seq: SequenceNumber,
		order_id: String,
		fund_id: String,
		remaining_units: Decimal,
		timestamp: u64,
	},

	/// A buy/sell pair was recorded in the ledger
	PairMatched {
		seq: SequenceNumber,
		pair: MatchedOrderPair,
		timestamp: u64,
	},

	/// The market maker could not close an order inside the NAV band
	RemainderUnresolved {
		seq: SequenceNumber,
		order_id: String,
		fund_id: String,
		remaining_units: Decimal,
		timestamp: u64,
	},
}

impl MatchingEvent {
	/// Get the sequence number of this event
	pub fn sequence(&self) -> SequenceNumber {
		match self {
			MatchingEvent::OrderAccepted { seq, .. }
			| MatchingEvent::OrderPartiallyMatched { seq, .. }
			| MatchingEvent::OrderCompleted { seq, .. }
			| MatchingEvent::OrderCancelled { seq, .. }
			| MatchingEvent::PairMatched { seq, .. }
			| MatchingEvent::RemainderUnresolved { seq, .. } => *seq,
		}
	}

	fn sequence_mut(&mut self) -> &mut SequenceNumber {
		match self {
			MatchingEvent::OrderAccepted { seq, .. }
			| MatchingEvent::OrderPartiallyMatched { seq, .. }
			| MatchingEvent::OrderCompleted { seq, .. }
			| MatchingEvent::OrderCancelled { seq, .. }
			| MatchingEvent::PairMatched { seq, .. }
			| MatchingEvent::RemainderUnresolved { seq, .. } => seq,
		}
	}

	/// Get the order_id associated with this event (if applicable)
	pub fn order_id(&self) -> Option<&str> {
		match self {
			MatchingEvent::OrderAccepted { order_id, .. }
			| MatchingEvent::OrderPartiallyMatched { order_id, .. }
			| MatchingEvent::OrderCompleted { order_id, .. }
			| MatchingEvent::OrderCancelled { order_id, .. }
			| MatchingEvent::RemainderUnresolved { order_id, .. } => Some(order_id),
			MatchingEvent::PairMatched { .. } => None,
		}
	}

	/// Get the fund associated with this event
	pub fn fund_id(&self) -> &str {
		match self {
			MatchingEvent::OrderAccepted { fund_id, .. }
			| MatchingEvent::OrderPartiallyMatched { fund_id, .. }
			| MatchingEvent::OrderCompleted { fund_id, .. }
			| MatchingEvent::OrderCancelled { fund_id, .. }
			| MatchingEvent::RemainderUnresolved { fund_id, .. } => fund_id,
			MatchingEvent::PairMatched { pair, .. } => &pair.fund_id,
		}
	}

	/// Check if this event marks the end of an order's life on the book
	pub fn is_order_complete(&self) -> bool {
		matches!(
			self,
			MatchingEvent::OrderCompleted { .. } | MatchingEvent::OrderCancelled { .. }
		)
	}
}
