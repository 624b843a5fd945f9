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

mod memory;

use ccq_sdk::types::{PairSource, PairStatus};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{MatchedOrderPair, Order};
pub use memory::MemoryMatchedOrderLedger;

/// Error types for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
	#[error("Failed to record pair: {0}")]
	RecordFailed(String),
	#[error("Pair not found: {0}")]
	UnknownPair(u64),
}

/// A match produced by the engine that has not been recorded yet
///
/// The ledger turns drafts into [`MatchedOrderPair`] rows by assigning
/// the pair id and the initial `confirmed` status.
#[derive(Debug, Clone, PartialEq)]
pub struct PairDraft {
	pub fund_id: String,
	pub buy_order_id: String,
	pub sell_order_id: String,
	pub matched_quantity: Decimal,
	pub match_price: Decimal,
	pub source: PairSource,
	pub created_at: u64,
}

/// Matched Order Ledger - the history of every buy/sell pairing
///
/// The ledger is the sole owner of pair history and of archived
/// (terminal) orders. Key semantic constraints:
/// - Pairs are append-only; a recorded pair is never rewritten
/// - Pair ids are assigned by the ledger in recording order
/// - Settlement (`confirmed` -> `done`) is tracked beside the pair and
///   only surfaces through reads
///
/// This abstraction is implementation-agnostic: it can be backed by
/// in-memory structures or an external store owned by the ERP.
pub trait MatchedOrderLedger: Send {
	/// Append every draft of a pass, or none of them
	///
	/// Implementations must check the whole batch before storing any
	/// pair: an error leaves the ledger exactly as it was. Stored rows
	/// are returned in draft order.
	fn record_batch(&mut self, drafts: Vec<PairDraft>)
	-> Result<Vec<MatchedOrderPair>, LedgerError>;

	/// Append a single pair and return the stored row
	fn record(&mut self, draft: PairDraft) -> Result<MatchedOrderPair, LedgerError> {
		self.record_batch(vec![draft])?
			.pop()
			.ok_or_else(|| LedgerError::RecordFailed("ledger stored no row".to_string()))
	}

	/// All pairs referencing an order (either side), in recording order
	fn pairs_for_order(&self, order_id: &str) -> Vec<MatchedOrderPair>;

	/// All pairs of a fund, in recording order
	fn pairs_for_fund(&self, fund_id: &str) -> Vec<MatchedOrderPair>;

	/// Sum of matched quantities over the pairs referencing an order
	fn matched_total(&self, order_id: &str) -> Decimal {
		self.pairs_for_order(order_id)
			.iter()
			.map(|p| p.matched_quantity)
			.sum()
	}

	/// Keep a terminal order for history once it leaves the book
	fn archive(&mut self, order: Order);

	/// Look up an archived order
	fn archived(&self, order_id: &str) -> Option<Order>;

	/// External settlement hook: escalate a pair from confirmed to done
	fn mark_done(&mut self, pair_id: u64) -> Result<(), LedgerError>;

	/// Current settlement status of a pair
	fn pair_status(&self, pair_id: u64) -> Option<PairStatus>;

	/// Number of recorded pairs
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
