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

use crate::OrderBook;

/// State of one fund's book
///
/// This structure holds everything a matching pass mutates for a fund:
/// - Orderbook (all active orders)
/// - Pass counters for operator visibility
///
/// It lives behind the fund's matching lock; whoever holds the lock is
/// the single writer.
#[derive(Debug, Clone)]
pub struct FundBookState {
	/// The orderbook for this fund
	pub orderbook: OrderBook,
	/// Passes that committed
	pub passes_committed: u64,
	/// Passes that aborted and were discarded
	pub passes_aborted: u64,
	/// Clock reading at the last committed pass
	pub last_pass_at: Option<u64>,
}

impl FundBookState {
	pub fn new(fund_id: impl Into<String>) -> Self {
		Self {
			orderbook: OrderBook::new(fund_id),
			passes_committed: 0,
			passes_aborted: 0,
			last_pass_at: None,
		}
	}

	pub fn record_commit(&mut self, now: u64) {
		self.passes_committed += 1;
		self.last_pass_at = Some(now);
	}

	pub fn record_abort(&mut self) {
		self.passes_aborted += 1;
	}

	pub fn stats(&self) -> FundPassStats {
		FundPassStats {
			fund_id: self.orderbook.fund_id().to_string(),
			active_orders: self.orderbook.order_count(),
			passes_committed: self.passes_committed,
			passes_aborted: self.passes_aborted,
			last_pass_at: self.last_pass_at,
		}
	}
}

/// Pass counters of one fund, as reported to operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundPassStats {
	pub fund_id: String,
	pub active_orders: usize,
	pub passes_committed: u64,
	pub passes_aborted: u64,
	pub last_pass_at: Option<u64>,
}
